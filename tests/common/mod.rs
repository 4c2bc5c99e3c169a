#![allow(dead_code)]

use course_crawler::error::{Result, ScraperError};
use course_crawler::types::PageFetcher;
use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

/// Serves canned pages by URL and records every request.
#[derive(Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: &str) -> Self {
        self.pages.insert(url.into(), body.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::Io(io::Error::new(io::ErrorKind::NotFound, url.to_string())))
    }
}

pub const DATA_SCIENCE_URL: &str = "https://www.bristol.ac.uk/study/postgraduate/taught/msc-data-science/";
pub const DATA_SCIENCE_UNITS_URL: &str =
    "https://www.bristol.ac.uk/unit-programme-catalogue/RouteStructure.jsa?programmeCode=9CMPS012T";
pub const STATISTICS_URL: &str = "https://www.ox.ac.uk/admissions/graduate/courses/msc-statistical-science";
pub const ARCHAEOLOGY_URL: &str = "https://www.ox.ac.uk/admissions/graduate/courses/dphil-archaeology";
pub const DATA_ANALYTICS_URL: &str = "https://warwick.ac.uk/study/postgraduate/courses/data-analytics/";
pub const PHD_STATISTICS_URL: &str = "https://warwick.ac.uk/study/postgraduate/courses/phd-statistics/";
pub const UCL_DATA_SCIENCE_URL: &str =
    "https://www.ucl.ac.uk/prospective-students/graduate/taught-degrees/data-science-msc";
pub const UCL_EDUCATION_URL: &str =
    "https://www.ucl.ac.uk/prospective-students/graduate/taught-degrees/education-grad-dip";

pub fn bristol_fetcher() -> FixtureFetcher {
    use course_crawler::constants::*;
    FixtureFetcher::new()
        .with_page(BRISTOL_UK_FEES_URL, include_str!("../resources/bristol_fees_uk.html"))
        .with_page(
            BRISTOL_INTERNATIONAL_FEES_URL,
            include_str!("../resources/bristol_fees_international.html"),
        )
        .with_page(
            BRISTOL_LANGUAGE_PROFILES_URL,
            include_str!("../resources/bristol_language_profiles.html"),
        )
        .with_page(
            "https://www.bristol.ac.uk/study/language-requirements/profile-a/",
            include_str!("../resources/bristol_language_profile_a.html"),
        )
        .with_page(
            "https://www.bristol.ac.uk/study/language-requirements/profile-b/",
            include_str!("../resources/bristol_language_profile_b.html"),
        )
        .with_page(BRISTOL_COURSE_LIST_URL, include_str!("../resources/bristol_course_list.html"))
        .with_page(
            DATA_SCIENCE_URL,
            include_str!("../resources/bristol_course_data_science.html"),
        )
        .with_page(DATA_SCIENCE_UNITS_URL, include_str!("../resources/bristol_units.html"))
}

pub fn oxford_fetcher() -> FixtureFetcher {
    use course_crawler::constants::*;
    FixtureFetcher::new()
        .with_page(OXFORD_LANGUAGE_URL, include_str!("../resources/oxford_language.html"))
        .with_page(oxford_course_list_url(0), include_str!("../resources/oxford_course_list.html"))
        .with_page(STATISTICS_URL, include_str!("../resources/oxford_course_statistics.html"))
        .with_page(ARCHAEOLOGY_URL, include_str!("../resources/oxford_course_archaeology.html"))
}

pub fn warwick_fetcher() -> FixtureFetcher {
    use course_crawler::constants::*;
    FixtureFetcher::new()
        .with_page(WARWICK_LANGUAGE_URL, include_str!("../resources/warwick_language.html"))
        .with_page(WARWICK_TAUGHT_FEES_URL, include_str!("../resources/warwick_fees_taught.html"))
        .with_page(
            WARWICK_RESEARCH_FEES_URL,
            include_str!("../resources/warwick_fees_research.html"),
        )
        .with_page(WARWICK_DEADLINES_URL, include_str!("../resources/warwick_deadlines.html"))
        .with_page(WARWICK_COURSE_LIST_URL, include_str!("../resources/warwick_course_list.html"))
        .with_page(
            DATA_ANALYTICS_URL,
            include_str!("../resources/warwick_course_data_analytics.html"),
        )
        .with_page(
            PHD_STATISTICS_URL,
            include_str!("../resources/warwick_course_phd_statistics.html"),
        )
}

pub fn ucl_fetcher() -> FixtureFetcher {
    use course_crawler::constants::*;
    FixtureFetcher::new()
        .with_page(UCL_LANGUAGE_URL, include_str!("../resources/ucl_language.html"))
        .with_page(UCL_COURSE_LIST_URL, include_str!("../resources/ucl_course_list.html"))
        .with_page(UCL_DATA_SCIENCE_URL, include_str!("../resources/ucl_course_data_science.html"))
        .with_page(UCL_EDUCATION_URL, include_str!("../resources/ucl_course_education.html"))
}
