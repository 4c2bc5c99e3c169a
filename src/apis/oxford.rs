use crate::apis::raw_course;
use crate::constants::{
    oxford_course_list_url, DEFAULT_LANGUAGE, GRADUATE_STUDY_LEVEL, OXFORD_BASE_URL,
    OXFORD_COURSE_LIST_PAGES, OXFORD_LANGUAGE_URL, OXFORD_SOURCE, OXFORD_UNIVERSITY,
};
use crate::context::{ExtractionContext, LanguageTest};
use crate::error::{Result, ScraperError};
use crate::html::{
    absolute_url, capitalize, collapse_whitespace, element_text, first, first_in_doc,
    strip_parenthetical, text_parts, text_without, ANCHOR, H2, TD, TH, TR,
};
use crate::types::{CourseSource, PageFetcher, RawCourse};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static TBODY_ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static COURSE_LISTING: Lazy<Selector> = Lazy::new(|| Selector::parse(".course-listing").unwrap());
static COURSE_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(".course-title").unwrap());
static COURSE_DEPARTMENT: Lazy<Selector> = Lazy::new(|| Selector::parse(".course-department").unwrap());
static COURSE_MODE: Lazy<Selector> = Lazy::new(|| Selector::parse(".course-mode-of-study").unwrap());
static COURSE_DURATION: Lazy<Selector> = Lazy::new(|| Selector::parse(".course-duration").unwrap());
static TAB_TITLES: Lazy<Selector> = Lazy::new(|| Selector::parse(".field_tab_title li").unwrap());
static TAB_BODIES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[about] .field-name-field-body-multiple .field-item").unwrap());
static INTRO: Lazy<Selector> = Lazy::new(|| Selector::parse(".field-name-field-intro").unwrap());
static FEE_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("#feetable").unwrap());
static COURSE_START: Lazy<Selector> = Lazy::new(|| Selector::parse("#coursestart td").unwrap());
static SIDEBAR_BLOCKS: Lazy<Selector> = Lazy::new(|| Selector::parse("#page-content-sidebar-second div").unwrap());
static STRONG: Lazy<Selector> = Lazy::new(|| Selector::parse("strong").unwrap());
static LANGUAGE_LEVEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#courselangreq td").unwrap());
static MODULE_ITEMS: Lazy<Selector> = Lazy::new(|| Selector::parse("#content-tab ul li").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").unwrap());

const REQUIRED_TABS: [&str; 3] = ["About", "Entry requirements", "Funding and Costs"];
const LANGUAGE_PROFILES: [&str; 2] = ["Standard", "Higher"];

/// A row of the A-Z listing. Title, qualification, department and study
/// pattern only appear here, not on the course page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseListing {
    pub link: String,
    pub title: String,
    pub qualification: String,
    pub location: String,
    pub study_mode: String,
    pub duration: String,
}

pub struct OxfordSource;

impl Default for OxfordSource {
    fn default() -> Self {
        Self::new()
    }
}

impl OxfordSource {
    pub fn new() -> Self {
        Self
    }

    /// Tests from the first table of the English proficiency page. Scores
    /// carry the column captions, e.g. `Minimum overall score: 7.0, ...`.
    pub fn parse_language_table(&self, html: &str) -> Vec<LanguageTest> {
        let document = Html::parse_document(html);
        let Some(table) = first_in_doc(&document, &TABLE) else {
            warn!("No language table found");
            return Vec::new();
        };
        let captions: Vec<String> = table.select(&TH).map(|th| element_text(&th)).collect();
        if captions.len() < 3 {
            warn!("Language table has {} header cells, expected 3", captions.len());
            return Vec::new();
        }

        let mut tests: Vec<LanguageTest> = Vec::new();
        let rows = table.select(&TBODY_ROWS).filter_map(|row| {
            let cells: Vec<ElementRef> = row.select(&TD).collect();
            if cells.len() < 3 {
                return None;
            }
            let test = strip_parenthetical(&element_text(&cells[0]))
                .replace(['*', '†'], "")
                .trim()
                .to_string();
            let overall = element_text(&cells[1]);
            let per_component = text_parts(&cells[2]).join(" ");
            Some(LanguageTest {
                test,
                score: format!("{}: {}, {}: {}", captions[1], overall, captions[2], per_component),
            })
        });

        // A repeated test name keeps its first position and takes the later score
        for row in rows {
            match tests.iter_mut().find(|t| t.test == row.test) {
                Some(existing) => existing.score = row.score,
                None => tests.push(row),
            }
        }
        tests
    }

    pub fn parse_course_list(&self, html: &str) -> Vec<CourseListing> {
        let document = Html::parse_document(html);
        document
            .select(&COURSE_LISTING)
            .filter_map(|card| {
                let anchor = first(&card, &ANCHOR)?;
                let href = anchor.value().attr("href")?;
                let listing = CourseListing {
                    link: absolute_url(OXFORD_BASE_URL, href),
                    title: element_text(&anchor),
                    qualification: text_without(&first(&card, &COURSE_TITLE)?, &ANCHOR),
                    location: format!("{}, Oxford", element_text(&first(&card, &COURSE_DEPARTMENT)?)),
                    study_mode: element_text(&first(&card, &COURSE_MODE)?),
                    duration: element_text(&first(&card, &COURSE_DURATION)?),
                };
                Some(listing)
            })
            .collect()
    }

    /// Builds the raw record for a course page. Returns `None` for pages
    /// that lack the standard course tabs.
    pub fn parse_course(&self, html: &str, listing: &CourseListing, ctx: &ExtractionContext) -> Option<RawCourse> {
        let document = Html::parse_document(html);

        let tabs: Vec<String> = document.select(&TAB_TITLES).map(|li| element_text(&li)).collect();
        if !REQUIRED_TABS.iter().all(|t| tabs.iter().any(|tab| tab == t)) {
            debug!("Skipping {}: missing course tabs", listing.link);
            return None;
        }

        Some(raw_course(json!({
            "link": listing.link,
            "title": listing.title,
            "study_level": GRADUATE_STUDY_LEVEL,
            "qualification": listing.qualification,
            "university_title": OXFORD_UNIVERSITY,
            "locations": [listing.location],
            "description": self.description(&document),
            "about": tab_body(&document, &tabs, "about").map(|el| el.html()),
            "tuitions": self.tuitions(&document, &tabs, &listing.study_mode, &listing.duration),
            "start_dates": self.start_dates(&document),
            "application_dates": self.application_dates(&document),
            "entry_requirements": self.entry_requirements(&document, &tabs),
            "language_requirements": self.language_requirements(&document, ctx),
            "modules": self.modules(&document),
        })))
    }

    fn description(&self, document: &Html) -> Option<String> {
        first_in_doc(document, &INTRO).map(|intro| text_without(&intro, &H2))
    }

    fn tuitions(&self, document: &Html, tabs: &[String], study_mode: &str, duration: &str) -> Vec<Value> {
        let Some(body) = tab_body(document, tabs, "funding and costs") else {
            return Vec::new();
        };
        let tables: Vec<ElementRef> = body.select(&FEE_TABLE).collect();
        let index = if study_mode == "Part time" && tables.len() > 1 { 1 } else { 0 };
        let Some(table) = tables.get(index) else {
            debug!("No fee table");
            return Vec::new();
        };
        let rows: Vec<ElementRef> = table.select(&TR).collect();

        let mut tuitions = Vec::new();
        for (student_category, row_index) in [("uk", 1), ("international", 2)] {
            let Some(fee) = rows
                .get(row_index)
                .and_then(|row| row.select(&TD).nth(1))
                .map(|td| element_text(&td))
            else {
                debug!("Fee table has no {} row", student_category);
                return Vec::new();
            };
            tuitions.push(json!({
                "study_mode": study_mode,
                "duration": duration,
                "student_category": student_category,
                "fee": fee,
            }));
        }
        tuitions
    }

    fn start_dates(&self, document: &Html) -> Vec<String> {
        first_in_doc(document, &COURSE_START)
            .map(|td| element_text(&td))
            .filter(|date| date.chars().any(|c| c.is_ascii_digit()))
            .into_iter()
            .collect()
    }

    fn application_dates(&self, document: &Html) -> Vec<String> {
        document
            .select(&SIDEBAR_BLOCKS)
            .find(|block| block.html().contains("Deadlines"))
            .map(|block| {
                block
                    .select(&STRONG)
                    .map(|s| element_text(&s))
                    .filter(|text| YEAR.is_match(text))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn entry_requirements(&self, document: &Html, tabs: &[String]) -> Option<String> {
        let body = tab_body(document, tabs, "entry requirements")?;
        let parent = first(&body, &STRONG)?.parent().and_then(ElementRef::wrap)?;
        Some(capitalize(&collapse_whitespace(&element_text(&parent))))
    }

    fn language_requirements(&self, document: &Html, ctx: &ExtractionContext) -> Vec<Value> {
        let Some(level) = first_in_doc(document, &LANGUAGE_LEVEL)
            .and_then(|td| element_text(&td).split_whitespace().next().map(str::to_string))
        else {
            return Vec::new();
        };
        match ctx.language_profile(&level) {
            Some(tests) => tests
                .iter()
                .map(|t| json!({"language": DEFAULT_LANGUAGE, "test": t.test, "score": t.score}))
                .collect(),
            None => {
                debug!("Unknown language level '{}'", level);
                Vec::new()
            }
        }
    }

    /// Items under the course content tab, typed by the closest preceding
    /// paragraph ("core" or "option").
    fn modules(&self, document: &Html) -> Vec<Value> {
        let items: HashSet<_> = document.select(&MODULE_ITEMS).map(|li| li.id()).collect();
        if items.is_empty() {
            return Vec::new();
        }

        let mut modules = Vec::new();
        let mut last_paragraph = String::new();
        for node in document.root_element().descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            match el.value().name() {
                "p" => last_paragraph = element_text(&el).to_lowercase(),
                "li" if items.contains(&el.id()) => {
                    let module_type = if last_paragraph.contains("core") {
                        "Core"
                    } else if last_paragraph.contains("option") {
                        "Optional"
                    } else {
                        continue;
                    };
                    modules.push(json!({
                        "type": module_type,
                        "title": element_text(&el),
                        "link": "",
                    }));
                }
                _ => {}
            }
        }
        modules
    }

    async fn build_context(&self, fetcher: &dyn PageFetcher) -> Result<ExtractionContext> {
        let tests = self.parse_language_table(&fetcher.fetch(OXFORD_LANGUAGE_URL).await?);
        if tests.is_empty() {
            return Err(ScraperError::MissingMarkup("Oxford language test table".into()));
        }
        info!("Loaded {} language tests", tests.len());

        let mut ctx = ExtractionContext::new();
        for profile in LANGUAGE_PROFILES {
            ctx.insert_language_profile(profile, tests.clone());
        }
        Ok(ctx)
    }
}

#[async_trait::async_trait]
impl CourseSource for OxfordSource {
    fn source_name(&self) -> &'static str {
        OXFORD_SOURCE
    }

    fn university_title(&self) -> &'static str {
        OXFORD_UNIVERSITY
    }

    #[instrument(skip(self, fetcher))]
    async fn collect(&self, fetcher: &dyn PageFetcher) -> Result<Vec<RawCourse>> {
        let ctx = self.build_context(fetcher).await?;

        let mut listings = Vec::new();
        for page in 0..OXFORD_COURSE_LIST_PAGES {
            let url = oxford_course_list_url(page);
            match fetcher.fetch(&url).await {
                Ok(html) => listings.extend(self.parse_course_list(&html)),
                Err(e) => warn!("Failed to fetch course list {}: {}", url, e),
            }
        }
        info!("Found {} course listings", listings.len());

        let mut courses = Vec::new();
        for listing in &listings {
            let page = match fetcher.fetch(&listing.link).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to fetch course page {}: {}", listing.link, e);
                    continue;
                }
            };
            if let Some(course) = self.parse_course(&page, listing, &ctx) {
                courses.push(course);
            }
        }

        info!("Extracted {} Oxford course records", courses.len());
        Ok(courses)
    }
}

/// Body of the tab whose title matches `name` case-insensitively.
fn tab_body<'a>(document: &'a Html, tabs: &[String], name: &str) -> Option<ElementRef<'a>> {
    let index = tabs.iter().position(|t| t.to_lowercase() == name)?;
    document.select(&TAB_BODIES).nth(index)
}
