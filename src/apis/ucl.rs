use crate::apis::raw_course;
use crate::constants::{
    DEFAULT_LANGUAGE, GRADUATE_STUDY_LEVEL, UCL_BASE_URL, UCL_COURSE_LIST_URL, UCL_LANGUAGE_URL,
    UCL_SOURCE, UCL_UNIVERSITY,
};
use crate::context::{ExtractionContext, LanguageTest};
use crate::error::{Result, ScraperError};
use crate::html::{
    absolute_url, capitalize, collapse_whitespace, element_text, first, first_in_doc,
    next_sibling_element, ANCHOR, P,
};
use crate::types::{CourseSource, PageFetcher, RawCourse};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

static DL: Lazy<Selector> = Lazy::new(|| Selector::parse("dl").unwrap());
static LEVELS: Lazy<Selector> = Lazy::new(|| Selector::parse("ul li").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static H5: Lazy<Selector> = Lazy::new(|| Selector::parse("h5").unwrap());
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());
static OPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("option").unwrap());
static STUDY_MODE: Lazy<Selector> = Lazy::new(|| Selector::parse(".study-mode").unwrap());
static COURSE_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#programme-data-content a[href]").unwrap());
static MAP_PIN: Lazy<Selector> = Lazy::new(|| Selector::parse("svg.feather-map-pin").unwrap());
static INTRO: Lazy<Selector> = Lazy::new(|| Selector::parse(".page-intro").unwrap());
static OVERVIEW: Lazy<Selector> = Lazy::new(|| Selector::parse(".prog-overview").unwrap());
static KEY_INFO: Lazy<Selector> = Lazy::new(|| Selector::parse("section.prog-key-info").unwrap());
static REQUIREMENTS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("section.prog-requirements").unwrap());
static LANGUAGE_LEVEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("dl.accordion strong").unwrap());
static MODULE_LISTS: Lazy<Selector> = Lazy::new(|| Selector::parse(".prog-modules div").unwrap());

const MODULE_CLASS_PREFIX: &str = "prog-modules-";

/// Tests that count for a level when the page also names TOEFL.
const TOEFL_LEVEL_TESTS: [&str; 4] = [
    "UCL Pre-sessional English Courses",
    "UCL International Pre-Master's Courses",
    "Test of English as Foreign Language (TOEFL) iBT",
    "International English Language Testing System (IELTS) Academic Version",
];
const IELTS_ACADEMIC: &str = "International English Language Testing System (IELTS) Academic Version";

pub struct UclSource;

impl Default for UclSource {
    fn default() -> Self {
        Self::new()
    }
}

impl UclSource {
    pub fn new() -> Self {
        Self
    }

    /// Tests accepted at each English level (`Level 1` .. `Level 5`), in the
    /// order the tests appear on the page.
    pub fn parse_language_levels(&self, html: &str) -> HashMap<String, Vec<LanguageTest>> {
        let document = Html::parse_document(html);
        let mut levels: HashMap<String, Vec<LanguageTest>> = HashMap::new();
        let Some(list) = first_in_doc(&document, &DL) else {
            warn!("No recognised tests list found");
            return levels;
        };

        let mut current_test: Option<String> = None;
        for child in list.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "dt" => current_test = Some(element_text(&child)),
                "dd" => {
                    let Some(test) = current_test.as_ref() else {
                        continue;
                    };
                    for item in child.select(&LEVELS) {
                        let text = element_text(&item);
                        let Some((level, score)) = text.split_once(':') else {
                            continue;
                        };
                        levels.entry(level.trim().to_string()).or_default().push(LanguageTest {
                            test: test.clone(),
                            score: score.trim().to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        levels
    }

    pub fn parse_course_list(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&COURSE_LINKS)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| absolute_url(UCL_BASE_URL, href))
            .collect()
    }

    pub fn parse_course(
        &self,
        html: &str,
        link: &str,
        ctx: &ExtractionContext,
    ) -> Option<RawCourse> {
        let document = Html::parse_document(html);
        let Some(title) = first_in_doc(&document, &H1).map(|h| element_text(&h)) else {
            debug!("Skipping {}: no title", link);
            return None;
        };
        let key_info = first_in_doc(&document, &KEY_INFO);

        let locations: Vec<String> = first_in_doc(&document, &MAP_PIN)
            .and_then(|pin| pin.next_sibling())
            .and_then(|node| node.value().as_text().map(|t| t.trim().to_string()))
            .filter(|l| !l.is_empty())
            .into_iter()
            .collect();
        let description = first_in_doc(&document, &INTRO).map(|intro| element_text(&intro));
        let about = first_in_doc(&document, &OVERVIEW).map(|overview| overview.inner_html());
        let entry_requirements = first_in_doc(&document, &REQUIREMENTS)
            .and_then(|section| first(&section, &P))
            .map(|p| element_text(&p));

        let start_dates: Vec<String> = key_info
            .and_then(|section| labelled_value(&section, "Programme starts"))
            .into_iter()
            .collect();
        let application_dates: Vec<String> = key_info
            .and_then(|section| labelled_value(&section, "Applications accepted"))
            .map(|dates| clean_application_dates(&dates))
            .into_iter()
            .collect();
        let tuitions = key_info.map(|section| self.tuitions(&section)).unwrap_or_default();

        Some(raw_course(json!({
            "link": link,
            "title": title,
            "study_level": GRADUATE_STUDY_LEVEL,
            "qualification": qualification_from_title(&title),
            "university_title": UCL_UNIVERSITY,
            "locations": locations,
            "description": description,
            "about": about,
            "tuitions": tuitions,
            "start_dates": start_dates,
            "application_dates": application_dates,
            "entry_requirements": entry_requirements,
            "language_requirements": self.language_requirements(&document, ctx),
            "modules": self.modules(&document),
        })))
    }

    /// One tuition per (study mode, fee category). Durations and fees are
    /// tagged with the study mode's class.
    fn tuitions(&self, section: &ElementRef) -> Vec<Value> {
        let modes = study_modes(section);
        let fee_sections: Vec<ElementRef> = section
            .select(&H5)
            .filter(|h| element_text(h).contains("tuition fees"))
            .filter_map(|h| h.parent().and_then(ElementRef::wrap))
            .collect();
        let duration_block =
            heading(section, "Duration").and_then(|h| h.parent().and_then(ElementRef::wrap));

        let mut tuitions = Vec::new();
        for (mode_class, study_mode) in &modes {
            let duration = duration_block
                .and_then(|block| block.select(&STUDY_MODE).find(|el| has_class(el, mode_class)))
                .map(|el| element_text(&el));

            for fee_section in &fee_sections {
                let student_category = fee_section
                    .value()
                    .classes()
                    .find(|class| !class.contains('-'))
                    .unwrap_or_default();
                let fee = fee_section
                    .select(&DIV)
                    .find(|div| has_class(div, mode_class))
                    .map(|div| element_text(&div));
                tuitions.push(json!({
                    "study_mode": study_mode,
                    "duration": duration,
                    "student_category": student_category,
                    "fee": fee,
                }));
            }
        }
        tuitions
    }

    fn language_requirements(&self, document: &Html, ctx: &ExtractionContext) -> Vec<Value> {
        let Some(requirement) = first_in_doc(document, &REQUIREMENTS)
            .and_then(|section| first(&section, &LANGUAGE_LEVEL))
            .map(|strong| element_text(&strong))
        else {
            return Vec::new();
        };

        if !requirement.contains("Level") {
            return vec![json!({
                "language": DEFAULT_LANGUAGE,
                "test": IELTS_ACADEMIC,
                "score": requirement,
            })];
        }

        let level: String = requirement.chars().take(7).collect();
        let Some(tests) = ctx.language_profile(&level) else {
            debug!("Unknown English level '{}'", level);
            return Vec::new();
        };
        let toefl_only = requirement.contains("TOEFL");
        tests
            .iter()
            .filter(|t| !toefl_only || TOEFL_LEVEL_TESTS.contains(&t.test.as_str()))
            .map(|t| json!({"language": DEFAULT_LANGUAGE, "test": t.test, "score": t.score}))
            .collect()
    }

    fn modules(&self, document: &Html) -> Vec<Value> {
        let mut modules = Vec::new();
        for list in document.select(&MODULE_LISTS) {
            let Some(module_type) = list
                .value()
                .classes()
                .find_map(|class| class.strip_prefix(MODULE_CLASS_PREFIX))
                .map(capitalize)
            else {
                continue;
            };

            let anchors: Vec<ElementRef> = list.select(&ANCHOR).collect();
            if anchors.is_empty() {
                for entry in list.select(&DIV) {
                    modules.push(json!({
                        "type": module_type,
                        "title": element_text(&entry),
                        "link": "",
                    }));
                }
                continue;
            }
            for anchor in anchors {
                modules.push(json!({
                    "type": module_type,
                    "title": element_text(&anchor),
                    "link": anchor.value().attr("href").unwrap_or_default(),
                }));
            }
        }
        modules
    }
}

#[async_trait::async_trait]
impl CourseSource for UclSource {
    fn source_name(&self) -> &'static str {
        UCL_SOURCE
    }

    fn university_title(&self) -> &'static str {
        UCL_UNIVERSITY
    }

    #[instrument(skip(self, fetcher))]
    async fn collect(&self, fetcher: &dyn PageFetcher) -> Result<Vec<RawCourse>> {
        let levels = self.parse_language_levels(&fetcher.fetch(UCL_LANGUAGE_URL).await?);
        if levels.is_empty() {
            return Err(ScraperError::MissingMarkup("UCL English language levels".into()));
        }
        info!("Loaded {} English levels", levels.len());
        let mut ctx = ExtractionContext::new();
        for (level, tests) in levels {
            ctx.insert_language_profile(level, tests);
        }

        let links = self.parse_course_list(&fetcher.fetch(UCL_COURSE_LIST_URL).await?);
        info!("Found {} course links", links.len());

        let mut courses = Vec::new();
        for link in &links {
            match fetcher.fetch(link).await {
                Ok(page) => courses.extend(self.parse_course(&page, link, &ctx)),
                Err(e) => warn!("Failed to fetch course page {}: {}", link, e),
            }
        }

        info!("Extracted {} UCL course records", courses.len());
        Ok(courses)
    }
}

fn heading<'a>(section: &ElementRef<'a>, label: &str) -> Option<ElementRef<'a>> {
    section.select(&H5).find(|h| element_text(h) == label)
}

/// Text of the element following the `h5` labelled `label`.
fn labelled_value(section: &ElementRef, label: &str) -> Option<String> {
    heading(section, label)
        .and_then(|h| next_sibling_element(&h))
        .map(|value| element_text(&value))
}

fn has_class(el: &ElementRef, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// (class, label) pairs for each study mode offered. A `select` lists
/// several modes; plain text names a single one.
fn study_modes(section: &ElementRef) -> Vec<(String, String)> {
    let Some(value) = heading(section, "Study mode").and_then(|h| next_sibling_element(&h)) else {
        return Vec::new();
    };
    if value.value().name() == "select" {
        return value
            .select(&OPTION)
            .filter_map(|option| {
                let class = option.value().attr("value")?;
                Some((class.to_string(), element_text(&option)))
            })
            .collect();
    }
    let label = element_text(&value);
    vec![(label.replace('-', "").to_lowercase(), label)]
}

/// `Data Science MSc` → `MSc`; `Education Grad Dip` → `Grad Dip`.
fn qualification_from_title(title: &str) -> Option<String> {
    let words: Vec<&str> = title.split_whitespace().collect();
    let last = *words.last()?;
    if ["Cert", "Dip", "(International)"].contains(&last) && words.len() > 1 {
        return Some(words[words.len() - 2..].join(" "));
    }
    Some(last.to_string())
}

fn clean_application_dates(text: &str) -> String {
    let stripped = collapse_whitespace(text)
        .replace("All applicants:", "")
        .replace("Applications open", "")
        .replace("Applications closed", "");
    collapse_whitespace(&stripped)
}
