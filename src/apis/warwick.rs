use crate::apis::raw_course;
use crate::constants::{
    DEFAULT_LANGUAGE, GRADUATE_STUDY_LEVEL, WARWICK_BASE_URL, WARWICK_COURSE_LIST_URL,
    WARWICK_DEADLINES_URL, WARWICK_LANGUAGE_URL, WARWICK_RESEARCH_FEES_URL, WARWICK_SOURCE,
    WARWICK_TAUGHT_FEES_URL, WARWICK_UNIVERSITY,
};
use crate::context::{ExtractionContext, FeeLine, FeeRow, LanguageTest};
use crate::error::{Result, ScraperError};
use crate::html::{
    absolute_url, collapse_whitespace, element_text, find_by_text, first, first_in_doc,
    siblings_html_until, text_parts, ANCHOR, H2, P, TD, TR,
};
use crate::types::{CourseSource, PageFetcher, RawCourse};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

static TAUGHT_FEE_ROWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#searchable-table tbody tr").unwrap());
static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static FAQ_SUBHEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h2.faq-subheading").unwrap());
static H3: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").unwrap());
static H4: Lazy<Selector> = Lazy::new(|| Selector::parse("h4").unwrap());
static LI: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static STRONG: Lazy<Selector> = Lazy::new(|| Selector::parse("strong").unwrap());
static DEADLINE_NOTE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.column-2 strong").unwrap());
static COURSE_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("dl p a[href]").unwrap());
static KEY_INFO: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.equal-height-md div.info-content").unwrap());
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static ABOUT_PARAGRAPHS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#course-tab-1 p").unwrap());
static DEADLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2} \w+ \d{4}").unwrap());
static FEE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"£\d+,\d+").unwrap());

/// Qualifications billed at the university-wide research rate.
const RESEARCH_MARKERS: [&str; 6] = ["phd", "research", "mphil", "mres", "ed.d", "engd"];

// Positions of the key-information boxes on a course page
const START_DATE_INFO: usize = 1;
const DURATION_INFO: usize = 2;
const QUALIFICATION_INFO: usize = 3;
const LOCATION_INFO: usize = 5;

/// A course link from the A-Z page. The title is the link text; course
/// pages carry no usable heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseListing {
    pub link: String,
    pub title: String,
}

pub struct WarwickSource;

impl Default for WarwickSource {
    fn default() -> Self {
        Self::new()
    }
}

impl WarwickSource {
    pub fn new() -> Self {
        Self
    }

    /// Taught-course fee rows grouped by student category.
    pub fn parse_taught_fees(&self, html: &str) -> HashMap<String, Vec<FeeRow>> {
        let document = Html::parse_document(html);
        let mut tables: HashMap<String, Vec<FeeRow>> = HashMap::new();
        for row in document.select(&TAUGHT_FEE_ROWS) {
            let cells: Vec<ElementRef> = row.select(&TD).collect();
            if cells.len() < 7 {
                continue;
            }
            tables.entry(element_text(&cells[3])).or_default().push(FeeRow {
                programme: element_text(&cells[0]),
                study_mode: element_text(&cells[2]),
                fee: element_text(&cells[6]),
            });
        }
        tables
    }

    /// Annual research fees: one full-time and one part-time line per
    /// home/overseas row.
    pub fn parse_research_fees(&self, html: &str) -> Vec<FeeLine> {
        let document = Html::parse_document(html);
        let Some(table) = first_in_doc(&document, &TABLE) else {
            warn!("No research fee table found");
            return Vec::new();
        };

        let mut fees = Vec::new();
        for row in table.select(&TR) {
            let cells: Vec<ElementRef> = row.select(&TD).collect();
            if cells.len() < 8 {
                continue;
            }
            let category = element_text(&cells[1]);
            let lowered = category.to_lowercase();
            if !lowered.contains("home") && !lowered.contains("overseas") {
                continue;
            }
            for (study_mode, cell) in [("full-time", &cells[6]), ("part-time", &cells[7])] {
                fees.push(FeeLine {
                    study_mode: study_mode.to_string(),
                    duration: Some("1 Year".to_string()),
                    student_category: category.clone(),
                    fee: element_text(cell),
                });
            }
        }
        fees
    }

    /// Accepted tests per English band. Each test block after the approved
    /// tests heading lists the bands it satisfies in its `h4`.
    pub fn parse_language_bands(&self, html: &str) -> HashMap<String, Vec<LanguageTest>> {
        let document = Html::parse_document(html);
        let mut bands: HashMap<String, Vec<LanguageTest>> = HashMap::new();
        let Some(heading) = first_in_doc(&document, &FAQ_SUBHEADING) else {
            warn!("No approved tests heading found");
            return bands;
        };

        let blocks = heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div");
        for block in blocks {
            let (Some(test), Some(band_heading)) = (first(&block, &H3), first(&block, &H4)) else {
                continue;
            };
            let score = band_heading
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "p")
                .or_else(|| first(&block, &P))
                .map(|p| element_text(&p))
                .unwrap_or_default();
            let language_test = LanguageTest {
                test: element_text(&test),
                score,
            };
            for band in band_names(&element_text(&band_heading)) {
                bands.entry(band).or_default().push(language_test.clone());
            }
        }
        bands
    }

    pub fn parse_application_deadline(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        first_in_doc(&document, &DEADLINE_NOTE)
            .and_then(|note| DEADLINE.find(&element_text(&note)).map(|m| m.as_str().to_string()))
            .into_iter()
            .collect()
    }

    pub fn parse_course_list(&self, html: &str) -> Vec<CourseListing> {
        let document = Html::parse_document(html);
        document
            .select(&COURSE_LINKS)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let link = if href.starts_with("http") || href.starts_with('/') {
                    absolute_url(WARWICK_BASE_URL, href)
                } else {
                    format!("{WARWICK_COURSE_LIST_URL}{href}")
                };
                Some(CourseListing {
                    link,
                    title: element_text(&a),
                })
            })
            .collect()
    }

    /// One raw record per qualification listed on the page (`MSc/PGDip`).
    pub fn parse_course(
        &self,
        html: &str,
        listing: &CourseListing,
        ctx: &ExtractionContext,
    ) -> Vec<RawCourse> {
        let document = Html::parse_document(html);
        let key_info: Vec<ElementRef> = document.select(&KEY_INFO).collect();

        let qualifications: Vec<String> = key_info
            .get(QUALIFICATION_INFO)
            .map(|info| {
                element_text(info)
                    .split('/')
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if qualifications.is_empty() {
            debug!("Skipping {}: qualification not found", listing.link);
            return Vec::new();
        }

        let durations: Vec<String> = key_info
            .get(DURATION_INFO)
            .map(|info| {
                text_parts(info)
                    .iter()
                    .flat_map(|part| part.split(';'))
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let start_dates = key_info.get(START_DATE_INFO).map(text_parts).unwrap_or_default();
        let locations: Vec<String> = key_info
            .get(LOCATION_INFO)
            .map(element_text)
            .filter(|l| !l.is_empty())
            .into_iter()
            .collect();

        let description = first_in_doc(&document, &META_DESCRIPTION)
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string);
        let about = self.about(&document);
        let entry_requirements = find_by_text(&document, &H4, "Minimum requirements")
            .map(|heading| siblings_html_until(&heading, "h4"));
        let language_requirements = self.language_requirements(&document, ctx);
        let modules = self.modules(&document);

        qualifications
            .iter()
            .map(|qualification| {
                raw_course(json!({
                    "link": listing.link,
                    "title": listing.title,
                    "study_level": GRADUATE_STUDY_LEVEL,
                    "qualification": qualification,
                    "university_title": WARWICK_UNIVERSITY,
                    "locations": locations,
                    "description": description,
                    "about": about,
                    "tuitions": self.tuitions(&document, &listing.title, qualification, &durations, ctx),
                    "start_dates": start_dates,
                    "application_dates": ctx.default_application_dates(),
                    "entry_requirements": entry_requirements,
                    "language_requirements": language_requirements,
                    "modules": modules,
                }))
            })
            .collect()
    }

    fn about(&self, document: &Html) -> Option<String> {
        let paragraphs: Vec<String> =
            document.select(&ABOUT_PARAGRAPHS).map(|p| p.html()).collect();
        if paragraphs.is_empty() {
            debug!("About tab not found");
            return None;
        }
        Some(paragraphs.concat())
    }

    fn tuitions(
        &self,
        document: &Html,
        title: &str,
        qualification: &str,
        durations: &[String],
        ctx: &ExtractionContext,
    ) -> Vec<Value> {
        let lowered = qualification.to_lowercase();
        if RESEARCH_MARKERS.iter().any(|m| lowered.contains(m)) {
            return ctx
                .research_fees()
                .iter()
                .map(|line| {
                    json!({
                        "study_mode": line.study_mode,
                        "duration": line.duration,
                        "student_category": line.student_category,
                        "fee": line.fee,
                    })
                })
                .collect();
        }

        // Part-time professional courses state a single annual fee on the page
        let page_fee = find_by_text(document, &H3, "Fees and funding")
            .and_then(|heading| heading.next_siblings().find_map(ElementRef::wrap))
            .and_then(|el| FEE_AMOUNT.find(&element_text(&el)).map(|m| m.as_str().to_string()));
        if let Some(fee) = page_fee {
            return vec![json!({
                "study_mode": "part-time",
                "duration": "1 Year",
                "student_category": "All",
                "fee": fee,
            })];
        }

        let qualification = if lowered == "pgdip" { "Postgraduate Diploma" } else { qualification };
        let name = title.split_once(" (").map_or(title, |(name, _)| name).trim();
        let programme = programme_key(&format!("{name} ({qualification})"));

        let mut tuitions: Vec<Value> = Vec::new();
        for (student_category, rows) in ctx.fee_tables() {
            for row in rows.iter().filter(|row| programme_key(&row.programme) == programme) {
                tuitions.push(json!({
                    "study_mode": row.study_mode,
                    "duration": null,
                    "student_category": student_category,
                    "fee": row.fee,
                }));
            }
        }
        if tuitions.is_empty() {
            debug!("No fee rows for '{}'", programme);
        }

        for entry in durations {
            let (study_mode, duration) = split_study_mode(entry);
            let mut matched = false;
            for tuition in tuitions.iter_mut() {
                let mode = tuition["study_mode"].as_str().map(study_mode_key);
                if mode.as_deref() == Some(study_mode_key(study_mode).as_str()) {
                    tuition["duration"] = json!(duration);
                    matched = true;
                }
            }
            if !matched {
                tuitions.push(json!({
                    "study_mode": study_mode,
                    "duration": duration,
                    "student_category": "",
                    "fee": null,
                }));
            }
        }
        tuitions
    }

    fn language_requirements(&self, document: &Html, ctx: &ExtractionContext) -> Vec<Value> {
        let Some(band) = document
            .select(&LI)
            .map(|li| element_text(&li))
            .find(|text| text.contains("Band"))
            .and_then(|text| text.split_whitespace().nth(1).map(str::to_string))
        else {
            debug!("English band not found");
            return Vec::new();
        };
        match ctx.language_profile(&band) {
            Some(tests) => tests
                .iter()
                .map(|t| json!({"language": DEFAULT_LANGUAGE, "test": t.test, "score": t.score}))
                .collect(),
            None => {
                debug!("Unknown English band '{}'", band);
                Vec::new()
            }
        }
    }

    fn modules(&self, document: &Html) -> Vec<Value> {
        let mut modules = Vec::new();

        if let Some(core) = find_by_text(document, &H2, "Core modules") {
            for sibling in core.next_siblings().filter_map(ElementRef::wrap) {
                match sibling.value().name() {
                    "p" => {
                        let Some(title) = first(&sibling, &STRONG).map(|s| element_text(&s)) else {
                            continue;
                        };
                        if title.is_empty() {
                            continue;
                        }
                        let link = first(&sibling, &ANCHOR)
                            .and_then(|a| a.value().attr("href"))
                            .unwrap_or_default();
                        modules.push(json!({"type": "Core module", "title": title, "link": link}));
                    }
                    "ul" => {
                        for li in sibling.select(&LI) {
                            modules.push(json!({
                                "type": "Core module",
                                "title": element_text(&li),
                                "link": "",
                            }));
                        }
                    }
                    "h3" => break,
                    _ => {}
                }
            }
        }

        if let Some(optional) = find_by_text(document, &H3, "Optional modules") {
            let lists = optional
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "ul");
            for list in lists {
                for li in list.select(&LI) {
                    modules.push(json!({
                        "type": "Optional module",
                        "title": element_text(&li),
                        "link": "",
                    }));
                }
            }
        }
        modules
    }

    async fn build_context(&self, fetcher: &dyn PageFetcher) -> Result<ExtractionContext> {
        let mut ctx = ExtractionContext::new();

        let bands = self.parse_language_bands(&fetcher.fetch(WARWICK_LANGUAGE_URL).await?);
        if bands.is_empty() {
            return Err(ScraperError::MissingMarkup("Warwick English language bands".into()));
        }
        info!("Loaded {} English bands", bands.len());
        for (band, tests) in bands {
            ctx.insert_language_profile(band, tests);
        }

        for (category, rows) in self.parse_taught_fees(&fetcher.fetch(WARWICK_TAUGHT_FEES_URL).await?) {
            ctx.insert_fee_table(category, rows);
        }
        ctx.set_research_fees(self.parse_research_fees(&fetcher.fetch(WARWICK_RESEARCH_FEES_URL).await?));

        match fetcher.fetch(WARWICK_DEADLINES_URL).await {
            Ok(page) => ctx.set_default_application_dates(self.parse_application_deadline(&page)),
            Err(e) => warn!("Failed to fetch application deadlines: {}", e),
        }
        Ok(ctx)
    }
}

#[async_trait::async_trait]
impl CourseSource for WarwickSource {
    fn source_name(&self) -> &'static str {
        WARWICK_SOURCE
    }

    fn university_title(&self) -> &'static str {
        WARWICK_UNIVERSITY
    }

    #[instrument(skip(self, fetcher))]
    async fn collect(&self, fetcher: &dyn PageFetcher) -> Result<Vec<RawCourse>> {
        let ctx = self.build_context(fetcher).await?;

        let listings = self.parse_course_list(&fetcher.fetch(WARWICK_COURSE_LIST_URL).await?);
        info!("Found {} course listings", listings.len());

        let mut courses = Vec::new();
        for listing in &listings {
            match fetcher.fetch(&listing.link).await {
                Ok(page) => courses.extend(self.parse_course(&page, listing, &ctx)),
                Err(e) => warn!("Failed to fetch course page {}: {}", listing.link, e),
            }
        }

        info!("Extracted {} Warwick course records", courses.len());
        Ok(courses)
    }
}

/// `Bands: A, B and C` and `Band A, B and C` both give `[A, B, C]`.
fn band_names(heading: &str) -> Vec<String> {
    let list = heading.split_once(':').map_or(heading, |(_, rest)| rest);
    list.split(',')
        .flat_map(|part| part.split(" and "))
        .map(|part| part.trim().trim_start_matches("Bands").trim_start_matches("Band").trim())
        .filter(|band| !band.is_empty())
        .map(str::to_string)
        .collect()
}

/// `2 years part-time` → (`Part Time`, `2 years`). Entries without a study
/// mode keep their text as the duration.
fn split_study_mode(entry: &str) -> (&'static str, String) {
    let lowered = entry.to_lowercase();
    let study_mode = if lowered.contains("part-time") {
        "Part Time"
    } else if lowered.contains("full-time") {
        "Full Time"
    } else {
        return ("", entry.to_string());
    };
    let mut words: Vec<&str> = entry.split_whitespace().collect();
    words.pop();
    (study_mode, words.join(" "))
}

fn study_mode_key(mode: &str) -> String {
    mode.to_lowercase().replace('-', " ")
}

fn programme_key(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_lists_accept_both_heading_styles() {
        assert_eq!(band_names("Bands: A, B and C"), vec!["A", "B", "C"]);
        assert_eq!(band_names("Band A, B and C"), vec!["A", "B", "C"]);
        assert_eq!(band_names("Band D"), vec!["D"]);
    }

    #[test]
    fn study_mode_is_taken_from_the_last_word() {
        assert_eq!(split_study_mode("1 year full-time"), ("Full Time", "1 year".to_string()));
        assert_eq!(split_study_mode("2 years part-time"), ("Part Time", "2 years".to_string()));
        assert_eq!(split_study_mode("Up to 3 years"), ("", "Up to 3 years".to_string()));
    }

    #[test]
    fn fee_study_modes_compare_loosely() {
        assert_eq!(study_mode_key("Full-time"), study_mode_key("Full Time"));
    }
}
