use crate::apis::raw_course;
use crate::constants::{
    BRISTOL_BASE_URL, BRISTOL_COURSE_LIST_URL, BRISTOL_INTERNATIONAL_FEES_URL,
    BRISTOL_LANGUAGE_PROFILES_URL, BRISTOL_POSTGRADUATE_INDEX, BRISTOL_SOURCE,
    BRISTOL_TAUGHT_PREFIX, BRISTOL_UK_FEES_URL, BRISTOL_UNIVERSITY, DEFAULT_LANGUAGE,
    GRADUATE_STUDY_LEVEL,
};
use crate::context::{ExtractionContext, FeeRow, LanguageTest};
use crate::error::{Result, ScraperError};
use crate::html::{
    absolute_url, collapse_whitespace, definition, element_text, find_by_text, first,
    first_in_doc, html_without, next_sibling_element, strip_parenthetical, text_parts,
    text_without, ANCHOR, H2, P, TD, TR,
};
use crate::types::{CourseSource, PageFetcher, RawCourse};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

static FEE_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse(".table-filter").unwrap());
static PROFILE_MENU_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse(".list-menu a").unwrap());
static BUTTON: Lazy<Selector> = Lazy::new(|| Selector::parse("button").unwrap());
static COURSE_CARD: Lazy<Selector> = Lazy::new(|| Selector::parse(".search-result--course").unwrap());
static CARD_TAXONOMY: Lazy<Selector> = Lazy::new(|| Selector::parse(".search-result__taxonomy").unwrap());
static CARD_META_DD: Lazy<Selector> = Lazy::new(|| Selector::parse(".search-result__meta dd").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static OVERVIEW: Lazy<Selector> = Lazy::new(|| Selector::parse(".course-overview__main").unwrap());
static ENTRY_REQUIREMENTS: Lazy<Selector> = Lazy::new(|| Selector::parse("#entry-requirements").unwrap());
static LANGUAGE_PROFILE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#accordion-english-language a").unwrap());
static PROGRAMME_STRUCTURE_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#programme-structure a").unwrap());
static UNIT_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse(".table-basic").unwrap());
static THEAD: Lazy<Selector> = Lazy::new(|| Selector::parse("thead").unwrap());
static DEADLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:st|nd|rd|th)?\s\w+\s\d+").unwrap());

const LANGUAGE_TESTS_HEADING: &str = "English Language Proficiency Tests";

/// One search-result card: a taught course page and the qualifications it
/// is offered as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseListing {
    pub link: String,
    pub qualifications: Vec<String>,
}

pub struct BristolSource;

impl Default for BristolSource {
    fn default() -> Self {
        Self::new()
    }
}

impl BristolSource {
    pub fn new() -> Self {
        Self
    }

    /// Rows of a fee table page: programme, study mode and fee.
    pub fn parse_fee_table(&self, html: &str) -> Vec<FeeRow> {
        let document = Html::parse_document(html);
        let Some(table) = first_in_doc(&document, &FEE_TABLE) else {
            warn!("No fee table found");
            return Vec::new();
        };

        table
            .select(&TR)
            .skip(1)
            .filter_map(|row| {
                let cells: Vec<ElementRef> = row.select(&TD).collect();
                if cells.len() != 5 {
                    return None;
                }
                let mode = element_text(&cells[3]);
                Some(FeeRow {
                    programme: element_text(&cells[2]),
                    study_mode: if mode == "FT" { "Full-time" } else { "Part-time" }.to_string(),
                    fee: element_text(&cells[4]),
                })
            })
            .collect()
    }

    /// Links to the individual language profile pages. The menu's last entry
    /// is not a profile.
    pub fn parse_language_profile_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut links: Vec<String> = document
            .select(&PROFILE_MENU_LINKS)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| absolute_url(BRISTOL_BASE_URL, href))
            .collect();
        links.pop();
        links
    }

    /// Accepted tests on one profile page, keyed by the profile letter taken
    /// from the page URL (`.../profile-b/` → `b`).
    pub fn parse_language_profile(&self, html: &str, url: &str) -> Option<(String, Vec<LanguageTest>)> {
        let document = Html::parse_document(html);
        let table = find_by_text(&document, &H2, LANGUAGE_TESTS_HEADING)
            .or_else(|| find_by_text(&document, &BUTTON, LANGUAGE_TESTS_HEADING))
            .and_then(|heading| next_sibling_element(&heading))?;

        let tests = table
            .select(&TR)
            .skip(1)
            .filter_map(|row| {
                let mut cells = row.select(&TD);
                let test = element_text(&cells.next()?);
                let score = element_text(&cells.next()?);
                Some(LanguageTest { test, score })
            })
            .collect();

        Some((profile_key(url), tests))
    }

    pub fn parse_course_list(&self, html: &str) -> Vec<CourseListing> {
        let document = Html::parse_document(html);
        document
            .select(&COURSE_CARD)
            .filter(|card| {
                first(card, &CARD_TAXONOMY)
                    .map(|t| element_text(&t).contains("Taught"))
                    .unwrap_or(false)
            })
            .filter_map(|card| {
                let href = first(&card, &ANCHOR)?.value().attr("href")?;
                let link = absolute_url(BRISTOL_BASE_URL, href);
                if !link.starts_with(BRISTOL_TAUGHT_PREFIX) {
                    return None;
                }
                let qualifications = card
                    .select(&CARD_META_DD)
                    .last()
                    .map(|dd| {
                        element_text(&dd)
                            .split(',')
                            .map(strip_parenthetical)
                            .filter(|q| !q.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                Some(CourseListing { link, qualifications })
            })
            .collect()
    }

    /// Builds the raw record for one qualification of a course page. Returns
    /// `None` when the page has no title, which marks non-course pages.
    pub fn parse_course(
        &self,
        html: &str,
        link: &str,
        qualification: &str,
        qualifications: &[String],
        ctx: &ExtractionContext,
    ) -> Option<RawCourse> {
        let document = Html::parse_document(html);
        let title = self.title(&document, qualifications)?;

        let locations = if title.to_lowercase().contains("online") {
            vec!["Online".to_string()]
        } else {
            self.locations(&document)
        };

        Some(raw_course(json!({
            "link": link,
            "title": title,
            "study_level": GRADUATE_STUDY_LEVEL,
            "qualification": qualification,
            "university_title": BRISTOL_UNIVERSITY,
            "locations": locations,
            "description": self.description(&document),
            "about": self.about(&document),
            "tuitions": self.tuitions(&document, &title, qualification, ctx),
            "start_dates": self.start_dates(&document),
            "application_dates": self.application_dates(&document),
            "entry_requirements": self.entry_requirements(&document),
            "language_requirements": self.language_requirements(&document, ctx),
        })))
    }

    /// Link to the unit catalogue listing this programme's modules.
    pub fn modules_link(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&PROGRAMME_STRUCTURE_LINKS)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| href.contains("unit-programme-catalogue"))
            .map(|href| absolute_url(BRISTOL_BASE_URL, href))
    }

    /// Units from a programme catalogue page. Rows without a linked unit
    /// name are headings and are skipped.
    pub fn parse_modules(&self, html: &str) -> Vec<Value> {
        let document = Html::parse_document(html);
        let Some(table) = first_in_doc(&document, &UNIT_TABLE) else {
            debug!("No unit table on catalogue page");
            return Vec::new();
        };
        let header = first(&table, &THEAD).map(|h| h.id());

        table
            .select(&TR)
            .filter(|row| header.map_or(true, |id| !row.ancestors().any(|a| a.id() == id)))
            .filter_map(|row| {
                let cells: Vec<ElementRef> = row.select(&TD).collect();
                if cells.len() != 5 {
                    return None;
                }
                let unit = first(&cells[0], &ANCHOR)?;
                let href = unit.value().attr("href")?;
                Some(json!({
                    "type": element_text(&cells[3]),
                    "title": element_text(&unit),
                    "link": absolute_url(BRISTOL_BASE_URL, href),
                }))
            })
            .collect()
    }

    fn title(&self, document: &Html, qualifications: &[String]) -> Option<String> {
        let mut title = element_text(&first_in_doc(document, &H1)?);
        for qualification in qualifications {
            title = title.replace(qualification.as_str(), "").trim().to_string();
        }
        Some(title)
    }

    fn locations(&self, document: &Html) -> Vec<String> {
        let Some(dd) = definition(document, "Location") else {
            debug!("Location not found");
            return Vec::new();
        };
        element_text(&dd)
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                if l.to_lowercase().starts_with("distance") {
                    l.to_string()
                } else {
                    format!("{l}, Bristol")
                }
            })
            .collect()
    }

    fn description(&self, document: &Html) -> Option<String> {
        let overview = first_in_doc(document, &OVERVIEW)?;
        let text = element_text(&first(&overview, &P)?);
        let sentence = text.split('.').next().unwrap_or_default().trim();
        Some(format!("{sentence}."))
    }

    fn about(&self, document: &Html) -> Option<String> {
        first_in_doc(document, &OVERVIEW).map(|overview| html_without(&overview, &H2))
    }

    fn tuitions(
        &self,
        document: &Html,
        title: &str,
        qualification: &str,
        ctx: &ExtractionContext,
    ) -> Vec<Value> {
        let mut durations: HashMap<&str, String> = HashMap::new();
        if let Some(dd) = definition(document, "Programme duration") {
            for part in text_parts(&dd) {
                for mode in ["full-time", "part-time"] {
                    if let Some((duration, _)) = part.split_once(mode) {
                        durations.insert(mode, duration.trim().to_string());
                        break;
                    }
                }
            }
        } else {
            debug!("Programme duration not found");
        }

        let programme = programme_key(&format!("{title} ({qualification})"));
        let mut tuitions = Vec::new();
        for (student_category, rows) in ctx.fee_tables() {
            let matched: Vec<&FeeRow> = rows
                .iter()
                .filter(|row| programme_key(&row.programme) == programme)
                .collect();
            if matched.is_empty() {
                debug!("No {} fee row for '{}'", student_category, programme);
            }
            for row in matched {
                tuitions.push(json!({
                    "study_mode": row.study_mode,
                    "duration": durations.get(row.study_mode.to_lowercase().as_str()),
                    "student_category": student_category,
                    "fee": row.fee,
                }));
            }
        }
        tuitions
    }

    fn start_dates(&self, document: &Html) -> Vec<String> {
        definition(document, "Start date")
            .map(|dd| text_parts(&dd))
            .unwrap_or_default()
    }

    fn application_dates(&self, document: &Html) -> Vec<String> {
        definition(document, "Application deadline")
            .map(|dd| {
                DEADLINE
                    .find_iter(&element_text(&dd))
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn entry_requirements(&self, document: &Html) -> Option<String> {
        let section = first_in_doc(document, &ENTRY_REQUIREMENTS)?;
        let text = collapse_whitespace(&text_without(&section, &H2));
        (!text.is_empty()).then_some(text)
    }

    fn language_requirements(&self, document: &Html, ctx: &ExtractionContext) -> Vec<Value> {
        let Some(href) = first_in_doc(document, &LANGUAGE_PROFILE_LINK).and_then(|a| a.value().attr("href"))
        else {
            return Vec::new();
        };
        let profile = profile_key(href);
        match ctx.language_profile(&profile) {
            Some(tests) => tests
                .iter()
                .map(|t| json!({"language": DEFAULT_LANGUAGE, "test": t.test, "score": t.score}))
                .collect(),
            None => {
                debug!("Unknown language profile '{}'", profile);
                Vec::new()
            }
        }
    }

    async fn build_context(&self, fetcher: &dyn PageFetcher) -> Result<ExtractionContext> {
        let mut ctx = ExtractionContext::new();

        for (category, url) in [("uk", BRISTOL_UK_FEES_URL), ("international", BRISTOL_INTERNATIONAL_FEES_URL)] {
            let rows = self.parse_fee_table(&fetcher.fetch(url).await?);
            info!("Loaded {} {} fee rows", rows.len(), category);
            ctx.insert_fee_table(category, rows);
        }

        let profiles_page = fetcher.fetch(BRISTOL_LANGUAGE_PROFILES_URL).await?;
        for url in self.parse_language_profile_links(&profiles_page) {
            let page = match fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to fetch language profile {}: {}", url, e);
                    continue;
                }
            };
            match self.parse_language_profile(&page, &url) {
                Some((profile, tests)) => ctx.insert_language_profile(profile, tests),
                None => warn!("No language test table on {}", url),
            }
        }

        if ctx.language_profile_count() == 0 {
            return Err(ScraperError::MissingMarkup(
                "no Bristol language profiles could be read".into(),
            ));
        }
        Ok(ctx)
    }
}

#[async_trait::async_trait]
impl CourseSource for BristolSource {
    fn source_name(&self) -> &'static str {
        BRISTOL_SOURCE
    }

    fn university_title(&self) -> &'static str {
        BRISTOL_UNIVERSITY
    }

    #[instrument(skip(self, fetcher))]
    async fn collect(&self, fetcher: &dyn PageFetcher) -> Result<Vec<RawCourse>> {
        let ctx = self.build_context(fetcher).await?;

        let listings = self.parse_course_list(&fetcher.fetch(BRISTOL_COURSE_LIST_URL).await?);
        info!("Found {} taught course listings", listings.len());

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut courses = Vec::new();

        for listing in listings {
            if listing.link == BRISTOL_POSTGRADUATE_INDEX {
                continue;
            }
            let qualifications: Vec<&String> = listing
                .qualifications
                .iter()
                .filter(|q| !seen.contains(&(listing.link.clone(), (*q).clone())))
                .collect();
            if qualifications.is_empty() {
                debug!("Already extracted {}", listing.link);
                continue;
            }
            let page = match fetcher.fetch(&listing.link).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to fetch course page {}: {}", listing.link, e);
                    continue;
                }
            };

            let modules = match self.modules_link(&page) {
                Some(url) => match fetcher.fetch(&url).await {
                    Ok(catalogue) => self.parse_modules(&catalogue),
                    Err(e) => {
                        warn!("Failed to fetch unit catalogue {}: {}", url, e);
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };

            for qualification in qualifications {
                if !seen.insert((listing.link.clone(), qualification.clone())) {
                    continue;
                }
                let Some(mut course) =
                    self.parse_course(&page, &listing.link, qualification, &listing.qualifications, &ctx)
                else {
                    debug!("Skipping {}: no title", listing.link);
                    continue;
                };
                course.insert("modules".into(), Value::Array(modules.clone()));
                courses.push(course);
            }
        }

        info!("Extracted {} Bristol course records", courses.len());
        Ok(courses)
    }
}

/// `.../profile-b/` → `b`
fn profile_key(url: &str) -> String {
    url.rsplit('-').next().unwrap_or_default().replace('/', "")
}

fn programme_key(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}
