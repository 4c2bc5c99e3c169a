/// Source name constants shared by the CLI, the sources and the pipeline.

// Source names (used in CLI)
pub const BRISTOL_SOURCE: &str = "bristol";
pub const OXFORD_SOURCE: &str = "oxford";
pub const WARWICK_SOURCE: &str = "warwick";
pub const UCL_SOURCE: &str = "ucl";

// Institution names stamped on every record of a source
pub const BRISTOL_UNIVERSITY: &str = "University of Bristol";
pub const OXFORD_UNIVERSITY: &str = "University of Oxford";
pub const WARWICK_UNIVERSITY: &str = "University of Warwick";
pub const UCL_UNIVERSITY: &str = "University College London";

pub const GRADUATE_STUDY_LEVEL: &str = "Graduate";

// Run defaults
pub const DEFAULT_ACADEMIC_YEAR: &str = "2024-2025";
pub const DEFAULT_SCHEMA_VERSION: &str = "2024-01-05";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 65;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/98.0.4758.82 Safari/537.36";

pub const DEFAULT_LANGUAGE: &str = "English";

pub const UNKNOWN_LINK: &str = "<unknown>";

// Bristol endpoints
pub const BRISTOL_BASE_URL: &str = "https://www.bristol.ac.uk";
pub const BRISTOL_UK_FEES_URL: &str =
    "https://bristol.ac.uk/students/support/finances/tuition-fees/pgt/home/23-24/2023-starters/";
pub const BRISTOL_INTERNATIONAL_FEES_URL: &str =
    "https://bristol.ac.uk/students/support/finances/tuition-fees/pgt/overseas/23-24/2023-starters/";
pub const BRISTOL_LANGUAGE_PROFILES_URL: &str = "https://www.bristol.ac.uk/study/language-requirements/";
pub const BRISTOL_COURSE_LIST_URL: &str =
    "http://www.bristol.ac.uk/study/postgraduate/search/?filterStudyType=Taught&q=";
pub const BRISTOL_TAUGHT_PREFIX: &str = "https://www.bristol.ac.uk/study/postgraduate/taught/";
pub const BRISTOL_POSTGRADUATE_INDEX: &str = "https://www.bristol.ac.uk/study/postgraduate/";

// Oxford endpoints
pub const OXFORD_BASE_URL: &str = "https://www.ox.ac.uk";
pub const OXFORD_LANGUAGE_URL: &str = "https://www.ox.ac.uk/admissions/graduate/applying-to-oxford/application-guide/qualifications-experience-languages-funding/english-language-proficiency";
pub const OXFORD_COURSE_LIST_PAGES: usize = 5;

pub fn oxford_course_list_url(page: usize) -> String {
    format!("{OXFORD_BASE_URL}/admissions/graduate/courses/courses-a-z-listing?page={page}")
}

// Warwick endpoints
pub const WARWICK_BASE_URL: &str = "https://warwick.ac.uk";
pub const WARWICK_COURSE_LIST_URL: &str = "https://warwick.ac.uk/study/postgraduate/courses/";
pub const WARWICK_LANGUAGE_URL: &str =
    "https://warwick.ac.uk/study/postgraduate/apply/english/englishlanguagealternative/";
pub const WARWICK_TAUGHT_FEES_URL: &str =
    "https://warwick.ac.uk/services/finance/studentfinance/fees/postgraduatefees";
pub const WARWICK_RESEARCH_FEES_URL: &str = "https://warwick.ac.uk/services/finance/studentfinance/fees/pgr";
pub const WARWICK_DEADLINES_URL: &str = "https://warwick.ac.uk/study/postgraduate/apply/english";

// UCL endpoints
pub const UCL_BASE_URL: &str = "https://www.ucl.ac.uk";
pub const UCL_COURSE_LIST_URL: &str = "https://www.ucl.ac.uk/prospective-students/graduate/taught-degrees/";
pub const UCL_LANGUAGE_URL: &str =
    "https://www.ucl.ac.uk/prospective-students/graduate/english-language-requirements";

/// Get all supported source names
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![BRISTOL_SOURCE, OXFORD_SOURCE, WARWICK_SOURCE, UCL_SOURCE]
}
