use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One accepted certificate and the score it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTest {
    pub test: String,
    pub score: String,
}

/// One row of an institution-wide fee table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRow {
    pub programme: String,
    pub study_mode: String,
    pub fee: String,
}

/// A complete fee line that applies to every course of a kind, such as a
/// university-wide research degree fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLine {
    pub study_mode: String,
    pub duration: Option<String>,
    pub student_category: String,
    pub fee: String,
}

/// Lookup tables collected from shared pages before course pages are
/// visited. Built once per source run and passed by reference into every
/// course-page extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    language_certificates: HashMap<String, Vec<LanguageTest>>,
    tuition_fees: HashMap<String, Vec<FeeRow>>,
    research_fees: Vec<FeeLine>,
    default_application_dates: Vec<String>,
}

impl ExtractionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_language_profile(&mut self, profile: impl Into<String>, tests: Vec<LanguageTest>) {
        self.language_certificates.insert(profile.into(), tests);
    }

    pub fn language_profile(&self, profile: &str) -> Option<&[LanguageTest]> {
        self.language_certificates.get(profile).map(Vec::as_slice)
    }

    pub fn language_profile_count(&self) -> usize {
        self.language_certificates.len()
    }

    pub fn insert_fee_table(&mut self, student_category: impl Into<String>, rows: Vec<FeeRow>) {
        self.tuition_fees.insert(student_category.into(), rows);
    }

    /// Fee tables sorted by student category so output order is stable.
    pub fn fee_tables(&self) -> Vec<(&str, &[FeeRow])> {
        let mut tables: Vec<(&str, &[FeeRow])> = self
            .tuition_fees
            .iter()
            .map(|(category, rows)| (category.as_str(), rows.as_slice()))
            .collect();
        tables.sort_by(|a, b| a.0.cmp(b.0));
        tables
    }

    pub fn set_research_fees(&mut self, fees: Vec<FeeLine>) {
        self.research_fees = fees;
    }

    pub fn research_fees(&self) -> &[FeeLine] {
        &self.research_fees
    }

    /// Deadlines that apply to every course of the source.
    pub fn set_default_application_dates(&mut self, dates: Vec<String>) {
        self.default_application_dates = dates;
    }

    pub fn default_application_dates(&self) -> &[String] {
        &self.default_application_dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_looked_up_by_key() {
        let mut ctx = ExtractionContext::new();
        ctx.insert_language_profile(
            "b",
            vec![LanguageTest { test: "IELTS".into(), score: "6.5".into() }],
        );
        assert_eq!(ctx.language_profile("b").map(|t| t.len()), Some(1));
        assert!(ctx.language_profile("a").is_none());
        assert_eq!(ctx.language_profile_count(), 1);
    }

    #[test]
    fn fee_tables_are_sorted_by_category() {
        let mut ctx = ExtractionContext::new();
        ctx.insert_fee_table("uk", Vec::new());
        ctx.insert_fee_table("international", Vec::new());
        let categories: Vec<&str> = ctx.fee_tables().into_iter().map(|(c, _)| c).collect();
        assert_eq!(categories, vec!["international", "uk"]);
    }
}
