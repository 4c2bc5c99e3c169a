use crate::config::RunConfig;
use crate::course::{is_course_field, CourseRecord, Date, LanguageRequirement, Location, Module, Tuition};
use crate::error::NormalizeError;
use crate::types::RawCourse;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Process-wide metadata stamped on every record of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStamp {
    pub schema_version: String,
    pub academic_year: String,
}

impl RecordStamp {
    pub fn new(schema_version: impl Into<String>, academic_year: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            academic_year: academic_year.into(),
        }
    }
}

impl From<&RunConfig> for RecordStamp {
    fn from(run: &RunConfig) -> Self {
        Self::new(run.schema_version.clone(), run.academic_year.clone())
    }
}

/// Turns raw extractor output into validated [`CourseRecord`]s.
///
/// Stateless apart from the stamp, so one instance can be shared across
/// tasks.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stamp: RecordStamp,
}

impl Normalizer {
    pub fn new(stamp: RecordStamp) -> Self {
        Self { stamp }
    }

    pub fn stamp(&self) -> &RecordStamp {
        &self.stamp
    }

    pub fn normalize(&self, raw: &RawCourse) -> Result<CourseRecord, NormalizeError> {
        let mut unknown: Vec<String> = raw
            .keys()
            .filter(|key| !is_course_field(key))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(NormalizeError::SchemaViolation { fields: unknown });
        }

        let locations = convert_list(raw, "locations", Location::from_raw)?;
        let start_dates = convert_list(raw, "start_dates", Date::from_raw)?;
        let application_dates = convert_list(raw, "application_dates", Date::from_raw)?;
        let language_requirements =
            convert_list(raw, "language_requirements", LanguageRequirement::from_raw)?;
        let modules = convert_list(raw, "modules", Module::from_raw)?;
        let tuitions = convert_list(raw, "tuitions", Tuition::from_raw)?;

        let mut merged = Map::new();
        merged.insert("schema_version".into(), Value::String(self.stamp.schema_version.clone()));
        merged.insert("academic_year".into(), Value::String(self.stamp.academic_year.clone()));
        for (key, value) in raw {
            merged.insert(key.clone(), value.clone());
        }
        merged.insert("locations".into(), to_value(&locations)?);
        merged.insert("start_dates".into(), to_value(&start_dates)?);
        merged.insert("application_dates".into(), to_value(&application_dates)?);
        merged.insert("language_requirements".into(), to_value(&language_requirements)?);
        merged.insert("modules".into(), to_value(&modules)?);
        merged.insert("tuitions".into(), to_value(&tuitions)?);

        // Run metadata always comes from the stamp, never from the extractor
        for (key, stamped) in [
            ("schema_version", &self.stamp.schema_version),
            ("academic_year", &self.stamp.academic_year),
        ] {
            if let Some(supplied) = raw.get(key).filter(|v| v.as_str() != Some(stamped)) {
                debug!("Overriding extractor-supplied {} {} with {}", key, supplied, stamped);
            }
            merged.insert(key.into(), Value::String(stamped.clone()));
        }

        serde_json::from_value(Value::Object(merged))
            .map_err(|e| NormalizeError::field_type("course", e.to_string()))
    }
}

fn convert_list<T, F>(raw: &RawCourse, field: &str, convert: F) -> Result<Vec<T>, NormalizeError>
where
    F: Fn(&Value, &str) -> Result<T, NormalizeError>,
{
    match raw.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| convert(item, &format!("{field}[{i}]")))
            .collect(),
        Some(_) => Err(NormalizeError::field_type(field, "expected array")),
    }
}

fn to_value<T: Serialize>(items: &[T]) -> Result<Value, NormalizeError> {
    serde_json::to_value(items).map_err(|e| NormalizeError::field_type("course", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(RecordStamp::new("2024-01-05", "2024-2025"))
    }

    fn raw(value: Value) -> RawCourse {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn absent_lists_become_empty() {
        let record = normalizer()
            .normalize(&raw(json!({"link": "https://example.ac.uk/msc", "title": "MSc Physics"})))
            .unwrap();
        assert!(record.locations.is_empty());
        assert!(record.tuitions.is_empty());
        assert_eq!(record.title.as_deref(), Some("MSc Physics"));
        assert_eq!(record.description, None);
    }

    #[test]
    fn null_list_is_treated_as_empty() {
        let record = normalizer().normalize(&raw(json!({"modules": null}))).unwrap();
        assert!(record.modules.is_empty());
    }

    #[test]
    fn non_array_list_is_a_type_error() {
        let err = normalizer()
            .normalize(&raw(json!({"locations": "Bristol"})))
            .unwrap_err();
        assert_eq!(err, NormalizeError::field_type("locations", "expected array"));
    }

    #[test]
    fn every_unknown_field_is_reported() {
        let err = normalizer()
            .normalize(&raw(json!({"title": "x", "zeta": 1, "alpha": 2})))
            .unwrap_err();
        assert_eq!(
            err,
            NormalizeError::SchemaViolation {
                fields: vec!["alpha".to_string(), "zeta".to_string()]
            }
        );
    }

    #[test]
    fn wrong_scalar_type_fails_the_final_gate() {
        let err = normalizer().normalize(&raw(json!({"title": 42}))).unwrap_err();
        assert!(matches!(err, NormalizeError::FieldTypeError { ref field, .. } if field == "course"));
    }

    #[test]
    fn nested_error_names_the_element() {
        let err = normalizer()
            .normalize(&raw(json!({"modules": [
                {"type": "Core", "title": "A", "link": ""},
                {"type": "Core", "title": "B"}
            ]})))
            .unwrap_err();
        assert_eq!(err, NormalizeError::field_type("modules[1].link", "missing required key"));
    }
}
