//! Normalized course record and its typed sub-records.
//!
//! Every struct denies unknown fields, so deserializing a merged raw mapping
//! into [`CourseRecord`] doubles as the final validation gate.

use crate::constants::DEFAULT_LANGUAGE;
use crate::error::NormalizeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names a raw course record may carry.
pub const COURSE_FIELDS: [&str; 16] = [
    "link",
    "title",
    "study_level",
    "qualification",
    "university_title",
    "locations",
    "description",
    "about",
    "tuitions",
    "start_dates",
    "application_dates",
    "entry_requirements",
    "language_requirements",
    "modules",
    "schema_version",
    "academic_year",
];

pub fn is_course_field(name: &str) -> bool {
    COURSE_FIELDS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Date {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageRequirement {
    pub language: String,
    pub test: String,
    pub score: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Module {
    #[serde(rename = "type")]
    pub module_type: String,
    pub title: String,
    pub link: String,
}

/// One fee line. `duration` and `fee` are nullable: the key must be present
/// but extractors may not have found a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tuition {
    pub study_mode: String,
    pub duration: Option<String>,
    pub student_category: String,
    pub fee: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourseRecord {
    pub link: Option<String>,
    pub title: Option<String>,
    pub study_level: Option<String>,
    pub qualification: Option<String>,
    pub university_title: Option<String>,
    pub locations: Vec<Location>,
    pub description: Option<String>,
    pub about: Option<String>,
    pub tuitions: Vec<Tuition>,
    pub start_dates: Vec<Date>,
    pub application_dates: Vec<Date>,
    pub entry_requirements: Option<String>,
    pub language_requirements: Vec<LanguageRequirement>,
    pub modules: Vec<Module>,
    pub schema_version: String,
    pub academic_year: String,
}

impl Location {
    pub fn from_raw(raw: &Value, path: &str) -> Result<Self, NormalizeError> {
        Ok(Self {
            value: expect_str(raw, path)?,
        })
    }
}

impl Date {
    pub fn from_raw(raw: &Value, path: &str) -> Result<Self, NormalizeError> {
        Ok(Self {
            value: expect_str(raw, path)?,
        })
    }
}

impl LanguageRequirement {
    pub fn from_raw(raw: &Value, path: &str) -> Result<Self, NormalizeError> {
        let obj = expect_object(raw, path)?;
        let language = match obj.get("language") {
            None => DEFAULT_LANGUAGE.to_string(),
            Some(value) => expect_str(value, &format!("{path}.language"))?,
        };
        Ok(Self {
            language,
            test: required_str(obj, "test", path)?,
            score: required_str(obj, "score", path)?,
        })
    }
}

impl Module {
    pub fn from_raw(raw: &Value, path: &str) -> Result<Self, NormalizeError> {
        let obj = expect_object(raw, path)?;
        Ok(Self {
            module_type: required_str(obj, "type", path)?,
            title: required_str(obj, "title", path)?,
            link: required_str(obj, "link", path)?,
        })
    }
}

impl Tuition {
    pub fn from_raw(raw: &Value, path: &str) -> Result<Self, NormalizeError> {
        let obj = expect_object(raw, path)?;
        Ok(Self {
            study_mode: required_str(obj, "study_mode", path)?,
            duration: required_nullable_str(obj, "duration", path)?,
            student_category: required_str(obj, "student_category", path)?,
            fee: required_nullable_str(obj, "fee", path)?,
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_object<'a>(raw: &'a Value, path: &str) -> Result<&'a Map<String, Value>, NormalizeError> {
    raw.as_object().ok_or_else(|| {
        NormalizeError::field_type(path, format!("expected object, found {}", type_name(raw)))
    })
}

fn expect_str(raw: &Value, path: &str) -> Result<String, NormalizeError> {
    raw.as_str().map(str::to_string).ok_or_else(|| {
        NormalizeError::field_type(path, format!("expected string, found {}", type_name(raw)))
    })
}

fn required<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a Value, NormalizeError> {
    obj.get(key)
        .ok_or_else(|| NormalizeError::field_type(format!("{path}.{key}"), "missing required key"))
}

fn required_str(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, NormalizeError> {
    expect_str(required(obj, key, path)?, &format!("{path}.{key}"))
}

fn required_nullable_str(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<String>, NormalizeError> {
    match required(obj, key, path)? {
        Value::Null => Ok(None),
        value => expect_str(value, &format!("{path}.{key}")).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn language_requirement_defaults_language() {
        let req = LanguageRequirement::from_raw(&json!({"test": "IELTS", "score": "7.0"}), "lr[0]").unwrap();
        assert_eq!(req.language, "English");
    }

    #[test]
    fn language_requirement_keeps_explicit_language() {
        let req = LanguageRequirement::from_raw(
            &json!({"language": "Welsh", "test": "WJEC", "score": "B"}),
            "lr[0]",
        )
        .unwrap();
        assert_eq!(req.language, "Welsh");
    }

    #[test]
    fn tuition_accepts_null_fee_but_not_missing_fee() {
        let with_null = json!({"study_mode": "Full-time", "duration": null, "student_category": "uk", "fee": null});
        let tuition = Tuition::from_raw(&with_null, "tuitions[0]").unwrap();
        assert_eq!(tuition.fee, None);
        assert_eq!(tuition.duration, None);

        let missing = json!({"study_mode": "Full-time", "duration": "1 year", "student_category": "uk"});
        let err = Tuition::from_raw(&missing, "tuitions[0]").unwrap_err();
        assert_eq!(
            err,
            NormalizeError::field_type("tuitions[0].fee", "missing required key")
        );
    }

    #[test]
    fn tuition_rejects_numeric_fee() {
        let raw = json!({"study_mode": "Full-time", "duration": "1 year", "student_category": "uk", "fee": 9500});
        let err = Tuition::from_raw(&raw, "tuitions[2]").unwrap_err();
        assert!(matches!(err, NormalizeError::FieldTypeError { ref field, .. } if field == "tuitions[2].fee"));
    }

    #[test]
    fn module_type_serializes_as_type() {
        let module = Module::from_raw(
            &json!({"type": "Core", "title": "Data Science", "link": "https://example.ac.uk/u/1"}),
            "modules[0]",
        )
        .unwrap();
        let value = serde_json::to_value(&module).unwrap();
        assert_eq!(value["type"], "Core");
        assert!(value.get("module_type").is_none());
    }

    #[test]
    fn module_ignores_keys_outside_its_fields() {
        let module = Module::from_raw(
            &json!({"type": "Core", "title": "A", "link": "", "credits": 20}),
            "modules[3]",
        )
        .unwrap();
        assert_eq!(
            module,
            Module {
                module_type: "Core".to_string(),
                title: "A".to_string(),
                link: String::new(),
            }
        );
        assert!(serde_json::to_value(&module).unwrap().get("credits").is_none());
    }

    #[test]
    fn location_rejects_non_string() {
        let err = Location::from_raw(&json!({"value": "Bristol"}), "locations[0]").unwrap_err();
        assert_eq!(
            err,
            NormalizeError::field_type("locations[0]", "expected string, found object")
        );
    }
}
