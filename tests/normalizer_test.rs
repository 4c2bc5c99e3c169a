use course_crawler::course::{CourseRecord, LanguageRequirement, Location};
use course_crawler::error::NormalizeError;
use course_crawler::normalizer::{Normalizer, RecordStamp};
use course_crawler::types::RawCourse;
use serde_json::{json, Value};

fn normalizer() -> Normalizer {
    Normalizer::new(RecordStamp::new("2024-01-05", "2024-2025"))
}

fn raw(value: Value) -> RawCourse {
    value.as_object().cloned().expect("fixture must be an object")
}

fn full_raw_course() -> RawCourse {
    raw(json!({
        "link": "https://www.bristol.ac.uk/study/postgraduate/taught/msc-data-science/",
        "title": "Data Science",
        "study_level": "Graduate",
        "qualification": "MSc",
        "university_title": "University of Bristol",
        "locations": ["Clifton Campus, Bristol"],
        "description": "Data science combines statistics and computing.",
        "about": "<div><p>Overview</p></div>",
        "tuitions": [
            {"study_mode": "Full-time", "duration": "One year", "student_category": "uk", "fee": "£13,700"},
            {"study_mode": "Part-time", "duration": null, "student_category": "uk", "fee": "£6,850"}
        ],
        "start_dates": ["September 2024"],
        "application_dates": ["31 July 2024"],
        "entry_requirements": "An upper second-class honours degree.",
        "language_requirements": [{"language": "English", "test": "IELTS (Academic)", "score": "6.5 overall"}],
        "modules": [{"type": "Mandatory", "title": "Statistical Computing", "link": "https://www.bristol.ac.uk/u/1"}]
    }))
}

#[test]
fn wraps_locations_and_defaults_language() {
    let record = normalizer()
        .normalize(&raw(json!({
            "locations": ["Bristol, Bristol"],
            "start_dates": [],
            "application_dates": [],
            "language_requirements": [{"test": "IELTS", "score": "6.5"}],
            "modules": [],
            "tuitions": []
        })))
        .unwrap();

    assert_eq!(record.locations, vec![Location { value: "Bristol, Bristol".to_string() }]);
    assert_eq!(
        record.language_requirements,
        vec![LanguageRequirement {
            language: "English".to_string(),
            test: "IELTS".to_string(),
            score: "6.5".to_string(),
        }]
    );

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["locations"], json!([{"value": "Bristol, Bristol"}]));
    assert_eq!(
        value["language_requirements"],
        json!([{"language": "English", "test": "IELTS", "score": "6.5"}])
    );
}

#[test]
fn unexpected_field_is_a_schema_violation() {
    let mut course = full_raw_course();
    course.insert("unexpected_field".into(), json!("surprise"));

    let err = normalizer().normalize(&course).unwrap_err();
    assert_eq!(
        err,
        NormalizeError::SchemaViolation {
            fields: vec!["unexpected_field".to_string()]
        }
    );
}

#[test]
fn tuition_without_fee_is_a_field_type_error() {
    let course = raw(json!({
        "tuitions": [{"study_mode": "Full-time", "duration": "1 year", "student_category": "uk"}]
    }));

    let err = normalizer().normalize(&course).unwrap_err();
    assert_eq!(err, NormalizeError::field_type("tuitions[0].fee", "missing required key"));
}

#[test]
fn stamp_overrides_extractor_metadata() {
    let mut course = full_raw_course();
    course.insert("schema_version".into(), json!("1999-01-01"));
    course.insert("academic_year".into(), json!("1999-2000"));

    let record = normalizer().normalize(&course).unwrap();
    assert_eq!(record.schema_version, "2024-01-05");
    assert_eq!(record.academic_year, "2024-2025");
}

#[test]
fn empty_record_gets_stamp_and_nulls() {
    let record = normalizer().normalize(&RawCourse::new()).unwrap();
    assert_eq!(record.schema_version, "2024-01-05");
    assert_eq!(record.academic_year, "2024-2025");
    assert_eq!(record.link, None);

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value.as_object().unwrap().len(), 16);
    assert_eq!(value["entry_requirements"], Value::Null);
    assert_eq!(value["modules"], json!([]));
}

#[test]
fn full_record_keeps_every_value() {
    let record = normalizer().normalize(&full_raw_course()).unwrap();

    assert_eq!(record.title.as_deref(), Some("Data Science"));
    assert_eq!(record.university_title.as_deref(), Some("University of Bristol"));
    assert_eq!(record.tuitions.len(), 2);
    assert_eq!(record.tuitions[1].duration, None);
    assert_eq!(record.tuitions[1].fee.as_deref(), Some("£6,850"));
    assert_eq!(record.start_dates[0].value, "September 2024");
    assert_eq!(record.application_dates[0].value, "31 July 2024");
    assert_eq!(record.modules[0].module_type, "Mandatory");
}

#[test]
fn serialized_record_deserializes_to_the_same_record() {
    let record = normalizer().normalize(&full_raw_course()).unwrap();
    let json = serde_json::to_string(&record).unwrap();
    let parsed: CourseRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn normalization_is_deterministic() {
    let course = full_raw_course();
    let first = normalizer().normalize(&course).unwrap();
    let second = normalizer().normalize(&course).unwrap();
    assert_eq!(first, second);
}

#[test]
fn wrong_nested_type_names_the_path() {
    let course = raw(json!({"start_dates": ["September 2024", 2025]}));
    let err = normalizer().normalize(&course).unwrap_err();
    assert_eq!(
        err,
        NormalizeError::field_type("start_dates[1]", "expected string, found number")
    );
}

#[test]
fn extra_keys_inside_nested_entries_are_dropped() {
    let course = raw(json!({
        "language_requirements": [{"test": "IELTS", "score": "6.5", "notes": "per component"}],
        "tuitions": [{"study_mode": "Full-time", "duration": null, "student_category": "uk", "fee": null, "currency": "GBP"}]
    }));
    let record = normalizer().normalize(&course).unwrap();

    assert_eq!(record.language_requirements[0].test, "IELTS");
    assert_eq!(record.tuitions[0].student_category, "uk");
    let value = serde_json::to_value(&record).unwrap();
    assert!(value["tuitions"][0].get("currency").is_none());
    assert!(value["language_requirements"][0].get("notes").is_none());
}
