use course_crawler::normalizer::{Normalizer, RecordStamp};
use course_crawler::types::RawCourse;
use jsonschema::JSONSchema;
use serde_json::json;

fn is_valid(instance: &serde_json::Value) -> bool {
    let schema = include_str!("../schemas/course.v1.json");
    let schema_json: serde_json::Value = serde_json::from_str(schema).unwrap();
    let schema_static: &'static serde_json::Value = Box::leak(Box::new(schema_json));
    let compiled = JSONSchema::options().compile(schema_static).unwrap();
    compiled.is_valid(instance)
}

fn normalized_example() -> serde_json::Value {
    let raw: RawCourse = json!({
        "link": "https://www.ox.ac.uk/admissions/graduate/courses/msc-statistical-science",
        "title": "Statistical Science",
        "study_level": "Graduate",
        "qualification": "MSc",
        "university_title": "University of Oxford",
        "locations": ["Department of Statistics, Oxford"],
        "tuitions": [
            {"study_mode": "Full time", "duration": "12 months", "student_category": "uk", "fee": "£13,600"},
            {"study_mode": "Full time", "duration": null, "student_category": "international", "fee": null}
        ],
        "start_dates": ["September 2024"],
        "language_requirements": [{"test": "IELTS Academic", "score": "7.0"}],
        "modules": [{"type": "Core", "title": "Applied Statistics", "link": ""}]
    })
    .as_object()
    .cloned()
    .unwrap();
    let record = Normalizer::new(RecordStamp::new("2024-01-05", "2024-2025"))
        .normalize(&raw)
        .unwrap();
    serde_json::to_value(record).unwrap()
}

#[test]
fn normalized_record_is_valid() {
    assert!(is_valid(&normalized_example()));
}

#[test]
fn empty_normalized_record_is_valid() {
    let record = Normalizer::new(RecordStamp::new("2024-01-05", "2024-2025"))
        .normalize(&RawCourse::new())
        .unwrap();
    assert!(is_valid(&serde_json::to_value(record).unwrap()));
}

#[test]
fn unknown_top_level_field_is_rejected() {
    let mut invalid = normalized_example();
    invalid["unexpected_field"] = json!("x");
    assert!(!is_valid(&invalid), "additional properties should fail");
}

#[test]
fn missing_field_is_rejected() {
    let mut invalid = normalized_example();
    invalid.as_object_mut().unwrap().remove("modules");
    assert!(!is_valid(&invalid));
}

#[test]
fn tuition_fee_must_be_string_or_null() {
    let mut invalid = normalized_example();
    invalid["tuitions"][0]["fee"] = json!(13600);
    assert!(!is_valid(&invalid));
}

#[test]
fn academic_year_pattern_is_enforced() {
    let mut invalid = normalized_example();
    invalid["academic_year"] = json!("2024/25");
    assert!(!is_valid(&invalid));
}
