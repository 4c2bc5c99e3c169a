pub mod bristol;
pub mod oxford;
pub mod ucl;
pub mod warwick;

use crate::constants::{BRISTOL_SOURCE, OXFORD_SOURCE, UCL_SOURCE, WARWICK_SOURCE};
use crate::types::{CourseSource, RawCourse};
use serde_json::Value;

pub use bristol::BristolSource;
pub use oxford::OxfordSource;
pub use ucl::UclSource;
pub use warwick::WarwickSource;

pub fn create_source(source_name: &str) -> Option<Box<dyn CourseSource>> {
    match source_name {
        BRISTOL_SOURCE => Some(Box::new(BristolSource::new())),
        OXFORD_SOURCE => Some(Box::new(OxfordSource::new())),
        WARWICK_SOURCE => Some(Box::new(WarwickSource::new())),
        UCL_SOURCE => Some(Box::new(UclSource::new())),
        _ => None,
    }
}

/// Unwraps a `json!({...})` literal into a raw record.
pub(crate) fn raw_course(value: Value) -> RawCourse {
    match value {
        Value::Object(map) => map,
        _ => RawCourse::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_every_supported_source() {
        for name in crate::constants::get_supported_sources() {
            let source = create_source(name).expect("source should exist");
            assert_eq!(source.source_name(), name);
        }
        assert!(create_source("cambridge").is_none());
    }
}
