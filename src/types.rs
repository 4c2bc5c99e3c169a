use crate::error::Result;
use serde_json::{Map, Value};

/// Raw course data as produced by a source extractor
pub type RawCourse = Map<String, Value>;

/// Retrieves page bodies. Implemented over HTTP for real runs and over
/// fixtures in tests.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Core trait that all university course sources must implement
#[async_trait::async_trait]
pub trait CourseSource: Send + Sync {
    /// Unique identifier for this source
    fn source_name(&self) -> &'static str;

    /// Institution name stamped on every record
    fn university_title(&self) -> &'static str;

    /// Fetch every page the source needs and return one raw record per
    /// (course, qualification) pair
    async fn collect(&self, fetcher: &dyn PageFetcher) -> Result<Vec<RawCourse>>;
}
