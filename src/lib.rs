pub mod apis;
pub mod config;
pub mod constants;
pub mod context;
pub mod course;
pub mod error;
pub mod fetch;
pub mod html;
pub mod logging;
pub mod normalizer;
pub mod pipeline;
pub mod storage;
pub mod types;
