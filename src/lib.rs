pub mod api;
pub mod backup;
pub mod classify;
pub mod db;
pub mod environment;
pub mod language;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod rss;
pub mod sanitize;
pub mod scheduler;
pub mod scoring;
pub mod sources;
pub mod threat;

pub use db::Database;
pub use model::{Article, Category, ThreatLevel, ThreatScore};

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_PIPELINE: &str = "pipeline";
pub const TARGET_BACKUP: &str = "backup";
