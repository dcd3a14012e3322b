//! Core data types shared by the store, the pipeline and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of labels an article can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Cybersecurity,
    Tech,
    Defense,
    General,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Cybersecurity,
        Category::Tech,
        Category::Defense,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cybersecurity => "Cybersecurity",
            Category::Tech => "Tech",
            Category::Defense => "Defense",
            Category::General => "General",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {:?}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// A stored news article. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub description: String,
    pub image_url: String,
    /// Canonical article URL, the dedup key.
    pub url: String,
    /// The feed this article came from.
    pub source_url: String,
    pub published_at: DateTime<Utc>,
    pub rank: u32,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThreatLevel {
    #[serde(rename = "No Threats Reported")]
    NoThreatsReported,
    #[serde(rename = "Code Red")]
    CodeRed,
    #[serde(rename = "Attention")]
    Attention,
    #[serde(rename = "Business as Usual")]
    BusinessAsUsual,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::NoThreatsReported => "No Threats Reported",
            ThreatLevel::CodeRed => "Code Red",
            ThreatLevel::Attention => "Attention",
            ThreatLevel::BusinessAsUsual => "Business as Usual",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank distribution of the last 24 hours of articles. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatScore {
    pub low_rank_count: usize,
    pub medium_rank_count: usize,
    pub high_rank_count: usize,
    pub total_articles: usize,
    pub threat_level: ThreatLevel,
}
