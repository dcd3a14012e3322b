use crate::model::Category;
use crate::sources::{CYBERSECURITY_FEEDS, DEFENSE_FEEDS, TECH_FEEDS};

/// Maps a feed's source URL to its category by exact membership.
///
/// Total: anything outside the three catalog lists is `General`.
pub fn classify(source_url: &str) -> Category {
    if CYBERSECURITY_FEEDS.contains(&source_url) {
        Category::Cybersecurity
    } else if TECH_FEEDS.contains(&source_url) {
        Category::Tech
    } else if DEFENSE_FEEDS.contains(&source_url) {
        Category::Defense
    } else {
        Category::General
    }
}
