//! Keyword-weighted relevance ranking.
//!
//! Each keyword of the category's table contributes its weight once if it occurs as a
//! substring of the lowercased `title + " " + description`. Overlapping keywords
//! ("ransomware attack", "ransomware", "attack") each count independently.

use crate::model::Category;

// Weight tiers: 5 = direct or major, 3 = significant, 1 = general interest.
const CYBERSECURITY_KEYWORDS: &[(&str, u32)] = &[
    ("zero-day", 5),
    ("exploit in the wild", 5),
    ("active attack", 5),
    ("critical vulnerability", 5),
    ("alert", 5),
    ("warning", 5),
    ("patch now", 5),
    ("ransomware attack", 5),
    ("breach confirmed", 5),
    ("vulnerability", 3),
    ("exploit", 3),
    ("breach", 3),
    ("attack", 3),
    ("malware", 3),
    ("ransomware", 3),
    ("phishing", 3),
    ("threat", 3),
    ("advisory", 3),
    ("security", 1),
    ("cybersecurity", 1),
    ("data", 1),
    ("privacy", 1),
    ("risk", 1),
    ("compliance", 1),
    ("encryption", 1),
    ("patch", 1),
];

const TECH_KEYWORDS: &[(&str, u32)] = &[
    ("ai", 5),
    ("artificial intelligence", 5),
    ("quantum computing", 5),
    ("breakthrough", 5),
    ("major update", 5),
    ("new chip", 5),
    ("innovation", 5),
    ("future of tech", 5),
    ("startup", 3),
    ("funding", 3),
    ("acquisition", 3),
    ("cloud", 3),
    ("5g", 3),
    ("machine learning", 3),
    ("data science", 3),
    ("web3", 3),
    ("metaverse", 3),
    ("robotics", 3),
    ("review", 1),
    ("gadget", 1),
    ("app", 1),
    ("software", 1),
    ("hardware", 1),
    ("update", 1),
    ("guide", 1),
    ("tips", 1),
];

const GENERIC_KEYWORDS: &[(&str, u32)] = &[("news", 1), ("update", 1), ("report", 1)];

/// The keyword table used for a category. Defense shares the generic table.
pub fn keyword_table(category: Category) -> &'static [(&'static str, u32)] {
    match category {
        Category::Cybersecurity => CYBERSECURITY_KEYWORDS,
        Category::Tech => TECH_KEYWORDS,
        Category::Defense | Category::General => GENERIC_KEYWORDS,
    }
}

pub fn score(category: Category, title: &str, description: &str) -> u32 {
    let content = format!("{} {}", title, description).to_lowercase();

    keyword_table(category)
        .iter()
        .filter(|(keyword, _)| content.contains(keyword))
        .map(|(_, weight)| weight)
        .sum()
}
