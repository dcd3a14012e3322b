//! Built-in feed catalog. The classifier's label sets are these lists.

pub const CYBERSECURITY_FEEDS: &[&str] = &[
    "https://www.bleepingcomputer.com/feed/",
    "https://feeds.feedburner.com/TheHackersNews",
    "https://blogs.cisco.com/security/feed",
    "https://www.wired.com/feed/category/security/latest/rss",
    "https://www.securityweek.com/feed/",
    "https://news.sophos.com/en-us/feed/",
    "https://www.csoonline.com/feed/",
];

pub const TECH_FEEDS: &[&str] = &[
    "https://www.theverge.com/rss/index.xml",
    "https://techcrunch.com/feed/",
    "https://arstechnica.com/feed/",
    "http://www.engadget.com/rss-full.xml",
    "http://www.fastcodesign.com/rss.xml",
    "http://www.forbes.com/entrepreneurs/index.xml",
    "https://blog.pragmaticengineer.com/rss/",
    "https://browser.engineering/rss.xml",
    "https://githubengineering.com/atom.xml",
    "https://joshwcomeau.com/rss.xml",
    "https://jvns.ca/atom.xml",
    "https://overreacted.io/rss.xml",
    "https://signal.org/blog/rss.xml",
    "https://slack.engineering/feed",
    "https://stripe.com/blog/feed.rss",
];

pub const DEFENSE_FEEDS: &[&str] = &[
    "https://www.defenseone.com/rss/all/",
    "https://thediplomat.com/category/asia-defense/feed/",
    "https://www.janes.com/osint-insights/defence-news/feed/",
    "https://www.militarytimes.com/arc/outboundfeeds/news-rss/",
    "https://www.defensenews.com/arc/outboundfeeds/home-rss/",
];

/// All built-in feeds, in polling order.
pub fn default_feeds() -> Vec<String> {
    CYBERSECURITY_FEEDS
        .iter()
        .chain(TECH_FEEDS)
        .chain(DEFENSE_FEEDS)
        .map(|s| s.to_string())
        .collect()
}
