//! Utility functions for RSS feed processing.

/// Helper function to validate a URL
pub fn is_valid_url(url: &str) -> bool {
    if let Ok(parsed) = url::Url::parse(url) {
        parsed.scheme() == "http" || parsed.scheme() == "https"
    } else {
        false
    }
}

/// Clean up malformed XML
pub fn cleanup_xml(xml: &str) -> String {
    let mut cleaned = xml.trim().trim_start_matches('\u{FEFF}');

    // Drop anything before the XML declaration or the root element
    if let Some(start) = ["<?xml", "<rss", "<feed", "<rdf:RDF"]
        .iter()
        .find_map(|marker| cleaned.find(marker))
    {
        cleaned = &cleaned[start..];
    }

    // HTML named entities are undefined in XML
    let cleaned = cleaned
        .replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&rsquo;", "&#8217;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rdquo;", "&#8221;")
        .replace("&ldquo;", "&#8220;")
        .replace("&hellip;", "&#8230;")
        .replace("&amp;amp;", "&amp;");

    // Remove any invalid XML characters
    let cleaned: String = cleaned
        .chars()
        .filter(|&c| {
            matches!(c,
                '\u{0009}' | // tab
                '\u{000A}' | // newline
                '\u{000D}' | // carriage return
                '\u{0020}'..='\u{D7FF}' |
                '\u{E000}'..='\u{FFFD}' |
                '\u{10000}'..='\u{10FFFF}'
            )
        })
        .collect();

    if cleaned.starts_with("<?xml") {
        cleaned
    } else {
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", cleaned)
    }
}

/// Whether a body looks like RSS or Atom at all.
pub(super) fn looks_like_feed(text: &str) -> bool {
    text.contains("<rss") || text.contains("<feed") || text.contains("<rdf:RDF")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://www.bleepingcomputer.com/feed/"));
        assert!(is_valid_url("http://www.engadget.com/rss-full.xml"));
        assert!(!is_valid_url("ftp://example.com/feed"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_cleanup_strips_leading_garbage_and_bom() {
        let cleaned = cleanup_xml("\u{FEFF}  junk<rss version=\"2.0\"></rss>");
        assert!(cleaned.starts_with("<?xml"));
        assert!(cleaned.ends_with("<rss version=\"2.0\"></rss>"));
        assert!(!cleaned.contains("junk"));
    }

    #[test]
    fn test_cleanup_replaces_html_entities_and_control_chars() {
        let cleaned = cleanup_xml("<?xml version=\"1.0\"?><rss>a&nbsp;b\u{0001}&mdash;</rss>");
        assert_eq!(cleaned, "<?xml version=\"1.0\"?><rss>a&#160;b&#8212;</rss>");
    }
}
