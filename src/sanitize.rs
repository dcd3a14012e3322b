use scraper::Html;

/// Removes all markup from a feed-supplied HTML fragment, keeping only its text.
///
/// Entities are decoded. Contents of `<script>` and `<style>` are dropped.
pub fn strip_markup(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());

    for node in fragment.root_element().descendants() {
        let Some(chunk) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style"))
        });
        if !hidden {
            text.push_str(chunk);
        }
    }

    text.trim().to_string()
}
