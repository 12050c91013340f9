//! HTML link extraction
//!
//! Returns the raw `href` of every `<a href>` element in document order.
//! Nothing is resolved or rejected here; that is the link filter's job.

use scraper::{Html, Selector};

/// Extracts raw link targets from page content
///
/// # Example
///
/// ```
/// use webscour::crawler::extract_links;
///
/// let html = r#"<a href="https://a.com/">A</a><p><a href="/b">B</a></p>"#;
/// assert_eq!(extract_links(html), vec!["https://a.com/", "/b"]);
/// ```
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect()
}
