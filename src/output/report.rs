//! Visited-URL report
//!
//! Written once at the end of a crawl: one URL per line, admission order.

use std::path::Path;

/// Writes the visited URLs to `path`, replacing any previous report
pub async fn write_visited_report(path: &Path, urls: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut content = String::with_capacity(urls.iter().map(|u| u.len() + 1).sum());
    for url in urls {
        content.push_str(url);
        content.push('\n');
    }

    tokio::fs::write(path, content).await
}
