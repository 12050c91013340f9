use url::Url;

/// Extracts the authority used to decide whether two URLs share a host
///
/// The host is lowercased and an explicit non-default port is kept, so
/// `https://example.com:8443/` and `https://example.com/` are different hosts
/// while `https://EXAMPLE.com:443/` and `https://example.com/` are the same.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use webscour::url::extract_host;
///
/// let url = Url::parse("https://Example.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(extract_host(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
