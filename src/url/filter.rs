use crate::url::domain::extract_host;
use std::fmt;
use url::{ParseError, Url};

/// Pseudo-schemes that never point at a crawlable page
const SKIPPED_PREFIXES: [&str; 3] = ["mailto:", "javascript:", "tel:"];

/// Which absolute links are eligible for the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostPolicy {
    /// Any absolute HTTP(S) link
    #[default]
    Any,

    /// Only links on the host of the page they were discovered on
    SameHost,
}

/// Why a discovered link was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Empty or whitespace-only href
    Blank,

    /// Same-page anchor such as `#section`
    FragmentOnly,

    /// `mailto:`, `javascript:`, `tel:`, `ftp:` and other non-HTTP(S) schemes
    UnsupportedScheme(String),

    /// Relative link; only absolute URLs are followed
    NotAbsolute,

    /// Absolute but unparsable, or missing a host
    Malformed(String),

    /// Host differs from the page the link was found on
    ForeignHost(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "blank link"),
            Self::FragmentOnly => write!(f, "fragment-only link"),
            Self::UnsupportedScheme(scheme) => write!(f, "unsupported scheme '{}'", scheme),
            Self::NotAbsolute => write!(f, "relative link"),
            Self::Malformed(reason) => write!(f, "malformed URL: {}", reason),
            Self::ForeignHost(host) => write!(f, "foreign host '{}'", host),
        }
    }
}

/// Stateless filter applied to every extracted link
///
/// The filter never consults crawl state; deduplication happens at admission.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkFilter {
    policy: HostPolicy,
}

impl LinkFilter {
    pub fn new(policy: HostPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> HostPolicy {
        self.policy
    }

    /// Accepts or rejects a raw href found on `page_url`
    ///
    /// Accepted links are returned trimmed but otherwise exactly as written;
    /// no canonicalization beyond the scheme and host checks is applied.
    pub fn filter(&self, link: &str, page_url: &str) -> Result<String, Rejection> {
        let accepted = filter_link(link)?;

        if self.policy == HostPolicy::SameHost {
            let link_host = Url::parse(&accepted)
                .ok()
                .and_then(|url| extract_host(&url));
            let page_host = Url::parse(page_url)
                .ok()
                .and_then(|url| extract_host(&url));

            if link_host.is_none() || link_host != page_host {
                return Err(Rejection::ForeignHost(link_host.unwrap_or_default()));
            }
        }

        Ok(accepted)
    }
}

/// Accepts only absolute HTTP(S) links, regardless of host
///
/// # Examples
///
/// ```
/// use webscour::url::{filter_link, Rejection};
///
/// assert_eq!(
///     filter_link("https://example.com/page"),
///     Ok("https://example.com/page".to_string())
/// );
/// assert_eq!(filter_link("#section"), Err(Rejection::FragmentOnly));
/// ```
pub fn filter_link(link: &str) -> Result<String, Rejection> {
    let link = link.trim();

    if link.is_empty() {
        return Err(Rejection::Blank);
    }

    if link.starts_with('#') {
        return Err(Rejection::FragmentOnly);
    }

    let lowered = link.to_ascii_lowercase();
    if let Some(prefix) = SKIPPED_PREFIXES.iter().find(|p| lowered.starts_with(*p)) {
        return Err(Rejection::UnsupportedScheme(
            prefix.trim_end_matches(':').to_string(),
        ));
    }

    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => return Err(Rejection::NotAbsolute),
        Err(e) => return Err(Rejection::Malformed(e.to_string())),
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Rejection::UnsupportedScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(Rejection::Malformed("missing host".to_string()));
    }

    Ok(link.to_string())
}
