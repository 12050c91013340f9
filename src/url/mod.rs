//! URL handling module for WebScour
//!
//! Discovered links go through a pure, stateless filter before they reach
//! the frontier. Only scheme and host checks are applied; URLs are otherwise
//! kept exactly as they appear in the page.

mod domain;
mod filter;

use crate::config::HostPolicySetting;

// Re-export main functions
pub use domain::extract_host;
pub use filter::{filter_link, HostPolicy, LinkFilter, Rejection};

impl From<HostPolicySetting> for HostPolicy {
    fn from(setting: HostPolicySetting) -> Self {
        match setting {
            HostPolicySetting::Any => Self::Any,
            HostPolicySetting::SameHost => Self::SameHost,
        }
    }
}
