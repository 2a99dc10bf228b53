//! Lazy segment URI resolution.
//!
//! References never store resolved URL strings. They hold a [`UriProvider`],
//! which is only asked for the candidate URIs when the segment is actually
//! fetched.

use std::fmt;
use std::sync::Arc;

use url::Url;

/// Supplies the candidate URIs of a segment on demand.
pub trait UriProvider: Send + Sync + fmt::Debug {
    /// Resolve the ordered list of candidate URIs.
    fn resolve(&self) -> Vec<String>;
}

/// A provider over an already-known list of URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticUris(Vec<String>);

impl StaticUris {
    pub fn new(uris: Vec<String>) -> Self {
        Self(uris)
    }

    /// Wrap the URIs in a shareable provider.
    pub fn shared(uris: Vec<String>) -> Arc<dyn UriProvider> {
        Arc::new(Self(uris))
    }
}

impl UriProvider for StaticUris {
    fn resolve(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Resolve every relative URI against every base URI.
///
/// Base URIs are tried in order, so the result is ordered by base first. An
/// empty base list returns the relative URIs unchanged.
pub fn resolve_uris(base_uris: &[String], relative_uris: &[String]) -> Vec<String> {
    if relative_uris.is_empty() {
        return base_uris.to_vec();
    }
    if base_uris.is_empty() {
        return relative_uris.to_vec();
    }

    let mut resolved = Vec::with_capacity(base_uris.len() * relative_uris.len());
    for base in base_uris {
        for relative in relative_uris {
            resolved.push(resolve_one(base, relative));
        }
    }
    resolved
}

fn resolve_one(base: &str, relative: &str) -> String {
    if Url::parse(relative).is_ok() {
        return relative.to_string();
    }

    match Url::parse(base).and_then(|b| b.join(relative)) {
        Ok(url) => url.to_string(),
        Err(_) => {
            // Relative base: keep everything up to the last path separator.
            let prefix = match base.rfind('/') {
                Some(idx) => &base[..=idx],
                None => "",
            };
            format!("{}{}", prefix, relative)
        }
    }
}
