//! URI classification.
//!
//! Every string maps to exactly one [`UriKind`]; anything that is not
//! recognised as object storage, a hub reference or a web URL is treated as a
//! local filesystem path.

use url::Url;

/// Prefix of remote-hub URIs.
pub const HUB_PREFIX: &str = "hf://";

/// Storage category of a URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UriKind {
    ObjectStorage,
    RemoteHub,
    Web,
    Local,
}

impl UriKind {
    /// Human-readable backend name.
    pub fn name(self) -> &'static str {
        match self {
            UriKind::ObjectStorage => "object-storage",
            UriKind::RemoteHub => "remote-hub",
            UriKind::Web => "web",
            UriKind::Local => "local",
        }
    }
}

/// Classify a URI. Checks run in a fixed order and the first match wins.
pub fn classify(uri: &str) -> UriKind {
    if scheme_of(uri).is_some_and(|scheme| scheme.eq_ignore_ascii_case("s3")) {
        return UriKind::ObjectStorage;
    }
    if uri.starts_with(HUB_PREFIX) {
        return UriKind::RemoteHub;
    }
    if is_network_url(uri) {
        return UriKind::Web;
    }
    UriKind::Local
}

/// Returns the scheme component of `uri`, if it has a syntactically valid one.
pub fn scheme_of(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Some(scheme)
    } else {
        None
    }
}

fn is_network_url(uri: &str) -> bool {
    match Url::parse(uri) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|host| !host.is_empty()),
        Err(_) => false,
    }
}

/// Final path segment of a `scheme://` URI with any query or fragment removed.
pub fn final_segment(uri: &str) -> &str {
    let without_query = match uri.find(['?', '#']) {
        Some(idx) if uri.contains("://") => &uri[..idx],
        _ => uri,
    };
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
