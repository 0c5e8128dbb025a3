//! Derivation of the URLs an export job visits.

use url::Url;

use crate::{ExportError, Result};

/// Path of the sign-in page, relative to the service root.
pub const SIGNIN_PATH: &str = "/signin";

/// Suffix appended to a bare workspace URL to open the diagram viewer.
pub const DIAGRAMS_SEGMENT: &str = "diagrams";

/// Parses a target URL, accepting only http(s).
pub fn parse_target(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ExportError::Config(format!(
            "Unsupported URL scheme '{other}' in {raw}; expected http or https"
        ))),
    }
}

/// Returns the diagram viewer URL for a target.
///
/// A bare workspace URL (`.../workspace/<id>` with an optional trailing slash
/// and no query or fragment) gets `/diagrams` appended. Anything else is used
/// verbatim.
pub fn viewer_url(target: &Url) -> Url {
    if !is_workspace_root(target) {
        return target.clone();
    }
    let mut viewer = target.clone();
    if let Ok(mut segments) = viewer.path_segments_mut() {
        segments.pop_if_empty().push(DIAGRAMS_SEGMENT);
    }
    viewer
}

/// The sign-in endpoint: scheme, host and port of the target with
/// [`SIGNIN_PATH`].
pub fn signin_url(target: &Url) -> Result<Url> {
    Ok(target.join(SIGNIN_PATH)?)
}

/// True when the path of `location` is still on the sign-in page.
pub fn is_signin_location(location: &str) -> bool {
    match Url::parse(location) {
        Ok(url) => url.path().contains(SIGNIN_PATH),
        Err(_) => location.contains(SIGNIN_PATH),
    }
}

fn is_workspace_root(url: &Url) -> bool {
    if url.query().is_some() || url.fragment().is_some() {
        return false;
    }
    let Some(segments) = url.path_segments() else {
        return false;
    };
    let mut segments: Vec<&str> = segments.collect();
    if segments.last() == Some(&"") {
        segments.pop();
    }
    match segments.as_slice() {
        [.., "workspace", id] => !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()),
        _ => false,
    }
}
