//! Personalized invitation links
//!
//! A link is the site's base URL with the guest's name carried in the `guest`
//! query parameter: `<origin>?guest=<percent-encoded-name>`.

use crate::core::error::{ValidationError, InviteError};
use crate::core::model::DEFAULT_GUEST_NAME;
use url::Url;

/// Query parameter carrying the guest's name
pub const GUEST_PARAM: &str = "guest";

/// Build the personalized link for `guest_name`
///
/// The name is trimmed, must not be empty, and is percent-encoded so that
/// reserved characters (`&`, `=`, `#`, `+`, spaces, ...) survive the round
/// trip through the query string.
pub fn build_invitation_link(base_url: &str, guest_name: &str) -> Result<String, InviteError> {
    let name = guest_name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "guest_name".to_string(),
        }
        .into());
    }

    let base = parse_base_url(base_url)?;
    let mut link = base.as_str().trim_end_matches('/').to_string();
    link.push(if base.query().is_some() { '&' } else { '?' });
    link.push_str(GUEST_PARAM);
    link.push('=');
    link.push_str(&urlencoding::encode(name));

    Ok(link)
}

/// Validate the site's base URL (absolute http/https)
pub fn parse_base_url(base_url: &str) -> Result<Url, InviteError> {
    let invalid = |message: &str| {
        InviteError::Validation(ValidationError::FieldErrors(vec![
            crate::core::error::FieldValidationError {
                field: "site_url".to_string(),
                message: format!("'{}' {}", base_url, message),
            },
        ]))
    };

    let url = Url::parse(base_url.trim()).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid("must be an http(s) URL")),
    }
}

/// Extract the decoded guest name from a page URL
///
/// Accepts absolute URLs as well as path-and-query forms like `/?guest=Sari`.
/// An empty parameter counts as absent.
pub fn guest_name_from_url(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url)
        .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(page_url)))
        .ok()?;

    url.query_pairs()
        .find(|(key, _)| key == GUEST_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Display name for a page URL, falling back to the generic label
pub fn resolve_guest_name(page_url: &str) -> String {
    guest_name_from_url(page_url).unwrap_or_else(|| DEFAULT_GUEST_NAME.to_string())
}
