use reqwest::Url;

use crate::error::TutorApiError;

/// Default base URL for the conversation backend.
pub const DEFAULT_TUTOR_BASE_URL: &str = "http://localhost:8000/api";

/// Normalize a configured base URL.
///
/// Surrounding whitespace and trailing slashes are removed; a blank value falls
/// back to [`DEFAULT_TUTOR_BASE_URL`].
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_TUTOR_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Append path segments to the normalized base URL.
///
/// Segments are percent-encoded, so identifiers can never escape their path
/// position.
pub fn endpoint_url(base_url: &str, segments: &[&str]) -> Result<Url, TutorApiError> {
    let normalized = normalize_base_url(base_url);
    let mut url = Url::parse(&normalized)
        .map_err(|error| TutorApiError::InvalidBaseUrl(format!("{normalized}: {error}")))?;

    {
        let mut path = url.path_segments_mut().map_err(|()| {
            TutorApiError::InvalidBaseUrl(format!("{normalized} cannot carry a path"))
        })?;
        path.pop_if_empty().extend(segments);
    }

    Ok(url)
}
