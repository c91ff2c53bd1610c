use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a feed URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// http(s) URL without a host, e.g. `http:/feed`
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Validate a URL given to `addfeed`.
///
/// Only the shape is checked: it must parse and use http or https with a
/// host. Local addresses are allowed, since gator fetches on behalf of the
/// user running it and self-hosted feeds are common.
///
/// # Examples
///
/// ```
/// use gator::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim()).map_err(|source| UrlValidationError::InvalidUrl {
        url: url_str.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost(url_str.to_string()));
    }

    Ok(url)
}
