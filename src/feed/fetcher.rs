use futures::StreamExt;
use thiserror::Error;

use super::parser::{parse_rss, ParseError, RssFeed};

/// User agent sent with every feed request
pub const USER_AGENT: &str = "gator";

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, invalid URL, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body could not be parsed as RSS
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Build the HTTP client shared by every fetch.
///
/// No timeout is configured; a stalled server stalls the caller.
pub fn build_client() -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    Ok(client)
}

/// Fetch a feed with a single GET and parse it.
///
/// There are no retries. A non-2xx status is not treated specially: the body
/// goes to the parser, which rejects anything that is not RSS.
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection, TLS or URL errors
/// - [`FetchError::ResponseTooLarge`] - Response exceeded 10MB
/// - [`FetchError::Parse`] - Body is not an RSS document
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<RssFeed, FetchError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(url = %url, status = %status, "Non-success status, parsing body anyway");
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    let feed = parse_rss(&bytes)?;

    tracing::debug!(
        url = %url,
        title = %feed.channel.title,
        items = feed.channel.items.len(),
        "Fetched feed"
    );
    Ok(feed)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
