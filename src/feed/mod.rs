//! Feed retrieval and the aggregation loop.
//!
//! - [`parser`] - RSS 2.0 XML into a fixed [`RssFeed`] shape
//! - [`fetcher`] - single HTTP GET with the `gator` user agent
//! - [`aggregator`] - the `agg` loop storing new posts

pub mod aggregator;
mod fetcher;
mod parser;

pub use aggregator::{scrape_next_feed, ScrapeError, Tick};
pub use fetcher::{build_client, fetch_feed, FetchError, USER_AGENT};
pub use parser::{parse_rss, ParseError, RssChannel, RssFeed, RssItem};
