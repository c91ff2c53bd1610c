//! The `agg` polling loop.
//!
//! Each tick picks the feed fetched longest ago, stamps it as fetched, then
//! downloads it and stores unseen posts. Stamping before the download means a
//! broken feed still moves to the back of the rotation and cannot starve the
//! others.

use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;

use super::fetcher::{fetch_feed, FetchError};
use crate::config::FetchErrorPolicy;
use crate::storage::{Database, DatabaseError, NewPost};

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The feed could not be downloaded or parsed
    #[error("Failed to fetch feed '{feed}'")]
    Fetch {
        feed: String,
        #[source]
        source: FetchError,
    },
    /// Selecting or stamping the next feed failed
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Outcome of one aggregation tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// There are no feeds yet
    Idle,
    Collected {
        feed_name: String,
        /// Items in the fetched document
        found: usize,
        /// Posts actually stored (duplicates and failures excluded)
        inserted: usize,
    },
}

/// Run one tick: fetch the least recently fetched feed and store its posts.
///
/// Duplicate post URLs are skipped silently; any other insert failure is
/// logged and skipped. A fetch failure is recorded on the feed row and
/// returned as [`ScrapeError::Fetch`].
pub async fn scrape_next_feed(
    db: &Database,
    client: &reqwest::Client,
) -> Result<Tick, ScrapeError> {
    let Some(feed) = db.get_next_feed_to_fetch().await? else {
        return Ok(Tick::Idle);
    };

    db.mark_feed_fetched(feed.id).await?;

    let rss = match fetch_feed(client, &feed.url).await {
        Ok(rss) => rss,
        Err(e) => {
            if let Err(db_err) = db.record_fetch_error(feed.id, &e.to_string()).await {
                tracing::warn!(
                    feed_id = feed.id,
                    error = %db_err,
                    "Failed to record fetch error"
                );
            }
            return Err(ScrapeError::Fetch {
                feed: feed.name,
                source: e,
            });
        }
    };

    let found = rss.channel.items.len();
    let mut inserted = 0;

    for item in rss.channel.items {
        let url = item.link.trim();
        if url.is_empty() {
            tracing::debug!(feed = %feed.name, title = %item.title, "Skipping item without link");
            continue;
        }

        let post = NewPost {
            feed_id: feed.id,
            published_at: item.published_at(),
            description: Some(item.description).filter(|d| !d.is_empty()),
            url: url.to_string(),
            title: item.title,
        };

        match db.create_post(&post).await {
            Ok(_) => inserted += 1,
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(url = %post.url, "Post already stored");
            }
            Err(e) => {
                tracing::warn!(url = %post.url, error = %e, "Couldn't create post");
            }
        }
    }

    if feed.last_fetch_error.is_some() {
        if let Err(db_err) = db.clear_fetch_error(feed.id).await {
            tracing::warn!(
                feed_id = feed.id,
                error = %db_err,
                "Failed to clear fetch error"
            );
        }
    }

    tracing::info!(
        feed = %feed.name,
        found = found,
        inserted = inserted,
        "Feed collected"
    );

    Ok(Tick::Collected {
        feed_name: feed.name,
        found,
        inserted,
    })
}

/// Tick forever, starting immediately and then once every `every`.
///
/// Only returns on error. Fetch failures end the loop under
/// [`FetchErrorPolicy::Abort`] and are logged under
/// [`FetchErrorPolicy::Skip`]; database failures always end it.
pub async fn run(
    db: &Database,
    client: &reqwest::Client,
    every: Duration,
    policy: FetchErrorPolicy,
) -> Result<(), ScrapeError> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match scrape_next_feed(db, client).await {
            Ok(Tick::Idle) => tracing::info!("No feeds to collect yet"),
            Ok(Tick::Collected { .. }) => {}
            Err(ScrapeError::Fetch { feed, source }) if policy == FetchErrorPolicy::Skip => {
                tracing::warn!(feed = %feed, error = %source, "Feed fetch failed, skipping");
            }
            Err(e) => return Err(e),
        }
    }
}
