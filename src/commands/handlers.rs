//! Built-in command handlers.
//!
//! Each handler parses its own arguments, talks to the database (and, for
//! `agg`, the network) and prints its result to stdout. Errors are returned
//! to the dispatcher, which adds the command name.

use std::time::Duration;

use futures::FutureExt;

use super::{CommandError, HandlerFuture, State};
use crate::feed::aggregator;
use crate::storage::{Feed, FeedWithOwner, Post, User};
use crate::util::{
    format_timestamp, format_timestamp_micros, strip_control_chars, truncate_to_width,
    validate_feed_url,
};

/// Number of posts `browse` shows without an explicit limit
pub const DEFAULT_BROWSE_LIMIT: u32 = 2;

/// Display width for post descriptions in `browse`
const DESCRIPTION_WIDTH: usize = 200;

// ============================================================================
// Helpers
// ============================================================================

fn arg<'a>(
    args: &'a [String],
    index: usize,
    usage: &'static str,
) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .ok_or(CommandError::Usage(usage))
}

/// The logged-in user, which must still exist in the database
async fn current_user(state: &State) -> Result<User, CommandError> {
    let name = state
        .config
        .current_user_name
        .as_deref()
        .ok_or(CommandError::NotLoggedIn)?;

    state
        .db
        .get_user(name)
        .await?
        .ok_or_else(|| CommandError::UserNotFound(name.to_string()))
}

/// Feed URLs are stored in normalized form; look them up the same way.
fn feed_key(raw: &str) -> String {
    match validate_feed_url(raw) {
        Ok(url) => url.to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

async fn feed_by_url(state: &State, raw: &str) -> Result<Feed, CommandError> {
    let key = feed_key(raw);
    match state.db.get_feed_by_url(&key).await? {
        Some(feed) => Ok(feed),
        None => Err(CommandError::FeedNotFound(key)),
    }
}

fn parse_interval(raw: &str) -> Result<Duration, CommandError> {
    let every = humantime::parse_duration(raw.trim()).map_err(|source| {
        CommandError::InvalidInterval {
            value: raw.to_string(),
            source,
        }
    })?;
    if every.is_zero() {
        return Err(CommandError::ZeroInterval);
    }
    Ok(every)
}

fn parse_limit(raw: Option<&String>) -> Result<u32, CommandError> {
    match raw {
        None => Ok(DEFAULT_BROWSE_LIMIT),
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|source| CommandError::InvalidLimit {
                value: value.clone(),
                source,
            }),
    }
}

// ============================================================================
// Formatting
// ============================================================================

fn user_line(name: &str, current: Option<&str>) -> String {
    let name = strip_control_chars(name);
    if current == Some(&*name) {
        format!("* {name} (current)")
    } else {
        format!("* {name}")
    }
}

fn feed_record(feed: &Feed) -> String {
    format!(
        "* ID:      {}\n* Name:    {}\n* URL:     {}\n* Created: {}",
        feed.id,
        strip_control_chars(&feed.name),
        strip_control_chars(&feed.url),
        format_timestamp(feed.created_at),
    )
}

fn feed_listing(feed: &FeedWithOwner) -> String {
    let mut out = format!(
        "* {}\n  URL:     {}\n  Owner:   {}",
        strip_control_chars(&feed.name),
        strip_control_chars(&feed.url),
        strip_control_chars(&feed.owner_name),
    );
    match feed.last_fetched_at {
        Some(ts) => out.push_str(&format!("\n  Fetched: {}", format_timestamp_micros(ts))),
        None => out.push_str("\n  Fetched: never"),
    }
    if let Some(err) = &feed.last_fetch_error {
        out.push_str(&format!("\n  Error:   {}", strip_control_chars(err)));
    }
    out
}

fn post_listing(post: &Post) -> String {
    let published = post
        .published_at
        .map(format_timestamp)
        .unwrap_or_else(|| "unknown date".to_string());
    let mut out = format!(
        "{} from {}\n--- {} ---\n",
        published,
        strip_control_chars(&post.feed_name),
        strip_control_chars(&post.title),
    );
    if let Some(desc) = post.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let desc = strip_control_chars(desc);
        out.push_str(&format!(
            "    {}\n",
            truncate_to_width(desc.trim(), DESCRIPTION_WIDTH)
        ));
    }
    out.push_str(&format!("Link: {}\n", strip_control_chars(&post.url)));
    out.push_str("=====================================");
    out
}

// ============================================================================
// Users
// ============================================================================

pub fn login<'a>(state: &'a mut State, args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let name = arg(args, 0, "login <name>")?;

        if state.db.get_user(name).await?.is_none() {
            return Err(CommandError::UserNotFound(name.to_string()));
        }

        state.config.set_user(name)?;
        println!("Logged in as {}", strip_control_chars(name));
        Ok(())
    }
    .boxed()
}

pub fn register<'a>(state: &'a mut State, args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let name = arg(args, 0, "register <name>")?;

        let user = state.db.create_user(name).await.map_err(|e| {
            if e.is_unique_violation() {
                CommandError::UserExists(name.to_string())
            } else {
                e.into()
            }
        })?;

        state.config.set_user(&user.name)?;
        tracing::info!(user = %user.name, id = user.id, "Registered user");
        println!("User created:");
        println!("* ID:      {}", user.id);
        println!("* Name:    {}", strip_control_chars(&user.name));
        println!("* Created: {}", format_timestamp(user.created_at));
        Ok(())
    }
    .boxed()
}

pub fn reset<'a>(state: &'a mut State, _args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        state.db.reset().await?;
        tracing::info!("Database reset");
        println!("Database reset successfully");
        Ok(())
    }
    .boxed()
}

pub fn users<'a>(state: &'a mut State, _args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let current = state.config.current_user_name.as_deref();
        for user in state.db.get_users().await? {
            println!("{}", user_line(&user.name, current));
        }
        Ok(())
    }
    .boxed()
}

// ============================================================================
// Aggregation
// ============================================================================

pub fn agg<'a>(state: &'a mut State, args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let every = parse_interval(arg(args, 0, "agg <interval>")?)?;

        println!("Collecting feeds every {}", humantime::format_duration(every));
        aggregator::run(
            &state.db,
            &state.client,
            every,
            state.config.fetch_error_policy,
        )
        .await?;
        Ok(())
    }
    .boxed()
}

// ============================================================================
// Feeds & Follows
// ============================================================================

pub fn add_feed<'a>(state: &'a mut State, args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        const USAGE: &str = "addfeed <name> <url>";
        let name = arg(args, 0, USAGE)?;
        let raw_url = arg(args, 1, USAGE)?;

        let user = current_user(state).await?;
        let url = validate_feed_url(raw_url)?;

        let (feed, _follow) = state
            .db
            .create_feed_with_follow(user.id, name.trim(), url.as_str())
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    CommandError::FeedExists(url.to_string())
                } else {
                    e.into()
                }
            })?;

        tracing::info!(feed = %feed.name, url = %feed.url, user = %user.name, "Added feed");
        println!("Feed created:");
        println!("{}", feed_record(&feed));
        println!("{} now follows {}", user.name, strip_control_chars(&feed.name));
        Ok(())
    }
    .boxed()
}

pub fn feeds<'a>(state: &'a mut State, _args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let feeds = state.db.get_feeds_with_owner().await?;
        if feeds.is_empty() {
            println!("No feeds found");
            return Ok(());
        }

        println!("Found {} feeds:", feeds.len());
        for feed in &feeds {
            println!("{}", feed_listing(feed));
        }
        Ok(())
    }
    .boxed()
}

pub fn follow<'a>(state: &'a mut State, args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let raw_url = arg(args, 0, "follow <url>")?;
        let user = current_user(state).await?;
        let feed = feed_by_url(state, raw_url).await?;

        state
            .db
            .create_feed_follow(user.id, feed.id)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    CommandError::AlreadyFollowing(feed.name.clone())
                } else {
                    e.into()
                }
            })?;

        println!("{} now follows {}", user.name, strip_control_chars(&feed.name));
        Ok(())
    }
    .boxed()
}

pub fn following<'a>(state: &'a mut State, _args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let user = current_user(state).await?;
        let followed = state.db.get_feed_follows_for_user(user.id).await?;
        if followed.is_empty() {
            println!("{} is not following any feeds", user.name);
            return Ok(());
        }

        println!("{} follows:", user.name);
        for feed in &followed {
            println!("* {}", strip_control_chars(&feed.feed_name));
        }
        Ok(())
    }
    .boxed()
}

pub fn unfollow<'a>(state: &'a mut State, args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let raw_url = arg(args, 0, "unfollow <url>")?;
        let user = current_user(state).await?;
        let feed = feed_by_url(state, raw_url).await?;

        if state.db.delete_feed_follow(user.id, feed.id).await? {
            println!("{} unfollowed {}", user.name, strip_control_chars(&feed.name));
        } else {
            println!(
                "{} was not following {}",
                user.name,
                strip_control_chars(&feed.name)
            );
        }
        Ok(())
    }
    .boxed()
}

// ============================================================================
// Posts
// ============================================================================

pub fn browse<'a>(state: &'a mut State, args: &'a [String]) -> HandlerFuture<'a> {
    async move {
        let limit = parse_limit(args.first())?;
        let user = current_user(state).await?;

        let posts = state.db.get_posts_for_user(user.id, i64::from(limit)).await?;
        if posts.is_empty() {
            println!("No posts yet. Follow some feeds and run `agg`.");
            return Ok(());
        }

        println!("Found {} posts for {}:", posts.len(), user.name);
        for post in &posts {
            println!("{}", post_listing(post));
        }
        Ok(())
    }
    .boxed()
}
