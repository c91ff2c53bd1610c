//! SQLite persistence for users, feeds, follows and posts.
//!
//! Every operation is a parameterized query on [`Database`]; the impl blocks
//! are split by table.

mod feeds;
mod follows;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{
    DatabaseError, Feed, FeedFollow, FeedWithOwner, FollowedFeed, NewPost, Post, User,
};
