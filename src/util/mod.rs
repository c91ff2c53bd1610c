//! Utility functions shared by the command handlers.
//!
//! - **URL validation**: shape checks for feed URLs given to `addfeed`
//! - **Text processing**: sanitising and truncating feed text for the terminal

mod text;
mod url_validator;

pub use text::{format_timestamp, format_timestamp_micros, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_feed_url, UrlValidationError};
