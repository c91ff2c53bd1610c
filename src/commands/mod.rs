//! Command dispatch.
//!
//! A [`Registry`] maps command names to handler functions. Every handler
//! receives the explicit [`State`] (config, database, HTTP client) and the
//! raw argument list, so nothing depends on process-global state.

pub mod handlers;

use std::collections::HashMap;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::feed::ScrapeError;
use crate::storage::{Database, DatabaseError};
use crate::util::UrlValidationError;

/// Reserved name that lists the registered commands
pub const HELP_COMMAND: &str = "help";

// ============================================================================
// Error Types
// ============================================================================

/// Errors returned by individual command handlers
#[derive(Debug, Error)]
pub enum CommandError {
    /// Missing or insufficient arguments
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("no current user; run `register <name>` or `login <name>` first")]
    NotLoggedIn,

    #[error("user '{0}' does not exist")]
    UserNotFound(String),

    #[error("user '{0}' already exists")]
    UserExists(String),

    #[error("no feed with url '{0}'")]
    FeedNotFound(String),

    #[error("a feed with url '{0}' already exists")]
    FeedExists(String),

    #[error("already following '{0}'")]
    AlreadyFollowing(String),

    #[error("invalid limit '{value}': expected a non-negative integer")]
    InvalidLimit {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("invalid interval '{value}': expected a duration such as 30s or 1m")]
    InvalidInterval {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("interval must be greater than zero")]
    ZeroInterval,

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Aggregation(#[from] ScrapeError),
}

/// Errors returned by [`Registry::run`]
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no such command '{0}' (try `help`)")]
    UnknownCommand(String),

    /// The handler ran and failed; the cause is kept as the source
    #[error("command '{name}' failed")]
    Failed {
        name: String,
        #[source]
        source: CommandError,
    },
}

// ============================================================================
// State & Commands
// ============================================================================

/// Everything a handler may touch
pub struct State {
    pub config: Config,
    pub db: Database,
    pub client: reqwest::Client,
}

impl State {
    pub fn new(config: Config, db: Database, client: reqwest::Client) -> Self {
        Self { config, db, client }
    }
}

/// A parsed invocation: `gator <name> [args...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), CommandError>>;

/// A command handler. Plain function pointers keep the registry a simple
/// lookup table.
pub type Handler = for<'a> fn(&'a mut State, &'a [String]) -> HandlerFuture<'a>;

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in command
    pub fn with_default_commands() -> Self {
        let mut registry = Self::new();
        registry.register("login", handlers::login);
        registry.register("register", handlers::register);
        registry.register("reset", handlers::reset);
        registry.register("users", handlers::users);
        registry.register("agg", handlers::agg);
        registry.register("addfeed", handlers::add_feed);
        registry.register("feeds", handlers::feeds);
        registry.register("follow", handlers::follow);
        registry.register("following", handlers::following);
        registry.register("unfollow", handlers::unfollow);
        registry.register("browse", handlers::browse);
        registry
    }

    /// Register a handler. A later registration under the same name replaces
    /// the earlier one.
    pub fn register(&mut self, name: &str, handler: Handler) {
        self.handlers.insert(name.to_string(), handler);
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Text printed by the reserved `help` command
    pub fn help_text(&self) -> String {
        let mut text = String::from("Command List:\n");
        for name in self.names() {
            text.push_str("* ");
            text.push_str(name);
            text.push('\n');
        }
        text
    }

    /// Run a command against the state.
    ///
    /// `help` is answered here without invoking any handler.
    pub async fn run(&self, state: &mut State, command: &Command) -> Result<(), DispatchError> {
        if command.name == HELP_COMMAND {
            print!("{}", self.help_text());
            return Ok(());
        }

        let handler = self
            .handlers
            .get(&command.name)
            .ok_or_else(|| DispatchError::UnknownCommand(command.name.clone()))?;

        tracing::debug!(command = %command.name, args = ?command.args, "Running command");
        handler(state, &command.args)
            .await
            .map_err(|source| DispatchError::Failed {
                name: command.name.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;

    fn always_fails<'a>(_state: &'a mut State, _args: &'a [String]) -> HandlerFuture<'a> {
        async move { Err(CommandError::UserNotFound("ghost".to_string())) }.boxed()
    }

    fn sets_user<'a>(state: &'a mut State, args: &'a [String]) -> HandlerFuture<'a> {
        async move {
            state.config.current_user_name = args.first().cloned();
            Ok(())
        }
        .boxed()
    }

    async fn test_state() -> State {
        let db = Database::open(":memory:").await.unwrap();
        let client = crate::feed::build_client().unwrap();
        State::new(Config::default(), db, client)
    }

    #[test]
    fn test_default_commands_registered() {
        let registry = Registry::with_default_commands();
        assert_eq!(
            registry.names(),
            vec![
                "addfeed",
                "agg",
                "browse",
                "feeds",
                "follow",
                "following",
                "login",
                "register",
                "reset",
                "unfollow",
                "users",
            ]
        );
    }

    #[test]
    fn test_help_text_lists_names_in_order() {
        let mut registry = Registry::new();
        registry.register("zeta", sets_user);
        registry.register("alpha", sets_user);
        assert_eq!(registry.help_text(), "Command List:\n* alpha\n* zeta\n");
    }

    #[tokio::test]
    async fn test_run_invokes_handler_with_args() {
        let mut registry = Registry::new();
        registry.register("set", sets_user);
        let mut state = test_state().await;

        registry
            .run(&mut state, &Command::new("set", vec!["alice".to_string()]))
            .await
            .unwrap();
        assert_eq!(state.config.current_user_name.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let registry = Registry::new();
        let mut state = test_state().await;

        let err = registry
            .run(&mut state, &Command::new("frobnicate", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownCommand(ref n) if n == "frobnicate"));
    }

    #[tokio::test]
    async fn test_handler_error_wrapped_with_cause() {
        let mut registry = Registry::new();
        registry.register("boom", always_fails);
        let mut state = test_state().await;

        let err = registry
            .run(&mut state, &Command::new("boom", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "command 'boom' failed");
        match err {
            DispatchError::Failed { name, source } => {
                assert_eq!(name, "boom");
                assert!(matches!(source, CommandError::UserNotFound(_)));
            }
            e => panic!("Expected Failed, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut registry = Registry::new();
        registry.register("cmd", always_fails);
        registry.register("cmd", sets_user);
        let mut state = test_state().await;

        registry
            .run(&mut state, &Command::new("cmd", vec!["bob".to_string()]))
            .await
            .unwrap();
        assert_eq!(registry.names(), vec!["cmd"]);
    }

    #[tokio::test]
    async fn test_help_is_reserved() {
        let mut registry = Registry::new();
        registry.register("help", always_fails);
        let mut state = test_state().await;

        registry
            .run(&mut state, &Command::new("help", vec![]))
            .await
            .unwrap();
    }
}
