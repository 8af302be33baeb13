use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::model_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Default `tracing` filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "chat_wrapped_api=info,tower_http=info";

pub const DEFAULT_DECK_IDLE_SECS: u64 = 30 * 60;
pub const DEFAULT_MAX_DECKS: usize = 1000;

/// Bounds on the in-memory deck sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckLimits {
    /// A deck untouched for this long is dropped
    pub idle: Duration,
    /// Opening one more evicts the least recently used
    pub max_decks: usize,
}

impl Default for DeckLimits {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(DEFAULT_DECK_IDLE_SECS),
            max_decks: DEFAULT_MAX_DECKS,
        }
    }
}

/// Chat Wrapped analysis and slide deck API
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-wrapped-api")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Model used for the analysis
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the model API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub api_base: String,

    /// Seconds to wait for the model before failing the request
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    /// Seconds a deck may sit untouched before it is dropped
    #[arg(long, default_value_t = DEFAULT_DECK_IDLE_SECS)]
    pub deck_idle_secs: u64,

    /// Most decks kept in memory at once
    #[arg(long, default_value_t = DEFAULT_MAX_DECKS)]
    pub max_decks: usize,

    /// Model API credential
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: String,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn deck_limits(&self) -> DeckLimits {
        DeckLimits {
            idle: Duration::from_secs(self.deck_idle_secs),
            max_decks: self.max_decks,
        }
    }
}
