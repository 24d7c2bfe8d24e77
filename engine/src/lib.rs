//! Core engine for Arkaios: the conversation session and its tool loop.
//!
//! This crate has no terminal or network code of its own. The backend is
//! reached through [`arkaios_providers::ModelGateway`] and tools through
//! [`arkaios_tools::ToolRegistry`], both handed in by the caller.

mod config;
pub mod prompts;
mod session;
mod transcript;

pub use arkaios_providers::{self, ApiConfig};
pub use arkaios_tools::{self, AccessLevel, Workspace};
pub use arkaios_types::{DisplayRole, ImageAttachment, Message, MessageId};

pub use config::{
    AppConfig, ArkaiosConfig, ConfigError, GeminiConfig, ToolsConfig, config_path,
    expand_env_vars,
};
pub use session::{
    DEFAULT_MAX_CHAIN_DEPTH, Session, SessionSettings, SubmitOutcome, TurnOutcome, TurnReport,
};
pub use transcript::Transcript;
