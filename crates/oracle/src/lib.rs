//! Correspondence oracle backed by an OpenAI-compatible chat-completions API.
//!
//! [`prompt`] holds the fixed templates; [`client`] sends them and implements
//! [`rosterlink_merge::Oracle`].

pub mod client;
pub mod prompt;

pub use client::{ChatClient, ChatOracle, OracleError};
