//! OpenAI provider implementation
//!
//! Works against any OpenAI-compatible `chat/completions` endpoint.

pub mod client;
pub mod config;
pub mod synthesizer;
pub mod types;

pub use client::OpenAIClient;
pub use config::OpenAiConfig;
pub use synthesizer::OpenAiSynthesizer;
