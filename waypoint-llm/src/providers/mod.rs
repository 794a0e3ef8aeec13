//! LLM provider implementations
//!
//! Concrete [`CurriculumSynthesizer`](crate::CurriculumSynthesizer) backends.

pub mod openai;

pub use openai::{OpenAIClient, OpenAiConfig, OpenAiSynthesizer};
