//! Waypoint LLM - Curriculum Synthesis
//!
//! Provider-agnostic trait for turning a program name and its prerequisite
//! skeleton into an ordered curriculum. The synthesizer is optional: whether
//! one is configured is decided once at startup and carried as a
//! [`SynthesizerCapability`].

pub mod providers;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use waypoint_core::{CurriculumStep, PrerequisiteSkeleton, SynthesisError};

pub use providers::openai::{OpenAIClient, OpenAiConfig, OpenAiSynthesizer};

/// Most steps kept from a synthesized curriculum.
pub const MAX_CURRICULUM_STEPS: usize = 12;

/// Most topics kept per synthesized step.
pub const MAX_TOPICS_PER_STEP: usize = 8;

// ============================================================================
// SYNTHESIZER TRAIT
// ============================================================================

/// Produces an ordered curriculum for a program.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CurriculumSynthesizer: Send + Sync {
    /// Synthesize curriculum steps for `program`, using `skeleton` as the
    /// prerequisite ordering hint.
    async fn synthesize(
        &self,
        program: &str,
        skeleton: &PrerequisiteSkeleton,
    ) -> Result<Vec<CurriculumStep>, SynthesisError>;

    /// Provider name for logs and health output.
    fn provider_name(&self) -> &str;
}

/// Whether curriculum synthesis is possible in this process.
#[derive(Clone)]
pub enum SynthesizerCapability {
    Available(Arc<dyn CurriculumSynthesizer>),
    Unavailable,
}

impl SynthesizerCapability {
    pub fn available(synthesizer: Arc<dyn CurriculumSynthesizer>) -> Self {
        Self::Available(synthesizer)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// The synthesizer, or [`SynthesisError::Unavailable`].
    pub fn synthesizer(&self) -> Result<&Arc<dyn CurriculumSynthesizer>, SynthesisError> {
        match self {
            Self::Available(synthesizer) => Ok(synthesizer),
            Self::Unavailable => Err(SynthesisError::Unavailable),
        }
    }
}

impl std::fmt::Debug for SynthesizerCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(s) => f
                .debug_tuple("Available")
                .field(&s.provider_name())
                .finish(),
            Self::Unavailable => f.write_str("Unavailable"),
        }
    }
}

// ============================================================================
// ERROR HELPERS
// ============================================================================

pub(crate) fn request_failed(
    provider: &str,
    status: i32,
    message: impl Into<String>,
) -> SynthesisError {
    SynthesisError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    }
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> SynthesisError {
    SynthesisError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    }
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> SynthesisError {
    SynthesisError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
}

// ============================================================================
// PROMPT AND RESPONSE PARSING
// ============================================================================

/// System prompt asking for a JSON curriculum.
pub const CURRICULUM_SYSTEM_PROMPT: &str = "You are a curriculum designer. \
Given an academic program and its known prerequisites, produce an ordered learning roadmap. \
Respond with ONLY a JSON object of the form \
{\"steps\": [{\"title\": \"...\", \"description\": \"...\", \"topics\": [\"...\"]}]}. \
Order steps from foundational to advanced. Use 3 to 8 steps and 2 to 5 short, \
searchable topics per step.";

/// User prompt for `program` and its prerequisite layers.
pub fn build_curriculum_prompt(program: &str, skeleton: &PrerequisiteSkeleton) -> String {
    let mut prompt = format!("Program: {}\n", program);
    if skeleton.is_empty() {
        prompt.push_str("Known prerequisites: none\n");
    } else {
        prompt.push_str("Known prerequisites, foundational first:\n");
        for (depth, level) in skeleton.levels.iter().enumerate() {
            if level.is_empty() {
                continue;
            }
            prompt.push_str(&format!("  Level {}: {}\n", depth + 1, level.join(", ")));
        }
    }
    prompt.push_str("Produce the roadmap JSON.");
    prompt
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CurriculumJson {
    Wrapped { steps: Vec<StepJson> },
    Bare(Vec<StepJson>),
}

#[derive(Debug, Deserialize)]
struct StepJson {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

/// Parse a model reply into curriculum steps.
///
/// Accepts either `{"steps": [...]}` or a bare array, optionally wrapped in a
/// Markdown code fence. Steps without a title or topics are dropped, topics
/// are trimmed and deduplicated, and both lists are capped.
pub fn parse_curriculum(provider: &str, text: &str) -> Result<Vec<CurriculumStep>, SynthesisError> {
    let json = extract_json(text)
        .ok_or_else(|| invalid_response(provider, "No JSON found in completion"))?;
    let parsed: CurriculumJson = serde_json::from_str(json)
        .map_err(|e| invalid_response(provider, format!("Malformed curriculum JSON: {}", e)))?;
    let raw_steps = match parsed {
        CurriculumJson::Wrapped { steps } | CurriculumJson::Bare(steps) => steps,
    };

    let steps: Vec<CurriculumStep> = raw_steps
        .into_iter()
        .filter_map(|step| {
            let title = step.title.trim().to_string();
            let mut seen = HashSet::new();
            let topics: Vec<String> = step
                .topics
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
                .take(MAX_TOPICS_PER_STEP)
                .collect();
            if title.is_empty() || topics.is_empty() {
                return None;
            }
            Some(CurriculumStep {
                title,
                description: step
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
                topics,
            })
        })
        .take(MAX_CURRICULUM_STEPS)
        .collect();

    if steps.is_empty() {
        return Err(invalid_response(provider, "Curriculum contained no usable steps"));
    }
    Ok(steps)
}

/// Slice out the outermost JSON object or array.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(|c| c == '{' || c == '[')?;
    let closing = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closing)?;
    (end > start).then(|| &text[start..=end])
}
