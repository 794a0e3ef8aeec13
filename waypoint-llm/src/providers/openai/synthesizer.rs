//! OpenAI curriculum synthesizer

use super::client::OpenAIClient;
use super::config::OpenAiConfig;
use super::types::{CompletionRequest, CompletionResponse, Message, ResponseFormat};
use crate::{
    build_curriculum_prompt, invalid_response, parse_curriculum, CurriculumSynthesizer,
    CURRICULUM_SYSTEM_PROMPT,
};
use async_trait::async_trait;
use waypoint_core::{CurriculumStep, PrerequisiteSkeleton, SynthesisError};

/// Curriculum synthesizer backed by a chat completion model.
pub struct OpenAiSynthesizer {
    client: OpenAIClient,
    model: String,
}

impl OpenAiSynthesizer {
    pub fn new(config: &OpenAiConfig) -> Result<Self, SynthesisError> {
        Ok(Self {
            client: OpenAIClient::new(config)?,
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, program: &str, skeleton: &PrerequisiteSkeleton) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(CURRICULUM_SYSTEM_PROMPT),
                Message::user(build_curriculum_prompt(program, skeleton)),
            ],
            max_tokens: Some(1500),
            temperature: Some(0.3),
            response_format: Some(ResponseFormat::json_object()),
        }
    }
}

#[async_trait]
impl CurriculumSynthesizer for OpenAiSynthesizer {
    async fn synthesize(
        &self,
        program: &str,
        skeleton: &PrerequisiteSkeleton,
    ) -> Result<Vec<CurriculumStep>, SynthesisError> {
        let request = self.build_request(program, skeleton);
        let response: CompletionResponse = self.client.request("chat/completions", request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| invalid_response("openai", "No completion in response"))?;

        let steps = parse_curriculum("openai", &text)?;
        tracing::debug!(
            program = %program,
            model = %self.model,
            steps = steps.len(),
            "Curriculum synthesized"
        );
        Ok(steps)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

impl std::fmt::Debug for OpenAiSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSynthesizer")
            .field("model", &self.model)
            .finish()
    }
}
