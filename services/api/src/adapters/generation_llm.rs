//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the content-generation LLM.
//! It implements the `GenerationService` port from the `core` crate, turning
//! each structured `PromptContext` into a chat-completion request.

const ANALYZE_SYSTEM: &str = "You are a content analyst. You receive a raw brain dump: \
free-form notes, extracted file text, and video transcripts. Organize the material into \
topics. Output one topic name per line, followed by its key points as '- ' bullet lines. \
No preamble, no commentary.";

const IDEAS_SYSTEM: &str = "You are an editor proposing ebook concepts. From the analyzed \
topics you receive, propose distinct ebook ideas. Output one idea per line in the exact \
form 'Title: one-sentence description'. No preamble, no commentary.";

const CHAPTER_SYSTEM: &str = "You are a professional ghostwriter. Write the requested \
chapter in clear, engaging prose, in Markdown, continuing naturally from the chapters \
written so far. Output only the chapter body, without repeating the chapter title.";

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use autopen_core::ports::{GenerationError, GenerationService, PromptContext};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    analysis_model: String,
    idea_model: String,
    chapter_model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        analysis_model: String,
        idea_model: String,
        chapter_model: String,
    ) -> Self {
        Self {
            client,
            analysis_model,
            idea_model,
            chapter_model,
        }
    }

    /// The system prompt, user prompt, and model for one context.
    fn plan(&self, context: &PromptContext) -> (&str, String, &str) {
        match context {
            PromptContext::AnalyzeBrainDump {
                raw_text,
                file_texts,
                transcripts,
            } => {
                let mut user = format!("NOTES:\n{raw_text}\n");
                for text in file_texts {
                    user.push_str(&format!("\nFILE TEXT:\n{text}\n"));
                }
                for transcript in transcripts {
                    user.push_str(&format!("\nTRANSCRIPT:\n{transcript}\n"));
                }
                (ANALYZE_SYSTEM, user, self.analysis_model.as_str())
            }
            PromptContext::ProposeIdeas { analysis, count } => {
                let mut user = format!("Propose {count} ebook ideas from these topics:\n");
                for topic in &analysis.topics {
                    user.push_str(&format!("\n{}:\n", topic.name));
                    for point in &topic.points {
                        user.push_str(&format!("- {point}\n"));
                    }
                }
                (IDEAS_SYSTEM, user, self.idea_model.as_str())
            }
            PromptContext::WriteChapter {
                ebook_title,
                ebook_description,
                chapter_title,
                prior_chapters,
            } => {
                let mut user = format!(
                    "EBOOK: {ebook_title}\nABOUT: {ebook_description}\n"
                );
                for (title, content) in prior_chapters {
                    user.push_str(&format!("\nPREVIOUS CHAPTER '{title}':\n{content}\n"));
                }
                user.push_str(&format!("\nWrite the chapter titled '{chapter_title}'."));
                (CHAPTER_SYSTEM, user, self.chapter_model.as_str())
            }
        }
    }
}

/// Map an OpenAI client error onto the port's failure classes. An invalid
/// or missing key is fatal to the calling workflow step; everything else
/// is treated as transient.
fn classify(error: OpenAIError) -> GenerationError {
    match &error {
        OpenAIError::ApiError(api_error) => {
            let code = api_error.code.as_deref().unwrap_or_default();
            let message = api_error.message.to_ascii_lowercase();
            if code == "invalid_api_key" || message.contains("api key") {
                GenerationError::Auth(api_error.message.clone())
            } else {
                GenerationError::Transient(api_error.message.clone())
            }
        }
        _ => GenerationError::Transient(error.to_string()),
    }
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    async fn complete(&self, context: &PromptContext) -> Result<String, GenerationError> {
        let (system, user, model) = self.plan(context);

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| GenerationError::Transient(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| GenerationError::Transient(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| GenerationError::Transient(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_openai::error::ApiError;

    #[test]
    fn invalid_key_is_an_auth_failure() {
        let error = OpenAIError::ApiError(ApiError {
            message: "Incorrect API key provided".to_string(),
            r#type: Some("invalid_request_error".to_string()),
            param: None,
            code: Some("invalid_api_key".to_string()),
        });
        assert_matches!(classify(error), GenerationError::Auth(_));
    }

    #[test]
    fn rate_limit_is_transient() {
        let error = OpenAIError::ApiError(ApiError {
            message: "Rate limit reached".to_string(),
            r#type: Some("requests".to_string()),
            param: None,
            code: Some("rate_limit_exceeded".to_string()),
        });
        assert_matches!(classify(error), GenerationError::Transient(_));
    }
}
