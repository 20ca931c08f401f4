//! LLM interaction: send one auction notice to the provider and collect the answer.
//!
//! All prompt text lives in [`crate::prompts`]; this module owns provider
//! resolution, the per-call timeout and the retry loop.
//!
//! ## Retry Strategy
//!
//! Failed or timed-out calls are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`): with 500 ms base and 3 retries the
//! waits are 500 ms → 1 s → 2 s.

use crate::config::PipelineConfig;
use crate::error::{BlockError, DiarioError};
use crate::prompts::{notice_prompt, DEFAULT_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Answer for one notice. Never an `Err`: failures land in `error`.
#[derive(Debug, Clone)]
pub struct LlmAnswer {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u8,
    pub error: Option<BlockError>,
}

/// The messages sent for one notice: system prompt, then the filled template.
pub fn build_messages(notice_text: &str, config: &PipelineConfig) -> Vec<ChatMessage> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(notice_prompt(notice_text)),
    ]
}

/// Normalize one notice.
///
/// `name` only labels logs and errors. A single bad notice never aborts the
/// batch; callers check `answer.error`.
pub async fn normalize_notice(
    provider: &Arc<dyn LLMProvider>,
    name: &str,
    notice_text: &str,
    config: &PipelineConfig,
) -> LlmAnswer {
    let start = Instant::now();
    let messages = build_messages(notice_text, config);
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<String> = None;
    let mut timed_out = false;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                name, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    name, response.prompt_tokens, response.completion_tokens, duration
                );
                return LlmAnswer {
                    content: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                    error: None,
                };
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("{}: attempt {} failed: {}", name, attempt + 1, err_msg);
                timed_out = false;
                last_err = Some(err_msg);
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    name,
                    attempt + 1,
                    config.api_timeout_secs
                );
                timed_out = true;
                last_err = Some(format!("timed out after {}s", config.api_timeout_secs));
            }
        }
    }

    let error = if timed_out {
        BlockError::Timeout {
            name: name.to_string(),
            secs: config.api_timeout_secs,
        }
    } else {
        BlockError::NormalizeFailed {
            name: name.to_string(),
            retries: config.max_retries as u8,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        }
    };

    LlmAnswer {
        content: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: start.elapsed().as_millis() as u64,
        retries: config.max_retries as u8,
        error: Some(error),
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DiarioError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DiarioError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`]).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set.
/// 4. OpenAI when `OPENAI_API_KEY` is set.
/// 5. [`ProviderFactory::from_env`] auto-detection.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, DiarioError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DiarioError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn messages_are_system_then_user() {
        let config = PipelineConfig::builder()
            .system_prompt("extraia tudo")
            .build()
            .unwrap();
        assert_eq!(build_messages("EDITAL", &config).len(), 2);
    }
}
