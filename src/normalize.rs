//! LLM normalization of auction blocks into structured lot data.
//!
//! For every auction block file:
//!
//! 1. copy the original text to the auxiliary directory as `<stem>_ORIGINAL.txt`
//!    and the exact prompt as `<stem>_PROMPT.txt`;
//! 2. ask the model (retries, backoff and timeout per [`crate::pipeline::llm`]);
//! 3. save the raw answer as `<stem>_NORM.txt`, and when it parses, the
//!    pretty-printed [`NormalizedNotice`] as `<stem>_NORM.json`;
//! 4. move the input into the `normalizados` directory.
//!
//! Inputs whose call failed stay where they are so the next run retries them.

use crate::config::PipelineConfig;
use crate::error::{BlockError, DiarioError};
use crate::output::{NormalizeResult, NormalizedNotice};
use crate::pipeline::{input, llm, postprocess};
use crate::prompts::notice_prompt;
use edgequake_llm::LLMProvider;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Normalize one auction block file.
pub async fn normalize_file(
    provider: &Arc<dyn LLMProvider>,
    path: &Path,
    config: &PipelineConfig,
) -> Result<NormalizeResult, DiarioError> {
    let paths = &config.paths;
    let text = input::read_text(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "edital".to_string());

    write(&paths.normalized_aux.join(format!("{stem}_ORIGINAL.txt")), &text)?;
    write(
        &paths.normalized_aux.join(format!("{stem}_PROMPT.txt")),
        &notice_prompt(&text),
    )?;

    let answer = llm::normalize_notice(provider, &stem, &text, config).await;

    let mut result = NormalizeResult {
        source: path.to_path_buf(),
        raw_path: None,
        json_path: None,
        lots: 0,
        input_tokens: answer.input_tokens,
        output_tokens: answer.output_tokens,
        duration_ms: answer.duration_ms,
        retries: answer.retries,
        error: answer.error,
    };
    if result.error.is_some() {
        return Ok(result);
    }

    let raw_path = paths.normalized.join(format!("{stem}_NORM.txt"));
    write(&raw_path, &answer.content)?;
    result.raw_path = Some(raw_path);

    match postprocess::parse_notice(&postprocess::clean_json_answer(&answer.content)) {
        Some(notice) => {
            result.lots = notice.leiloes.len();
            let json_path = paths.normalized.join(format!("{stem}_NORM.json"));
            write(&json_path, &to_pretty_json(&notice)?)?;
            result.json_path = Some(json_path);
        }
        None => warn!("{}: answer is not valid JSON, kept raw text only", stem),
    }

    input::move_into(path, &paths.normalized_inputs)?;
    Ok(result)
}

/// Normalize every `.txt` file in `dir` (default: the auction directory).
///
/// Runs up to `config.concurrency` calls at once. A file that fails with a
/// fatal error is reported as a failed result and the rest continue.
pub async fn normalize_directory(
    dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<Vec<NormalizeResult>, DiarioError> {
    config.paths.ensure_all()?;
    let provider = llm::resolve_provider(config)?;
    let dir = dir.unwrap_or(&config.paths.auction);
    let files = input::list_files(dir, "txt")?;
    info!("{} notices to normalize in {}", files.len(), dir.display());

    let cb = config.progress_callback.clone();
    if let Some(ref cb) = cb {
        cb.on_batch_start(files.len());
    }

    let results: Vec<NormalizeResult> = stream::iter(files.into_iter().map(|path| {
        let provider = Arc::clone(&provider);
        let cb = cb.clone();
        async move {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(ref cb) = cb {
                cb.on_item_start(&name);
            }
            let result = match normalize_file(&provider, &path, config).await {
                Ok(r) => r,
                Err(e) => failed(path, &name, e),
            };
            if let Some(ref cb) = cb {
                let err = result.error.as_ref().map(|e| e.to_string());
                cb.on_item_complete(&name, err.as_deref());
            }
            result
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    let failed_count = results.iter().filter(|r| r.error.is_some()).count();
    info!(
        "Normalization complete: {}/{} notices",
        results.len() - failed_count,
        results.len()
    );
    if let Some(ref cb) = cb {
        cb.on_batch_complete(results.len(), failed_count);
    }
    Ok(results)
}

fn failed(path: PathBuf, name: &str, e: DiarioError) -> NormalizeResult {
    warn!("{}: {}", name, e);
    NormalizeResult {
        source: path,
        raw_path: None,
        json_path: None,
        lots: 0,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
        retries: 0,
        error: Some(BlockError::NormalizeFailed {
            name: name.to_string(),
            retries: 0,
            detail: e.to_string(),
        }),
    }
}

fn to_pretty_json(notice: &NormalizedNotice) -> Result<String, DiarioError> {
    serde_json::to_string_pretty(notice)
        .map_err(|e| DiarioError::Internal(format!("Failed to serialise notice: {e}")))
}

fn write(path: &Path, content: &str) -> Result<(), DiarioError> {
    std::fs::write(path, content).map_err(|e| DiarioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
