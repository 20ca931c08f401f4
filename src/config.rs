//! Configuration types for the gazette pipeline.
//!
//! Every knob lives in [`PipelineConfig`], built via [`PipelineConfigBuilder`].
//! Output locations are grouped in [`PipelinePaths`] so tests and callers can
//! point the whole pipeline at a temporary directory with one call.

use crate::error::DiarioError;
use crate::pipeline::classify::{ClassifierKind, Lexicon};
use crate::progress::ProgressCallback;
use chrono::NaiveTime;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Directory layout used by every stage.
///
/// Defaults mirror the folder names the pipeline has always used under its
/// base directory, so existing trees keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePaths {
    /// Downloaded PDFs waiting to be read.
    pub reading: PathBuf,
    /// PDFs already read, plus their full-text summaries.
    pub processed: PathBuf,
    /// Auction blocks.
    pub auction: PathBuf,
    /// Non-auction blocks.
    pub non_auction: PathBuf,
    /// Normalized LLM output.
    pub normalized: PathBuf,
    /// Prompt and original-text copies written during normalization.
    pub normalized_aux: PathBuf,
    /// Auction blocks that have already been normalized.
    pub normalized_inputs: PathBuf,
    /// Download registry JSON file.
    pub registry_file: PathBuf,
}

impl PipelinePaths {
    /// The standard layout below `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let leiloes = base.join("02 - arquivos com leilões");
        let auction = leiloes.join("separados");
        let normalized = leiloes.join("norm");
        Self {
            reading: base.join("00 - para leitura"),
            processed: base.join("01 - arquivos lidos"),
            non_auction: leiloes.join("classificado não leilão"),
            normalized_aux: normalized.join("resto"),
            normalized_inputs: auction.join("normalizados"),
            registry_file: base.join("tjpr_download_registry.json"),
            auction,
            normalized,
        }
    }

    /// Create every directory of the layout.
    pub fn ensure_all(&self) -> Result<(), DiarioError> {
        for dir in [
            &self.reading,
            &self.processed,
            &self.auction,
            &self.non_auction,
            &self.normalized,
            &self.normalized_aux,
            &self.normalized_inputs,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| DiarioError::CreateDirFailed {
                path: dir.clone(),
                source: e,
            })?;
        }
        if let Some(parent) = self.registry_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DiarioError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        debug!("Output directories ready");
        Ok(())
    }
}

impl Default for PipelinePaths {
    fn default() -> Self {
        Self::under(".")
    }
}

/// Two-column crop geometry, as fractions of the page size.
///
/// Vertical fractions are measured from the top of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Horizontal position of the gutter between left and right columns.
    pub split: f32,
    /// Top margin cut away from both columns.
    pub top: f32,
    /// Bottom edge of the text area.
    pub bottom: f32,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            split: 0.488,
            top: 0.015,
            bottom: 0.96,
        }
    }
}

impl ColumnLayout {
    fn validate(&self) -> Result<(), String> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !(in_unit(self.split) && in_unit(self.top) && in_unit(self.bottom)) {
            return Err(format!("column fractions must be within 0–1, got {self:?}"));
        }
        if self.top >= self.bottom {
            return Err(format!(
                "column top ({}) must be above bottom ({})",
                self.top, self.bottom
            ));
        }
        Ok(())
    }
}

/// Gazette portal settings for the downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal origin; download paths in the listing are relative to it.
    pub base_url: String,
    /// Search page path, appended to `base_url`.
    pub search_path: String,
    /// Query parameter carrying the listing page number.
    pub page_param: String,
    /// Listing pages visited per run. Default: 5.
    pub max_pages: usize,
    /// Pause between listing pages in milliseconds. Default: 1000.
    pub page_delay_ms: u64,
    /// Editions considered by a regular check. Default: 20.
    pub check_limit: usize,
    /// Editions considered by a full verification. Default: 170.
    pub verify_limit: usize,
    /// Concurrent downloads during a full verification. Default: 3.
    pub download_concurrency: usize,
    /// Seed for the registry's `last_edition`. Default: 3850.
    pub last_known_edition: u32,
    /// Per-request timeout in seconds. Default: 120.
    pub request_timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://portal.tjpr.jus.br".into(),
            search_path: "/e-dj/publico/diario/pesquisar.do".into(),
            page_param: "numeroPagina".into(),
            max_pages: 5,
            page_delay_ms: 1000,
            check_limit: 20,
            verify_limit: 170,
            download_concurrency: 3,
            last_known_edition: 3850,
            request_timeout_secs: 120,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .into(),
        }
    }
}

impl PortalConfig {
    /// Absolute URL of the search page.
    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.search_path)
    }
}

/// Configuration for a pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use diario_leiloes::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .base_dir("/tmp/diario")
///     .jurisdiction("PR")
///     .build()
///     .unwrap();
/// assert!(config.paths.auction.ends_with("separados"));
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Court code at the front of every block filename. Default: `PR`.
    pub jurisdiction: String,

    /// Where everything is read from and written to.
    pub paths: PipelinePaths,

    /// Classification strategy. Default: [`ClassifierKind::Scored`].
    pub classifier: ClassifierKind,

    /// Weighted terms used by the scored classifier.
    pub lexicon: Lexicon,

    /// Leading lines of a block searched for header fields. Default: 8.
    pub header_window_lines: usize,

    /// Directory holding the pdfium shared library. If None, the system
    /// library is used.
    pub pdfium_lib_dir: Option<PathBuf>,

    /// Column crop used when extracting PDF text.
    pub columns: ColumnLayout,

    /// Fixed "today" for header date fallbacks. If None, the local date.
    pub today: Option<chrono::NaiveDate>,

    /// Move each PDF to `paths.processed` after it is read. Default: true.
    pub move_processed: bool,

    // ── LLM normalization ─────────────────────────────────────────────────
    /// LLM model identifier. If None, `gpt-4o-mini`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens generated per notice. Default: 4096.
    pub max_tokens: usize,

    /// Retries on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call LLM timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Notices normalized at once. Default: 4.
    pub concurrency: usize,

    /// Custom system prompt for normalization. If None, the built-in one.
    pub system_prompt: Option<String>,

    // ── Downloader ────────────────────────────────────────────────────────
    pub portal: PortalConfig,

    /// Receives per-document and per-block events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jurisdiction: "PR".into(),
            paths: PipelinePaths::default(),
            classifier: ClassifierKind::default(),
            lexicon: Lexicon::default(),
            header_window_lines: 8,
            pdfium_lib_dir: None,
            columns: ColumnLayout::default(),
            today: None,
            move_processed: true,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            concurrency: 4,
            system_prompt: None,
            portal: PortalConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("jurisdiction", &self.jurisdiction)
            .field("paths", &self.paths)
            .field("classifier", &self.classifier)
            .field("header_window_lines", &self.header_window_lines)
            .field("pdfium_lib_dir", &self.pdfium_lib_dir)
            .field("columns", &self.columns)
            .field("today", &self.today)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("portal", &self.portal)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The date used when a block carries no date of its own.
    pub fn today(&self) -> chrono::NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn jurisdiction(mut self, code: impl Into<String>) -> Self {
        self.config.jurisdiction = code.into();
        self
    }

    /// Use the standard directory layout below `base`.
    pub fn base_dir(mut self, base: impl AsRef<Path>) -> Self {
        self.config.paths = PipelinePaths::under(base);
        self
    }

    pub fn paths(mut self, paths: PipelinePaths) -> Self {
        self.config.paths = paths;
        self
    }

    pub fn classifier(mut self, kind: ClassifierKind) -> Self {
        self.config.classifier = kind;
        self
    }

    pub fn lexicon(mut self, lexicon: Lexicon) -> Self {
        self.config.lexicon = lexicon;
        self
    }

    pub fn header_window_lines(mut self, n: usize) -> Self {
        self.config.header_window_lines = n.max(1);
        self
    }

    pub fn pdfium_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_dir = Some(dir.into());
        self
    }

    pub fn columns(mut self, layout: ColumnLayout) -> Self {
        self.config.columns = layout;
        self
    }

    pub fn today(mut self, date: chrono::NaiveDate) -> Self {
        self.config.today = Some(date);
        self
    }

    pub fn move_processed(mut self, v: bool) -> Self {
        self.config.move_processed = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn portal(mut self, portal: PortalConfig) -> Self {
        self.config.portal = portal;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DiarioError> {
        let c = &self.config;
        let code = c.jurisdiction.trim();
        if code.is_empty() || !code.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(DiarioError::InvalidConfig(format!(
                "Jurisdiction code must be non-empty ASCII alphanumerics, got '{}'",
                c.jurisdiction
            )));
        }
        c.columns.validate().map_err(DiarioError::InvalidConfig)?;
        c.lexicon.validate()?;
        if c.portal.download_concurrency == 0 {
            return Err(DiarioError::InvalidConfig(
                "Download concurrency must be ≥ 1".into(),
            ));
        }
        if c.portal.max_pages == 0 {
            return Err(DiarioError::InvalidConfig(
                "Portal page limit must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Parse an `HH:MM` time of day, as used by the daily watch schedule.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, DiarioError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| DiarioError::InvalidConfig(format!("Invalid time '{s}' (expected HH:MM): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_folder_names() {
        let p = PipelinePaths::under("/base");
        assert_eq!(p.reading, PathBuf::from("/base/00 - para leitura"));
        assert_eq!(p.processed, PathBuf::from("/base/01 - arquivos lidos"));
        assert_eq!(
            p.auction,
            PathBuf::from("/base/02 - arquivos com leilões/separados")
        );
        assert_eq!(
            p.non_auction,
            PathBuf::from("/base/02 - arquivos com leilões/classificado não leilão")
        );
        assert_eq!(
            p.normalized_aux,
            PathBuf::from("/base/02 - arquivos com leilões/norm/resto")
        );
        assert_eq!(
            p.normalized_inputs,
            PathBuf::from("/base/02 - arquivos com leilões/separados/normalizados")
        );
    }

    #[test]
    fn ensure_all_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let p = PipelinePaths::under(dir.path());
        p.ensure_all().unwrap();
        assert!(p.reading.is_dir());
        assert!(p.non_auction.is_dir());
        assert!(p.normalized_inputs.is_dir());
    }

    #[test]
    fn builder_defaults() {
        let c = PipelineConfig::builder().build().unwrap();
        assert_eq!(c.jurisdiction, "PR");
        assert_eq!(c.classifier, ClassifierKind::Scored);
        assert_eq!(c.portal.last_known_edition, 3850);
        assert_eq!(c.portal.search_url(), "https://portal.tjpr.jus.br/e-dj/publico/diario/pesquisar.do");
    }

    #[test]
    fn builder_rejects_bad_jurisdiction() {
        assert!(PipelineConfig::builder().jurisdiction("").build().is_err());
        assert!(PipelineConfig::builder().jurisdiction("P R").build().is_err());
    }

    #[test]
    fn builder_rejects_inverted_columns() {
        let err = PipelineConfig::builder()
            .columns(ColumnLayout {
                split: 0.5,
                top: 0.9,
                bottom: 0.1,
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("above bottom"));
    }

    #[test]
    fn injected_today_is_used() {
        let d = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let c = PipelineConfig::builder().today(d).build().unwrap();
        assert_eq!(c.today(), d);
    }

    #[test]
    fn time_of_day_parses() {
        let t = parse_time_of_day("09:00").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("nove").is_err());
    }
}
