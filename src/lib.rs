//! # diario-leiloes
//!
//! Find auction notices (editais de leilão) in the Paraná court gazette.
//!
//! The gazette is a two-column PDF with hundreds of unrelated publications
//! per edition, each opened by an `IDMATERIA<digits>IDMATERIA` marker. This crate cuts an
//! edition into those blocks, decides which ones announce an auction, and
//! writes every block to its own uniquely named file so auction notices can be
//! read (or sent to an LLM) one at a time.
//!
//! ## Pipeline Overview
//!
//! ```text
//! portal ──► PDF
//!             │
//!             ├─ 1. Text      two-column crop via pdfium (spawn_blocking)
//!             ├─ 2. Extract   header, index, boilerplate-free blocks
//!             ├─ 3. Classify  weighted lexicon → auction / non-auction
//!             ├─ 4. Name      PR_<date>_P<number>_ID<id>_B<block>[_nao_leilao].txt
//!             └─ 5. Normalize auction blocks → structured lot JSON (LLM)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use diario_leiloes::{process_directory, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder().base_dir("/dados/diarios").build()?;
//!     let report = process_directory(&config).await?;
//!     eprintln!(
//!         "{} documents, {} auction blocks",
//!         report.stats.documents, report.stats.auction_blocks
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `diario` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod portal;
pub mod process;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    parse_time_of_day, ColumnLayout, PipelineConfig, PipelineConfigBuilder, PipelinePaths,
    PortalConfig,
};
pub use error::{BlockError, DiarioError};
pub use normalize::{normalize_directory, normalize_file};
pub use output::{
    AuctionLot, BatchReport, BatchStats, BlockResult, DocumentReport, NormalizeResult,
    NormalizedNotice,
};
pub use pipeline::classify::{BlockLabel, ClassifierKind, Lexicon};
pub use portal::{check_new_editions, verify_all, watch, FetchReport};
pub use process::{process_directory, process_path, split_directory, split_file, Pipeline};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
