//! Error types for the diario-leiloes library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DiarioError`]: **Fatal**: the run cannot proceed at all (output
//!   directory cannot be created, pdfium cannot be bound, the portal is
//!   unreachable, no LLM provider configured). Returned as `Err(DiarioError)`
//!   from the top-level entry points.
//!
//! * [`BlockError`]: **Non-fatal**: a single block failed (write error,
//!   LLM call exhausted its retries) while every other block of the same
//!   document is fine. Stored inside [`crate::output::BlockResult`] so one bad
//!   block never costs the rest of the document.
//!
//! Missing header fields, marker-less segments and filename collisions are not
//! errors at all: they resolve to documented defaults, drops and suffixes.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the diario-leiloes library.
#[derive(Debug, Error)]
pub enum DiarioError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Could not read an input file or list an input directory.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium system-wide or point --pdfium-lib at the directory holding it."
    )]
    PdfiumBindingFailed(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create an output directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not move a processed input into its archive directory.
    #[error("Failed to move '{from}' to '{to}': {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Classification errors ─────────────────────────────────────────────
    /// A lexicon file could not be loaded or its terms could not be compiled.
    #[error("Invalid lexicon: {0}")]
    InvalidLexicon(String),

    // ── Portal errors ─────────────────────────────────────────────────────
    /// The gazette portal could not be reached or answered with an error.
    #[error("Portal request to '{url}' failed: {reason}")]
    PortalRequestFailed { url: String, reason: String },

    /// The download registry could not be read or written.
    #[error("Download registry '{path}' is unusable: {reason}")]
    RegistryFailed { path: PathBuf, reason: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single block.
///
/// Stored alongside [`crate::output::BlockResult`] when a block fails.
/// Processing of the document continues with the next block.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum BlockError {
    /// The block file could not be created or written.
    #[error("Block {sequence_index}: write to '{path}' failed: {detail}")]
    WriteFailed {
        sequence_index: usize,
        path: PathBuf,
        detail: String,
    },

    /// LLM normalization failed after retries.
    #[error("Block '{name}': normalization failed after {retries} retries: {detail}")]
    NormalizeFailed {
        name: String,
        retries: u8,
        detail: String,
    },

    /// LLM normalization timed out.
    #[error("Block '{name}': normalization timed out after {secs}s")]
    Timeout { name: String, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display() {
        let e = DiarioError::NotAPdf {
            path: PathBuf::from("/tmp/x.pdf"),
            magic: *b"<htm",
        };
        assert!(e.to_string().contains("/tmp/x.pdf"));
    }

    #[test]
    fn portal_error_display() {
        let e = DiarioError::PortalRequestFailed {
            url: "https://portal.tjpr.jus.br".into(),
            reason: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("portal.tjpr.jus.br"), "got: {msg}");
        assert!(msg.contains("503"));
    }

    #[test]
    fn write_failed_display() {
        let e = BlockError::WriteFailed {
            sequence_index: 7,
            path: PathBuf::from("out/PR_2024.txt"),
            detail: "disk full".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Block 7"), "got: {msg}");
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn block_error_serialises() {
        let e = BlockError::Timeout {
            name: "PR_2024_01_10_P123_ID1_B00001".into(),
            secs: 60,
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("Timeout"));
    }
}
