//! Pipeline stages for turning a gazette edition into classified block files.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ extract ──▶ header ──▶ classify ──▶ naming
//! (path)   (pdfium)  (blocks)    (fields)   (label)      (files)
//!
//! auction files ──▶ llm ──▶ postprocess
//! ```
//!
//! 1. [`input`]: validate paths, list and move files between stage directories
//! 2. [`text`]: two-column text extraction; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`extract`]: document header, index, boilerplate removal and marker segmentation
//! 4. [`header`]: per-block id, date, publication number and block number
//! 5. [`classify`]: auction vs. non-auction decision
//! 6. [`naming`]: deterministic, collision-free file names across both output dirs
//! 7. [`llm`]: the only stage with network I/O, retry/backoff per notice
//! 8. [`postprocess`]: cleanup of model answers before JSON parsing

pub mod classify;
pub mod extract;
pub mod header;
pub mod input;
pub mod llm;
pub mod naming;
pub mod postprocess;
pub mod text;
