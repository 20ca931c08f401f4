//! Progress-callback trait for per-document and per-block events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a batch.
//!
//! # Example
//!
//! ```rust
//! use diario_leiloes::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_block_written(&self, _seq: usize, _total: usize, _auction: bool, _path: &str) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes documents and blocks.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Normalization runs several notices at once, so
/// `on_item_*` may be called concurrently; protect shared state accordingly.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before a batch starts.
    ///
    /// # Arguments
    /// * `total_documents`: number of inputs that will be attempted
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document has been extracted and its blocks are known.
    fn on_document_start(&self, name: &str, total_blocks: usize) {
        let _ = (name, total_blocks);
    }

    /// Called after each block file is written.
    ///
    /// # Arguments
    /// * `sequence_index`: 1-based block position
    /// * `total_blocks`: blocks in the document
    /// * `auction`: whether the block was routed to the auction partition
    /// * `path`: file written
    fn on_block_written(&self, sequence_index: usize, total_blocks: usize, auction: bool, path: &str) {
        let _ = (sequence_index, total_blocks, auction, path);
    }

    /// Called when a block could not be written.
    fn on_block_error(&self, sequence_index: usize, total_blocks: usize, error: &str) {
        let _ = (sequence_index, total_blocks, error);
    }

    /// Called when a document is done, successfully or not.
    ///
    /// `error` is set when the whole document failed.
    fn on_document_complete(&self, name: &str, error: Option<&str>) {
        let _ = (name, error);
    }

    /// Called before an item (a notice to normalize, an edition to download)
    /// is started.
    fn on_item_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when an item finished; `error` is set when it failed.
    fn on_item_complete(&self, name: &str, error: Option<&str>) {
        let _ = (name, error);
    }

    /// Called once after the batch finished.
    fn on_batch_complete(&self, total_documents: usize, failed_documents: usize) {
        let _ = (total_documents, failed_documents);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        written: AtomicUsize,
        auctions: AtomicUsize,
        errors: AtomicUsize,
        documents: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_block_written(&self, _seq: usize, _total: usize, auction: bool, _path: &str) {
            self.written.fetch_add(1, Ordering::SeqCst);
            if auction {
                self.auctions.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_block_error(&self, _seq: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _name: &str, _error: Option<&str>) {
            self.documents.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start("a.pdf", 3);
        cb.on_block_written(1, 3, true, "x.txt");
        cb.on_block_error(2, 3, "disk full");
        cb.on_document_complete("a.pdf", None);
        cb.on_item_start("n");
        cb.on_item_complete("n", Some("timeout"));
        cb.on_batch_complete(2, 0);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_block_written(1, 3, true, "a.txt");
        tracker.on_block_written(2, 3, false, "b_nao_leilao.txt");
        tracker.on_block_error(3, 3, "disk full");
        tracker.on_document_complete("doc", None);

        assert_eq!(tracker.written.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.auctions.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.documents.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn PipelineProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_document_start("doc", 4);
    }
}
