//! Gazette processing entry points: documents in, partitioned block files out.
//!
//! A document is fully extracted, classified, named and written before the
//! next one starts, and its blocks are written in `sequence_index` order.
//! Only PDF text extraction is async (it runs on the blocking pool); the rest
//! is plain synchronous work behind the async signatures.
//!
//! Failures are isolated at two levels. A block that cannot be written is
//! recorded in its [`BlockResult`] and the document continues. A document
//! that cannot be read at all is recorded in the [`BatchReport`] and the
//! batch continues.

use crate::config::PipelineConfig;
use crate::error::{BlockError, DiarioError};
use crate::output::{BatchReport, BlockResult, DocumentReport};
use crate::pipeline::classify::{build_strategy, Classification, ClassificationStrategy};
use crate::pipeline::extract::{self, DocumentHeader, ExtractedDocument};
use crate::pipeline::header::HeaderMatchers;
use crate::pipeline::naming::{BlockIdentity, BlockWriter};
use crate::pipeline::{input, text};
use crate::progress::ProgressCallback;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A configured classifier, header reader and writer, reusable across documents.
///
/// Sharing one `Pipeline` across a batch shares one [`BlockWriter`], so name
/// allocation is serialised for the whole batch.
pub struct Pipeline {
    config: PipelineConfig,
    strategy: Box<dyn ClassificationStrategy>,
    matchers: HeaderMatchers,
    writer: BlockWriter,
    today: NaiveDate,
}

impl Pipeline {
    /// Build the pipeline and create its output directories.
    pub fn new(config: &PipelineConfig) -> Result<Self, DiarioError> {
        config.paths.ensure_all()?;
        let strategy = build_strategy(config.classifier, &config.lexicon)?;
        debug!("Classifier: {}", strategy.name());
        Ok(Self {
            strategy,
            matchers: HeaderMatchers::gazette(config.header_window_lines),
            writer: BlockWriter::new(&config.paths.auction, &config.paths.non_auction)
                .with_archive(&config.paths.normalized_inputs),
            today: config.today(),
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn progress(&self) -> Option<&ProgressCallback> {
        self.config.progress_callback.as_ref()
    }

    /// Classify a block's text with the configured strategy.
    pub fn classify(&self, text: &str) -> Classification {
        self.strategy.classify(text)
    }

    /// Classify, name and write one rendered block.
    ///
    /// `text` is the block as stored: header lines followed by the body.
    pub fn write_block(
        &self,
        text: &str,
        sequence_index: usize,
        total_blocks: usize,
        marker_id: Option<String>,
    ) -> BlockResult {
        let classification = self.classify(text);
        let header = self.matchers.extract(text, sequence_index, self.today);
        let identity = BlockIdentity::from_header(&self.config.jurisdiction, &header);

        match self.writer.write(&identity, classification.label, text) {
            Ok(path) => {
                debug!(
                    "Block {} ({}, score {:.1}) → {}",
                    sequence_index,
                    classification.label,
                    classification.score,
                    path.display()
                );
                if let Some(cb) = self.progress() {
                    cb.on_block_written(
                        sequence_index,
                        total_blocks,
                        classification.label.is_auction(),
                        &path.display().to_string(),
                    );
                }
                BlockResult {
                    sequence_index,
                    marker_id,
                    classification,
                    path: Some(path),
                    error: None,
                }
            }
            Err(e) => {
                let error = BlockError::WriteFailed {
                    sequence_index,
                    path: self
                        .writer
                        .dir_for(classification.label)
                        .join(identity.base_name()),
                    detail: e.to_string(),
                };
                warn!("{}", error);
                if let Some(cb) = self.progress() {
                    cb.on_block_error(sequence_index, total_blocks, &error.to_string());
                }
                BlockResult {
                    sequence_index,
                    marker_id,
                    classification,
                    path: None,
                    error: Some(error),
                }
            }
        }
    }

    /// Write every block of an extracted document.
    fn write_document(&self, doc: &ExtractedDocument) -> Vec<BlockResult> {
        let total = doc.blocks.len();
        doc.blocks
            .iter()
            .map(|block| {
                let rendered = extract::render_block(block, &doc.header);
                self.write_block(
                    &rendered,
                    block.sequence_index,
                    total,
                    Some(block.marker_id.clone()),
                )
            })
            .collect()
    }

    /// Process raw gazette text: extract, write summary and blocks.
    ///
    /// `source` names the document; its stem names the summary file written
    /// into the processed directory.
    pub fn process_text(&self, source: &Path, raw: &str) -> Result<DocumentReport, DiarioError> {
        let doc = extract::extract_document(raw);
        let name = display_name(source);
        info!(
            "{}: {} blocks, date {}, edition {}",
            name,
            doc.blocks.len(),
            doc.header.date_or_sentinel(),
            doc.header.number_or_sentinel()
        );
        if let Some(cb) = self.progress() {
            cb.on_document_start(&name, doc.blocks.len());
        }

        let summary_path = self.write_summary(source, &doc)?;
        let blocks = self.write_document(&doc);

        Ok(DocumentReport {
            source: source.to_path_buf(),
            header: doc.header,
            summary_path: Some(summary_path),
            moved_to: None,
            blocks,
        })
    }

    /// Write the full-text summary `<stem>.txt` into the processed directory.
    fn write_summary(&self, source: &Path, doc: &ExtractedDocument) -> Result<PathBuf, DiarioError> {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "documento".to_string());
        let path = self.config.paths.processed.join(format!("{stem}.txt"));
        write_atomic(&path, &extract::render_full_text(doc))?;
        debug!("Summary written: {}", path.display());
        Ok(path)
    }

    /// Extract a PDF, write its summary and blocks, then archive it.
    ///
    /// A PDF whose text cannot be extracted yields a report with zero blocks
    /// and stays where it is, so a later run can retry it.
    pub async fn process_pdf(&self, pdf: &Path) -> Result<DocumentReport, DiarioError> {
        let pdf = input::resolve_pdf(pdf)?;
        let raw = text::extract_text(
            &pdf,
            self.config.pdfium_lib_dir.as_deref(),
            self.config.columns,
        )
        .await;

        if raw.trim().is_empty() {
            warn!("{}: no text extracted, leaving it in place", pdf.display());
            return Ok(DocumentReport {
                source: pdf,
                header: DocumentHeader::default(),
                summary_path: None,
                moved_to: None,
                blocks: Vec::new(),
            });
        }

        let mut report = self.process_text(&pdf, &raw)?;
        if self.config.move_processed {
            report.moved_to = Some(input::move_into(&pdf, &self.config.paths.processed)?);
        }
        Ok(report)
    }

    /// Re-split a full-text summary file and write each block.
    pub fn split_file(&self, summary: &Path) -> Result<DocumentReport, DiarioError> {
        let content = input::read_text(summary)?;
        let parts = extract::split_full_text(&content);
        let name = display_name(summary);
        info!("{}: {} blocks", name, parts.len());
        if let Some(cb) = self.progress() {
            cb.on_document_start(&name, parts.len());
        }

        let total = parts.len();
        let blocks = parts
            .iter()
            .enumerate()
            .map(|(i, part)| self.write_block(part, i + 1, total, None))
            .collect();

        Ok(DocumentReport {
            source: summary.to_path_buf(),
            header: extract::extract_header(&content),
            summary_path: None,
            moved_to: None,
            blocks,
        })
    }

    /// Run `f` over `inputs`, isolating per-document failures.
    async fn run_batch<'a, F, Fut>(&'a self, inputs: Vec<PathBuf>, f: F) -> BatchReport
    where
        F: Fn(&'a Self, PathBuf) -> Fut,
        Fut: std::future::Future<Output = Result<DocumentReport, DiarioError>> + 'a,
    {
        let start = Instant::now();
        let mut batch = BatchReport::default();
        if let Some(cb) = self.progress() {
            cb.on_batch_start(inputs.len());
        }

        for path in inputs {
            let name = display_name(&path);
            match f(self, path.clone()).await {
                Ok(report) => {
                    if let Some(cb) = self.progress() {
                        cb.on_document_complete(&name, None);
                    }
                    batch.push(report);
                }
                Err(e) => {
                    warn!("{}: {}", name, e);
                    if let Some(cb) = self.progress() {
                        cb.on_document_complete(&name, Some(&e.to_string()));
                    }
                    batch.push_failure(path, e.to_string());
                }
            }
        }

        batch.stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch complete: {} documents ({} failed), {} blocks ({} auction, {} other)",
            batch.stats.documents,
            batch.stats.failed_documents,
            batch.stats.blocks,
            batch.stats.auction_blocks,
            batch.stats.non_auction_blocks
        );
        if let Some(cb) = self.progress() {
            cb.on_batch_complete(batch.stats.documents, batch.stats.failed_documents);
        }
        batch
    }

    /// Process every PDF in the reading directory.
    pub async fn process_directory(&self) -> Result<BatchReport, DiarioError> {
        let pdfs = input::list_files(&self.config.paths.reading, "pdf")?;
        info!(
            "{} PDFs in {}",
            pdfs.len(),
            self.config.paths.reading.display()
        );
        Ok(self
            .run_batch(pdfs, |p, path| async move { p.process_pdf(&path).await })
            .await)
    }

    /// Re-split every summary file in `dir` (default: the processed directory).
    pub async fn split_directory(&self, dir: Option<&Path>) -> Result<BatchReport, DiarioError> {
        let dir = dir.unwrap_or(&self.config.paths.processed);
        let files = input::list_files(dir, "txt")?;
        Ok(self
            .run_batch(files, |p, path| async move { p.split_file(&path) })
            .await)
    }
}

/// Process one input: a PDF, or a text file holding raw extracted gazette text.
pub async fn process_path(path: &Path, config: &PipelineConfig) -> Result<DocumentReport, DiarioError> {
    let pipeline = Pipeline::new(config)?;
    if is_pdf(path) {
        pipeline.process_pdf(path).await
    } else {
        let raw = input::read_text(path)?;
        pipeline.process_text(path, &raw)
    }
}

/// Process every PDF in the configured reading directory.
pub async fn process_directory(config: &PipelineConfig) -> Result<BatchReport, DiarioError> {
    Pipeline::new(config)?.process_directory().await
}

/// Re-split one full-text summary file.
pub fn split_file(path: &Path, config: &PipelineConfig) -> Result<DocumentReport, DiarioError> {
    Pipeline::new(config)?.split_file(path)
}

/// Re-split every summary file in `dir` (default: the processed directory).
pub async fn split_directory(
    dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<BatchReport, DiarioError> {
    Pipeline::new(config)?.split_directory(dir).await
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write to a temp file next to `path`, then rename over it.
fn write_atomic(path: &Path, content: &str) -> Result<(), DiarioError> {
    let tmp = path.with_extension("txt.tmp");
    std::fs::write(&tmp, content).map_err(|e| DiarioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| DiarioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::BlockLabel;

    const RAW: &str = "Curitiba, 10 de janeiro de 2023 - Edição nº 123\n\
        Diário Eletrônico do Tribunal de Justiça\n\
        Índice de Publicação\nSeção de Leilões ... 2\n\
        IDMATERIA555IDMATERIA EDITAL DE LEILÃO. O leiloeiro oficial venderá em hasta pública \
        o imóvel avaliado em R$ 100.000,00.\n- 2 -\n\
        IDMATERIA556IDMATERIA DECRETO JUDICIÁRIO Nº 9. Concede férias ao servidor.";

    fn pipeline(root: &Path) -> Pipeline {
        let config = PipelineConfig::builder()
            .base_dir(root)
            .today(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap())
            .build()
            .unwrap();
        Pipeline::new(&config).unwrap()
    }

    #[test]
    fn process_text_writes_summary_and_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let report = p.process_text(Path::new("diario_123.pdf"), RAW).unwrap();

        assert_eq!(report.blocks.len(), 2);
        assert_eq!(report.blocks[0].classification.label, BlockLabel::Auction);
        assert_eq!(report.blocks[1].classification.label, BlockLabel::NonAuction);

        let auction = report.blocks[0].path.as_ref().unwrap();
        assert!(auction.ends_with("PR_2023_01_10_P123_ID555_B00001.txt"));
        let other = report.blocks[1].path.as_ref().unwrap();
        assert!(other.ends_with("PR_2023_01_10_P123_ID556_B00002_nao_leilao.txt"));

        let summary = report.summary_path.unwrap();
        assert!(summary.ends_with("diario_123.txt"));
        let text = std::fs::read_to_string(summary).unwrap();
        assert!(text.starts_with("Data de Publicação: 10/01/2023\nNúmero da Publicação: 123\n"));
    }

    #[test]
    fn split_file_round_trips_summary() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let first = p.process_text(Path::new("d.pdf"), RAW).unwrap();
        let summary = first.summary_path.unwrap();

        let again = p.split_file(&summary).unwrap();
        assert_eq!(again.blocks.len(), 2);
        // Same identities again: both land on suffixed names.
        let auction = again.blocks[0].path.as_ref().unwrap();
        assert!(auction.ends_with("PR_2023_01_10_P123_ID555_B00001_1.txt"));
    }

    #[test]
    fn empty_text_yields_no_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let report = p.process_text(Path::new("vazio.pdf"), "").unwrap();
        assert!(report.blocks.is_empty());
        assert_eq!(report.header, DocumentHeader::default());
    }

    #[tokio::test]
    async fn bad_pdf_is_isolated_in_batch() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        std::fs::write(p.config().paths.reading.join("erro.pdf"), "<html>").unwrap();

        let batch = p.process_directory().await.unwrap();
        assert_eq!(batch.stats.documents, 1);
        assert_eq!(batch.stats.failed_documents, 1);
        assert_eq!(batch.failures.len(), 1);
    }
}
