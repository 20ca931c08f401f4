//! Result types returned by the pipeline entry points.
//!
//! Every type here is `Serialize` so the CLI can print a run as JSON.

use crate::error::BlockError;
use crate::pipeline::classify::Classification;
use crate::pipeline::extract::DocumentHeader;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of classifying, naming and writing one block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResult {
    /// 1-based position in the document.
    pub sequence_index: usize,
    /// Marker id, when the block came from a raw gazette.
    pub marker_id: Option<String>,
    pub classification: Classification,
    /// Path written, or None when the write failed.
    pub path: Option<PathBuf>,
    /// Set when the block could not be written.
    pub error: Option<BlockError>,
}

/// Outcome of one document (a PDF, a raw text or a summary file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub source: PathBuf,
    pub header: DocumentHeader,
    /// Full-text summary written for the document, if any.
    pub summary_path: Option<PathBuf>,
    /// Where the source was moved after processing, if it was.
    pub moved_to: Option<PathBuf>,
    pub blocks: Vec<BlockResult>,
}

impl DocumentReport {
    pub fn auction_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.error.is_none() && b.classification.label.is_auction())
            .count()
    }

    pub fn non_auction_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.error.is_none() && !b.classification.label.is_auction())
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.error.is_some()).count()
    }
}

/// Totals over a batch of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub documents: usize,
    /// Documents that could not be processed at all.
    pub failed_documents: usize,
    pub blocks: usize,
    pub auction_blocks: usize,
    pub non_auction_blocks: usize,
    pub failed_blocks: usize,
    pub total_duration_ms: u64,
}

/// Reports of every document in a batch, plus totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
    /// `(source, error message)` of documents that failed outright.
    pub failures: Vec<(PathBuf, String)>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub(crate) fn push(&mut self, report: DocumentReport) {
        self.stats.documents += 1;
        self.stats.blocks += report.blocks.len();
        self.stats.auction_blocks += report.auction_count();
        self.stats.non_auction_blocks += report.non_auction_count();
        self.stats.failed_blocks += report.failed_count();
        self.documents.push(report);
    }

    pub(crate) fn push_failure(&mut self, source: PathBuf, error: String) {
        self.stats.documents += 1;
        self.stats.failed_documents += 1;
        self.failures.push((source, error));
    }
}

/// Outcome of normalizing one auction block with the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeResult {
    pub source: PathBuf,
    /// Raw model answer, written as `<stem>_NORM.txt`.
    pub raw_path: Option<PathBuf>,
    /// Pretty JSON, written as `<stem>_NORM.json` when the answer parsed.
    pub json_path: Option<PathBuf>,
    /// Lots found in the parsed answer.
    pub lots: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u8,
    pub error: Option<BlockError>,
}

/// One auction lot as extracted by the model.
///
/// Every field is optional: the model returns `null` for what the notice
/// does not state. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionLot {
    pub numero_de_publicacao: Option<String>,
    pub data_de_publicacao: Option<String>,
    pub lote: Option<String>,
    pub id_do_edital: Option<String>,
    pub tipo_do_processo: Option<String>,
    pub tribunal_ou_local: Option<String>,
    pub tipo_do_bem: Option<String>,
    pub executado: Option<String>,
    pub numero_do_processo: Option<String>,
    pub leiloeiro: Option<String>,
    pub site_do_leiloeiro: Option<String>,
    pub taxa_de_comissao: Option<String>,
    pub data_do_1_leilao: Option<String>,
    pub hora_do_1_leilao: Option<String>,
    pub data_do_2_leilao: Option<String>,
    pub hora_do_2_leilao: Option<String>,
    pub data_demais_pracas: Option<String>,
    pub percentual_do_1_leilao: Option<String>,
    pub percentual_do_2_leilao: Option<String>,
    pub percentual_das_demais_pracas: Option<String>,
    pub descricao_dos_bens: Option<String>,
    pub descricao_secundara_dos_bens: Option<String>,
    pub valor_de_avaliacao: Option<String>,
    pub data_de_avaliacao: Option<String>,
    pub valor_atualizado: Option<String>,
    pub data_atualizado: Option<String>,
    pub divida_e_onus: Option<String>,
    pub localizacao_dos_bens: Option<String>,
    pub informacoes_adicionais: Option<String>,
}

/// The model's answer for one notice: `{"leiloes": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNotice {
    #[serde(default)]
    pub leiloes: Vec<AuctionLot>,
}
