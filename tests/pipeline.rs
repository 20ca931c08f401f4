//! Integration tests for the block pipeline.
//!
//! Everything here runs on plain text and temporary directories; no pdfium
//! library, network or API key is needed.

use chrono::NaiveDate;
use diario_leiloes::pipeline::input::move_into;
use diario_leiloes::{
    process_directory, process_path, split_directory, BlockLabel, ClassifierKind, PipelineConfig,
    PipelinePaths,
};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

const EDITION: &str = "Curitiba, 10 de janeiro de 2023 - Edição nº 123\n\
    Diário Eletrônico do Tribunal de Justiça do Paraná\n\
    Índice de Publicação\nSeção de Leilões ... 2\n\
    IDMATERIA555IDMATERIA EDITAL DE LEILÃO. O leiloeiro oficial venderá em hasta pública \
    o imóvel matrícula 1.234, avaliado em R$ 100.000,00, lance mínimo de 50%.\n- 2 -\n\
    IDMATERIA556IDMATERIA DECRETO JUDICIÁRIO Nº 9. Concede férias ao servidor.\n\
    IDMATERIA557IDMATERIA PORTARIA Nº 10. Designa comissão.";

fn config(root: &Path) -> PipelineConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    PipelineConfig::builder()
        .base_dir(root)
        .today(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap())
        .build()
        .unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn write_edition(root: &Path, name: &str) -> std::path::PathBuf {
    let path = root.join(name);
    std::fs::write(&path, EDITION).unwrap();
    path
}

#[tokio::test]
async fn edition_text_is_partitioned_by_label() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let input = write_edition(tmp.path(), "PR_diario_123_10_01_2023.txt");

    let report = process_path(&input, &config).await.unwrap();
    assert_eq!(report.blocks.len(), 3);
    assert_eq!(report.auction_count(), 1);
    assert_eq!(report.non_auction_count(), 2);
    assert_eq!(report.failed_count(), 0);

    let paths = PipelinePaths::under(tmp.path());
    assert_eq!(
        file_names(&paths.auction),
        vec!["PR_2023_01_10_P123_ID555_B00001.txt"]
    );
    assert_eq!(
        file_names(&paths.non_auction),
        vec![
            "PR_2023_01_10_P123_ID556_B00002_nao_leilao.txt",
            "PR_2023_01_10_P123_ID557_B00003_nao_leilao.txt",
        ]
    );

    let auction = std::fs::read_to_string(paths.auction.join("PR_2023_01_10_P123_ID555_B00001.txt"))
        .unwrap();
    assert!(auction.starts_with("ID: 555\nData Pub.: 10/01/2023\nNúmero Pub.: 123\nNúmero Bloco: 00001\n\n"));
    assert!(auction.contains("hasta pública"));
    assert!(!auction.contains("- 2 -"));

    let summary = paths.processed.join("PR_diario_123_10_01_2023.txt");
    assert!(summary.is_file());
}

#[tokio::test]
async fn reprocessing_never_overwrites_across_partitions() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let input = write_edition(tmp.path(), "edicao.txt");

    process_path(&input, &config).await.unwrap();
    let second = process_path(&input, &config).await.unwrap();
    assert_eq!(second.failed_count(), 0);

    let paths = PipelinePaths::under(tmp.path());
    let mut all = file_names(&paths.auction);
    all.extend(file_names(&paths.non_auction));
    assert_eq!(all.len(), 6);

    let unique: HashSet<&String> = all.iter().collect();
    assert_eq!(unique.len(), all.len());
    assert!(all.contains(&"PR_2023_01_10_P123_ID555_B00001_1.txt".to_string()));

    // Strip the label suffix: the base names must still be distinct.
    let bases: HashSet<String> = all
        .iter()
        .map(|n| n.trim_end_matches(".txt").replace("_nao_leilao", ""))
        .collect();
    assert_eq!(bases.len(), all.len());
}

#[tokio::test]
async fn normalized_inputs_keep_their_names_taken() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let input = write_edition(tmp.path(), "edicao.txt");
    let paths = PipelinePaths::under(tmp.path());

    process_path(&input, &config).await.unwrap();
    let block = paths.auction.join("PR_2023_01_10_P123_ID555_B00001.txt");
    std::fs::write(&block, "revisado à mão").unwrap();
    let archived = move_into(&block, &paths.normalized_inputs).unwrap();
    assert_eq!(archived, paths.normalized_inputs.join("PR_2023_01_10_P123_ID555_B00001.txt"));

    let second = process_path(&input, &config).await.unwrap();
    assert_eq!(second.failed_count(), 0);
    assert_eq!(
        file_names(&paths.auction),
        vec!["PR_2023_01_10_P123_ID555_B00001_1.txt"]
    );

    // Archiving the new block again lands next to the first, not over it.
    let again = move_into(
        &paths.auction.join("PR_2023_01_10_P123_ID555_B00001_1.txt"),
        &paths.normalized_inputs,
    )
    .unwrap();
    assert_ne!(again, archived);
    assert_eq!(std::fs::read_to_string(&archived).unwrap(), "revisado à mão");
    assert_eq!(file_names(&paths.normalized_inputs).len(), 2);
}

#[tokio::test]
async fn keyword_classifier_is_selectable() {
    let tmp = TempDir::new().unwrap();
    let config = PipelineConfig::builder()
        .base_dir(tmp.path())
        .classifier(ClassifierKind::Keyword)
        .build()
        .unwrap();
    let input = write_edition(tmp.path(), "edicao.txt");

    let report = process_path(&input, &config).await.unwrap();
    let labels: Vec<BlockLabel> = report.blocks.iter().map(|b| b.classification.label).collect();
    assert_eq!(
        labels,
        vec![BlockLabel::Auction, BlockLabel::NonAuction, BlockLabel::NonAuction]
    );
}

#[tokio::test]
async fn split_mode_falls_back_to_position() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let paths = PipelinePaths::under(tmp.path());
    paths.ensure_all().unwrap();

    let summary = "Data de Publicação: não encontrado\n\
        ************************************************************\n\
        EDITAL DE LEILÃO. O leiloeiro oficial venderá em hasta pública o veículo penhorado.\n\
        ************************************************************\n\
        \n\
        ************************************************************\n\
        Intimação das partes para manifestação.\n";
    std::fs::write(paths.processed.join("antigo.txt"), summary).unwrap();

    let batch = split_directory(None, &config).await.unwrap();
    assert_eq!(batch.stats.documents, 1);
    assert_eq!(batch.stats.blocks, 2);

    assert_eq!(
        file_names(&paths.auction),
        vec!["PR_2026_10_17_P0000_ID000001_B00001.txt"]
    );
    assert_eq!(
        file_names(&paths.non_auction),
        vec!["PR_2026_10_17_P0000_ID000002_B00002_nao_leilao.txt"]
    );
}

#[tokio::test]
async fn unreadable_pdf_does_not_stop_the_batch() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let paths = PipelinePaths::under(tmp.path());
    paths.ensure_all().unwrap();

    let fake = paths.reading.join("falso.pdf");
    std::fs::write(&fake, b"<html>not a pdf</html>").unwrap();
    std::fs::write(paths.reading.join("notas.txt"), "ignored").unwrap();

    let batch = process_directory(&config).await.unwrap();
    assert_eq!(batch.stats.documents, 1);
    assert_eq!(batch.stats.failed_documents, 1);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].0, fake);
    assert!(fake.exists());
}
