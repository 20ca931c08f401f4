//! Gazette downloader for the court's public portal.
//!
//! ## Flow
//!
//! ```text
//! GET search page (session cookie)
//!   └─ pages 1..=max_pages ── parse_listing ──► editions
//!        └─ newest first, not in registry ──► download into the reading dir
//!             └─ registry.record + save
//! ```
//!
//! [`check_new_editions`] looks at the newest `check_limit` editions,
//! [`verify_all`] at up to `verify_limit` with concurrent downloads, and
//! [`watch`] repeats the check once a day until Ctrl-C.

pub mod listing;
pub mod registry;

pub use listing::{parse_listing, Edition};
pub use registry::{DownloadEntry, Registry};

use crate::config::{PipelineConfig, PortalConfig};
use crate::error::DiarioError;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one check or verification run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    /// Editions considered after sorting and limiting.
    pub listed: usize,
    /// Files written by this run.
    pub downloaded: Vec<PathBuf>,
    /// Editions whose file was already on disk; recorded without downloading.
    pub already_present: usize,
    /// `(edition id, reason)` for every failed download.
    pub failed: Vec<(String, String)>,
    /// Registry `last_edition` after the run.
    pub last_edition: u32,
}

/// Outcome of a single download attempt.
#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    AlreadyPresent(PathBuf),
}

/// HTTP client for the portal, holding the session cookie.
pub struct PortalClient {
    client: Client,
    config: PortalConfig,
}

impl PortalClient {
    pub fn new(config: &PortalConfig) -> Result<Self, DiarioError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DiarioError::PortalRequestFailed {
                url: config.base_url.clone(),
                reason: format!("could not build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Open a session; the portal refuses paged searches without its cookie.
    pub async fn init_session(&self) -> Result<(), DiarioError> {
        let url = self.config.search_url();
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;
        debug!("Session opened: HTTP {}", resp.status());
        Ok(())
    }

    async fn fetch_page(&self, page: usize) -> Result<String, DiarioError> {
        let url = self.config.search_url();
        let resp = self
            .client
            .get(&url)
            .query(&[(self.config.page_param.as_str(), page.to_string())])
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;
        if !resp.status().is_success() {
            return Err(DiarioError::PortalRequestFailed {
                url,
                reason: format!("HTTP {}", resp.status()),
            });
        }
        resp.text().await.map_err(|e| request_failed(&url, e))
    }

    /// Walk the listing pages and return at most `limit` editions, newest first.
    ///
    /// Stops at the first page without edition rows. A failing page is logged
    /// and skipped.
    pub async fn list_editions(&self, limit: usize) -> Result<Vec<Edition>, DiarioError> {
        self.init_session().await?;

        let mut editions: Vec<Edition> = Vec::new();
        for page in 1..=self.config.max_pages {
            match self.fetch_page(page).await {
                Ok(html) => {
                    let found = parse_listing(&html, &self.config.base_url);
                    if found.is_empty() {
                        debug!("Page {} has no editions, stopping", page);
                        break;
                    }
                    info!("Page {}: {} editions", page, found.len());
                    for e in found {
                        if !editions.iter().any(|known| known.id == e.id) {
                            editions.push(e);
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
                }
                Err(e) => {
                    warn!("Listing page {} failed: {}", page, e);
                    tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms * 2)).await;
                }
            }
        }

        editions.sort_by(|a, b| b.edition_number.cmp(&a.edition_number));
        editions.truncate(limit);
        Ok(editions)
    }

    /// Download one edition into `dir`.
    ///
    /// An existing file is left untouched. Non-200 answers and empty or broken
    /// bodies fail. The body is staged in a hidden `.part` file, so a partial
    /// PDF never appears under the edition's name.
    pub async fn download(&self, edition: &Edition, dir: &Path) -> Result<DownloadOutcome, DiarioError> {
        let target = dir.join(&edition.filename);
        if target.exists() {
            debug!("{} already present", edition.filename);
            return Ok(DownloadOutcome::AlreadyPresent(target));
        }

        let resp = self
            .client
            .get(&edition.url)
            .send()
            .await
            .map_err(|e| request_failed(&edition.url, e))?;
        if resp.status() != StatusCode::OK {
            return Err(DiarioError::PortalRequestFailed {
                url: edition.url.clone(),
                reason: format!("HTTP {}", resp.status()),
            });
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| request_failed(&edition.url, e))?;

        if bytes.is_empty() {
            return Err(DiarioError::PortalRequestFailed {
                url: edition.url.clone(),
                reason: "empty file".into(),
            });
        }

        // Only a complete body ever gets the final name.
        let write_failed = |e: std::io::Error| DiarioError::OutputWriteFailed {
            path: target.clone(),
            source: e,
        };
        let mut part = tempfile::Builder::new()
            .prefix(".")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(write_failed)?;
        part.write_all(&bytes)
            .and_then(|_| part.flush())
            .map_err(write_failed)?;
        part.persist_noclobber(&target)
            .map_err(|e| write_failed(e.error))?;

        info!("Downloaded {} ({} bytes)", edition.filename, bytes.len());
        Ok(DownloadOutcome::Downloaded(target))
    }
}

fn request_failed(url: &str, e: reqwest::Error) -> DiarioError {
    DiarioError::PortalRequestFailed {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

/// Download the newest `check_limit` editions missing from the registry.
pub async fn check_new_editions(config: &PipelineConfig) -> Result<FetchReport, DiarioError> {
    fetch(config, config.portal.check_limit, 1).await
}

/// Walk up to `verify_limit` editions and download every missing one,
/// `download_concurrency` at a time.
pub async fn verify_all(config: &PipelineConfig) -> Result<FetchReport, DiarioError> {
    fetch(
        config,
        config.portal.verify_limit,
        config.portal.download_concurrency,
    )
    .await
}

async fn fetch(
    config: &PipelineConfig,
    limit: usize,
    concurrency: usize,
) -> Result<FetchReport, DiarioError> {
    let paths = &config.paths;
    paths.ensure_all()?;
    let mut registry = Registry::load(&paths.registry_file, config.portal.last_known_edition)?;
    let client = PortalClient::new(&config.portal)?;

    let editions = client.list_editions(limit).await?;
    let mut report = FetchReport {
        listed: editions.len(),
        ..Default::default()
    };
    if let Some(newest) = editions.first() {
        registry.bump_last_edition(newest.edition_number);
    }

    let pending: Vec<Edition> = editions
        .into_iter()
        .filter(|e| !registry.contains(&e.id))
        .collect();
    info!("{} editions listed, {} to download", report.listed, pending.len());

    let cb = config.progress_callback.clone();
    if let Some(ref cb) = cb {
        cb.on_batch_start(pending.len());
    }

    let client = &client;
    let outcomes: Vec<(Edition, Result<DownloadOutcome, DiarioError>)> =
        stream::iter(pending.into_iter().map(|edition| {
            let cb = cb.clone();
            async move {
                if let Some(ref cb) = cb {
                    cb.on_item_start(&edition.filename);
                }
                let outcome = client.download(&edition, &paths.reading).await;
                if let Some(ref cb) = cb {
                    let err = outcome.as_ref().err().map(|e| e.to_string());
                    cb.on_item_complete(&edition.filename, err.as_deref());
                }
                (edition, outcome)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (edition, outcome) in outcomes {
        match outcome {
            Ok(DownloadOutcome::Downloaded(path)) => {
                registry.record(&edition);
                report.downloaded.push(path);
            }
            Ok(DownloadOutcome::AlreadyPresent(_)) => {
                registry.record(&edition);
                report.already_present += 1;
            }
            Err(e) => {
                warn!("{}: {}", edition.id, e);
                report.failed.push((edition.id, e.to_string()));
            }
        }
    }

    registry.touch();
    registry.save(&paths.registry_file)?;
    report.last_edition = registry.last_edition;

    if let Some(ref cb) = cb {
        cb.on_batch_complete(
            report.downloaded.len() + report.already_present + report.failed.len(),
            report.failed.len(),
        );
    }
    info!(
        "Check complete: {} downloaded, {} failed, last edition {}",
        report.downloaded.len(),
        report.failed.len(),
        report.last_edition
    );
    Ok(report)
}

/// The first `at` strictly after `now`: today if still ahead, else tomorrow.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Run a check now, then every day at `at` (local time) until Ctrl-C.
///
/// A failed check is logged and the schedule continues.
pub async fn watch(config: &PipelineConfig, at: NaiveTime) -> Result<(), DiarioError> {
    loop {
        match check_new_editions(config).await {
            Ok(report) => info!(
                "Scheduled check: {} new editions",
                report.downloaded.len()
            ),
            Err(e) => warn!("Scheduled check failed: {}", e),
        }

        let now = Local::now().naive_local();
        let next = next_run_after(now, at);
        let wait = (next - now).to_std().unwrap_or(Duration::from_secs(60));
        info!("Next check at {}", next.format("%Y-%m-%d %H:%M"));

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping the scheduler");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn next_run_later_today() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(next_run_after(at(8, 30, 0), nine), at(9, 0, 0));
    }

    #[test]
    fn next_run_rolls_to_tomorrow() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let next = next_run_after(at(9, 0, 0), nine);
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2023, 1, 11).unwrap());
        assert_eq!(next.time(), nine);
        assert_eq!(next_run_after(at(23, 59, 59), nine).date().to_string(), "2023-01-11");
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(PortalClient::new(&PortalConfig::default()).is_ok());
    }

    /// Serve one canned HTTP response on a local port; returns its base URL.
    async fn serve_once(response: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn download_writes_only_the_final_file() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\n%PDF-1.4",
        )
        .await;
        let dir = tempfile::TempDir::new().unwrap();
        let edition = Edition::new("3851", "10/01/2023", "/pdf", &base).unwrap();

        let client = PortalClient::new(&PortalConfig::default()).unwrap();
        let outcome = client.download(&edition, dir.path()).await.unwrap();
        let DownloadOutcome::Downloaded(path) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
        assert_eq!(entries(dir.path()), vec!["PR_diario_3851_10_01_2023.pdf"]);
    }

    #[tokio::test]
    async fn truncated_download_leaves_nothing_behind() {
        let base = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nConnection: close\r\n\r\n%PDF-1.4 cut",
        )
        .await;
        let dir = tempfile::TempDir::new().unwrap();
        let edition = Edition::new("3851", "10/01/2023", "/pdf", &base).unwrap();

        let client = PortalClient::new(&PortalConfig::default()).unwrap();
        assert!(client.download(&edition, dir.path()).await.is_err());
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn server_error_leaves_nothing_behind() {
        let base = serve_once(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\nfail",
        )
        .await;
        let dir = tempfile::TempDir::new().unwrap();
        let edition = Edition::new("3851", "10/01/2023", "/pdf", &base).unwrap();

        let client = PortalClient::new(&PortalConfig::default()).unwrap();
        let err = client.download(&edition, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn existing_file_is_not_downloaded_again() {
        let dir = tempfile::TempDir::new().unwrap();
        let edition = Edition::new("3851", "10/01/2023", "/nao-existe", "http://127.0.0.1:9").unwrap();
        std::fs::write(dir.path().join(&edition.filename), b"%PDF-1.4").unwrap();

        let client = PortalClient::new(&PortalConfig::default()).unwrap();
        match client.download(&edition, dir.path()).await.unwrap() {
            DownloadOutcome::AlreadyPresent(p) => assert!(p.ends_with("PR_diario_3851_10_01_2023.pdf")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
