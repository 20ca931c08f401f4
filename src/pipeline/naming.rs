//! Block identity and collision-free block files.
//!
//! A block is named `<J>_<YYYY>_<MM>_<DD>_P<pub>_ID<id>_B<block>` where a
//! missing publication number renders as `P0000`. Auction blocks are written
//! as `<name>.txt` into the auction directory; everything else as
//! `<name>_nao_leilao.txt` into the non-auction directory.
//!
//! A name is taken when *either* partition already holds it, so the same
//! identity can never appear twice across the two directories. Taken names
//! get `_1`, `_2`, … appended to the base until a free one is found. The
//! check and the `create_new` open happen under the writer's lock; nothing is
//! ever overwritten.

use crate::pipeline::classify::BlockLabel;
use crate::pipeline::extract::PublicationDate;
use crate::pipeline::header::HeaderFields;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Filename suffix of non-auction blocks, before `.txt`.
pub const NON_AUCTION_SUFFIX: &str = "_nao_leilao";

/// Everything a block filename is made of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIdentity {
    pub jurisdiction: String,
    pub date: PublicationDate,
    pub publication_number: Option<String>,
    pub document_id: String,
    pub block_number: String,
}

impl BlockIdentity {
    pub fn from_header(jurisdiction: &str, header: &HeaderFields) -> Self {
        Self {
            jurisdiction: jurisdiction.to_string(),
            date: header.date,
            publication_number: header.publication_number.clone(),
            document_id: header.document_id.clone(),
            block_number: header.block_number.clone(),
        }
    }

    /// The canonical base name, without suffix or extension.
    pub fn base_name(&self) -> String {
        let publication = match self.publication_number.as_deref() {
            Some(p) if !p.is_empty() => format!("P{p}"),
            _ => "P0000".to_string(),
        };
        format!(
            "{}_{:04}_{:02}_{:02}_{}_ID{}_B{}",
            self.jurisdiction,
            self.date.year,
            self.date.month,
            self.date.day,
            publication,
            self.document_id,
            self.block_number
        )
    }
}

/// Filename for `base` in the partition `label` routes to.
pub fn file_name(base: &str, label: BlockLabel) -> String {
    match label {
        BlockLabel::Auction => format!("{base}.txt"),
        BlockLabel::NonAuction => format!("{base}{NON_AUCTION_SUFFIX}.txt"),
    }
}

/// Writes block files into the two partitions without ever reusing a name.
#[derive(Debug)]
pub struct BlockWriter {
    auction_dir: PathBuf,
    non_auction_dir: PathBuf,
    /// Directories auction blocks are moved to later; names there stay taken.
    archive_dirs: Vec<PathBuf>,
    lock: Mutex<()>,
}

impl BlockWriter {
    pub fn new(auction_dir: impl Into<PathBuf>, non_auction_dir: impl Into<PathBuf>) -> Self {
        Self {
            auction_dir: auction_dir.into(),
            non_auction_dir: non_auction_dir.into(),
            archive_dirs: Vec::new(),
            lock: Mutex::new(()),
        }
    }

    /// Keep every auction-block name found in `dir` reserved.
    pub fn with_archive(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dirs.push(dir.into());
        self
    }

    /// Directory a label routes to.
    pub fn dir_for(&self, label: BlockLabel) -> &Path {
        match label {
            BlockLabel::Auction => &self.auction_dir,
            BlockLabel::NonAuction => &self.non_auction_dir,
        }
    }

    /// True when neither partition nor any archive holds `base`.
    fn is_free(&self, base: &str) -> bool {
        let auction_name = file_name(base, BlockLabel::Auction);
        !self.auction_dir.join(&auction_name).exists()
            && !self
                .non_auction_dir
                .join(file_name(base, BlockLabel::NonAuction))
                .exists()
            && !self
                .archive_dirs
                .iter()
                .any(|dir| dir.join(&auction_name).exists())
    }

    /// Write `content` under the first free variant of the identity's name.
    ///
    /// Returns the path actually written.
    pub fn write(
        &self,
        identity: &BlockIdentity,
        label: BlockLabel,
        content: &str,
    ) -> io::Result<PathBuf> {
        let base = identity.base_name();
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut attempt: usize = 0;
        loop {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}_{attempt}")
            };
            attempt += 1;

            if !self.is_free(&candidate) {
                continue;
            }

            let path = self.dir_for(label).join(file_name(&candidate, label));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    write_or_discard(&path, file, content.as_bytes())?;
                    if attempt > 1 {
                        debug!("Name {} taken, wrote {}", base, path.display());
                    }
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Fill a freshly created file; on failure remove it so the name is free again.
fn write_or_discard<W: Write>(path: &Path, mut file: W, content: &[u8]) -> io::Result<()> {
    if let Err(e) = file.write_all(content).and_then(|_| file.flush()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn identity(publication: Option<&str>) -> BlockIdentity {
        BlockIdentity {
            jurisdiction: "PR".into(),
            date: PublicationDate {
                day: 10,
                month: 1,
                year: 2023,
            },
            publication_number: publication.map(str::to_string),
            document_id: "555".into(),
            block_number: "00002".into(),
        }
    }

    fn writer(root: &Path) -> BlockWriter {
        let a = root.join("leilao");
        let n = root.join("nao");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&n).unwrap();
        BlockWriter::new(a, n)
    }

    #[test]
    fn base_name_layout() {
        assert_eq!(
            identity(Some("123")).base_name(),
            "PR_2023_01_10_P123_ID555_B00002"
        );
        assert_eq!(identity(None).base_name(), "PR_2023_01_10_P0000_ID555_B00002");
        assert_eq!(
            identity(Some("")).base_name(),
            "PR_2023_01_10_P0000_ID555_B00002"
        );
    }

    #[test]
    fn non_auction_suffix() {
        assert_eq!(file_name("X", BlockLabel::Auction), "X.txt");
        assert_eq!(file_name("X", BlockLabel::NonAuction), "X_nao_leilao.txt");
    }

    #[test]
    fn routes_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        let p = w.write(&identity(Some("1")), BlockLabel::NonAuction, "x").unwrap();
        assert!(p.starts_with(dir.path().join("nao")));
        assert!(p.to_string_lossy().ends_with("_nao_leilao.txt"));
    }

    #[test]
    fn same_partition_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        let id = identity(Some("123"));
        let first = w.write(&id, BlockLabel::Auction, "um").unwrap();
        let second = w.write(&id, BlockLabel::Auction, "dois").unwrap();
        assert!(first.ends_with("PR_2023_01_10_P123_ID555_B00002.txt"));
        assert!(second.ends_with("PR_2023_01_10_P123_ID555_B00002_1.txt"));
        assert_eq!(std::fs::read_to_string(first).unwrap(), "um");
    }

    #[test]
    fn collision_is_checked_across_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        let id = identity(Some("123"));
        w.write(&id, BlockLabel::Auction, "leilão").unwrap();
        let p = w.write(&id, BlockLabel::NonAuction, "outro").unwrap();
        assert!(p.ends_with("PR_2023_01_10_P123_ID555_B00002_1_nao_leilao.txt"));

        let p = w.write(&id, BlockLabel::Auction, "mais um").unwrap();
        assert!(p.ends_with("PR_2023_01_10_P123_ID555_B00002_2.txt"));
    }

    #[test]
    fn archived_names_stay_taken() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("normalizados");
        std::fs::create_dir_all(&archive).unwrap();
        let w = writer(dir.path()).with_archive(&archive);
        let id = identity(Some("123"));

        let first = w.write(&id, BlockLabel::Auction, "primeiro").unwrap();
        let archived = archive.join(first.file_name().unwrap());
        std::fs::rename(&first, &archived).unwrap();

        let second = w.write(&id, BlockLabel::Auction, "segundo").unwrap();
        assert!(second.ends_with("PR_2023_01_10_P123_ID555_B00002_1.txt"));
        assert!(!first.exists());
        assert_eq!(std::fs::read_to_string(archived).unwrap(), "primeiro");
    }

    struct BrokenDisk;

    impl Write for BrokenDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_releases_the_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PR_2023_01_10_P123_ID555_B00002.txt");
        std::fs::File::create(&path).unwrap();

        let err = write_or_discard(&path, BrokenDisk, b"conteudo").unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());
    }

    #[test]
    fn concurrent_writers_never_share_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let w = Arc::new(writer(dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let w = Arc::clone(&w);
                std::thread::spawn(move || {
                    let label = if i % 2 == 0 {
                        BlockLabel::Auction
                    } else {
                        BlockLabel::NonAuction
                    };
                    w.write(&identity(Some("7")), label, &i.to_string()).unwrap()
                })
            })
            .collect();
        let mut names: Vec<String> = handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .replace("_nao_leilao", "")
            })
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
    }
}
