//! Durable history of every listing ever ingested.
//!
//! The store is a CSV file with a fixed column order, readable by
//! spreadsheets and other CSV tooling. Rows are never edited or
//! removed by ingestion except when `MergePolicy::LastWriterWins` replaces
//! a row with the same logical key.

pub mod errors;
pub mod lock;

pub use errors::StoreError;
pub use lock::StoreLock;

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::entities::{ListingRecord, LogicalKey};

/// Column order of the persisted file.
pub const COLUMNS: [&str; 8] = [
    "date",
    "channel",
    "list_name",
    "rank",
    "title",
    "author",
    "isbn",
    "url",
];

/// What to do when an incoming record's logical key is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Keep the stored row; the incoming one is dropped.
    #[default]
    FirstWriterWins,
    /// Replace the stored row, e.g. after a retailer corrected a listing.
    LastWriterWins,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "first-writer-wins" => Ok(Self::FirstWriterWins),
            "last" | "last-writer-wins" => Ok(Self::LastWriterWins),
            other => Err(format!("expected 'first' or 'last', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Records whose key was new to the store.
    pub inserted: usize,
    /// Stored rows overwritten (last-writer-wins only).
    pub replaced: usize,
    /// Records dropped because their key was already present.
    pub skipped: usize,
    /// Records violating `rank >= 1` or a non-empty title.
    pub rejected: usize,
    /// Rows in the store after the merge.
    pub total: usize,
}

/// CSV-backed record store. Cheap to clone; holds only the path and policy.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    policy: MergePolicy,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, policy: MergePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Every stored record in file order. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<ListingRecord>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut records = Vec::new();
        for row in reader.deserialize::<ListingRecord>() {
            let record = row.map_err(StoreError::corrupt)?;
            if record.rank == 0 || record.title.trim().is_empty() {
                return Err(StoreError::Corrupt {
                    line: records.len() as u64 + 2,
                    reason: format!(
                        "rank must be >= 1 and title non-empty (rank {}, title {:?})",
                        record.rank, record.title
                    ),
                });
            }
            records.push(record);
        }

        Ok(records)
    }

    /// Merge `incoming` into the store under an exclusive lock.
    ///
    /// Either the whole new state is written (temp file, fsync, rename) or the
    /// file is left untouched. Within one batch the first record for a key
    /// wins; against stored rows the configured `MergePolicy` decides.
    #[instrument(skip_all, fields(path = %self.path.display(), incoming = incoming.len()))]
    pub fn merge(&self, incoming: &[ListingRecord]) -> Result<MergeReport, StoreError> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)?;
        let _lock = StoreLock::acquire(&self.path)?;

        let mut records = self.load()?;
        let mut index: HashMap<LogicalKey, usize> = records
            .iter()
            .enumerate()
            .map(|(pos, record)| (record.key(), pos))
            .collect();
        let mut seen_in_batch: HashSet<LogicalKey> = HashSet::new();
        let mut report = MergeReport::default();

        for record in incoming {
            if record.rank == 0 || record.title.trim().is_empty() {
                warn!(
                    "Rejecting invalid record {}:{} rank {} title {:?}",
                    record.channel, record.list_name, record.rank, record.title
                );
                report.rejected += 1;
                continue;
            }

            let key = record.key();
            if !seen_in_batch.insert(key.clone()) {
                report.skipped += 1;
                continue;
            }

            match (index.get(&key), self.policy) {
                (None, _) => {
                    index.insert(key, records.len());
                    records.push(record.clone());
                    report.inserted += 1;
                }
                (Some(&pos), MergePolicy::LastWriterWins) if records[pos] != *record => {
                    records[pos] = record.clone();
                    report.replaced += 1;
                }
                (Some(_), _) => report.skipped += 1,
            }
        }
        report.total = records.len();

        if report.inserted == 0 && report.replaced == 0 {
            debug!("Nothing new to persist");
            return Ok(report);
        }

        self.write_atomically(&dir, &records)?;
        info!(
            "Merged into store: {} inserted, {} replaced, {} skipped, {} total",
            report.inserted, report.replaced, report.skipped, report.total
        );
        Ok(report)
    }

    /// `load` on the blocking pool.
    pub async fn load_async(&self) -> Result<Vec<ListingRecord>, StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// `merge` on the blocking pool.
    pub async fn merge_async(&self, incoming: Vec<ListingRecord>) -> Result<MergeReport, StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.merge(&incoming))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn write_atomically(&self, dir: &Path, records: &[ListingRecord]) -> Result<(), StoreError> {
        // Same directory as the target so the final rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(BufWriter::new(tmp.as_file_mut()));
            writer.write_record(COLUMNS)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        sync_dir(dir)?;
        Ok(())
    }
}

/// Flushes the directory entry so the rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Channel;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn record(date: &str, list: &str, rank: u32, title: &str) -> ListingRecord {
        ListingRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            channel: Channel::BooksComTw,
            list_name: list.to_string(),
            rank,
            title: title.to_string(),
            author: None,
            isbn: None,
            url: None,
        }
    }

    fn store_in(dir: &TempDir, policy: MergePolicy) -> RecordStore {
        RecordStore::new(dir.path().join("data").join("bestsellers.csv"), policy)
    }

    #[test]
    fn test_merge_into_empty_store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, MergePolicy::FirstWriterWins);
        let batch = vec![record("2024-01-01", "art_design", 1, "Foo")];

        let first = store.merge(&batch).unwrap();
        assert_eq!(first.inserted, 1);
        let after_once = store.load().unwrap();
        assert_eq!(after_once, batch);

        let second = store.merge(&batch).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(store.load().unwrap(), after_once);
    }

    #[test]
    fn test_replace_leaves_only_store_and_lock_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, MergePolicy::FirstWriterWins);
        store
            .merge(&[record("2024-01-01", "art_design", 1, "Foo")])
            .unwrap();
        store
            .merge(&[record("2024-01-02", "art_design", 1, "Bar")])
            .unwrap();

        let data_dir = dir.path().join("data");
        assert!(sync_dir(&data_dir).is_ok());
        let mut names: Vec<_> = fs::read_dir(&data_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["bestsellers.csv", "bestsellers.csv.lock"]);
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_first_writer_wins_keeps_stored_title() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, MergePolicy::FirstWriterWins);
        store
            .merge(&[record("2024-01-01", "art_design", 1, "Foo")])
            .unwrap();

        let report = store
            .merge(&[record("2024-01-01", "art_design", 1, "Bar")])
            .unwrap();

        assert_eq!(report.inserted, 0);
        let stored = store.load().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Foo");
    }

    #[test]
    fn test_last_writer_wins_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, MergePolicy::LastWriterWins);
        store
            .merge(&[
                record("2024-01-01", "art_design", 1, "Foo"),
                record("2024-01-01", "art_design", 2, "Baz"),
            ])
            .unwrap();

        let report = store
            .merge(&[record("2024-01-01", "art_design", 1, "Bar")])
            .unwrap();

        assert_eq!((report.inserted, report.replaced), (0, 1));
        let titles: Vec<_> = store.load().unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["Bar", "Baz"]);
    }

    #[test]
    fn test_colliding_keys_within_one_batch_keep_the_first() {
        let dir = tempfile::tempdir().unwrap();
        for policy in [MergePolicy::FirstWriterWins, MergePolicy::LastWriterWins] {
            let store = RecordStore::new(dir.path().join(format!("{policy:?}.csv")), policy);

            let report = store
                .merge(&[
                    record("2024-01-01", "art_design", 1, "Foo"),
                    record("2024-01-01", "art_design", 1, "Bar"),
                ])
                .unwrap();

            assert_eq!((report.inserted, report.skipped), (1, 1));
            assert_eq!(store.load().unwrap()[0].title, "Foo");
        }
    }

    #[test]
    fn test_keys_are_unique_after_mixed_merges() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, MergePolicy::FirstWriterWins);
        store
            .merge(&[
                record("2024-01-01", "art_design", 1, "A"),
                record("2024-01-01", "humanities", 1, "B"),
            ])
            .unwrap();
        store
            .merge(&[
                record("2024-01-01", "art_design", 1, "A2"),
                record("2024-01-02", "art_design", 1, "A"),
                record("2024-01-01", "art_design", 2, "C"),
            ])
            .unwrap();

        let stored = store.load().unwrap();
        let keys: HashSet<_> = stored.iter().map(ListingRecord::key).collect();
        assert_eq!(keys.len(), stored.len());
        assert_eq!(stored.len(), 4);
    }

    #[test]
    fn test_invalid_records_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, MergePolicy::FirstWriterWins);

        let report = store
            .merge(&[
                record("2024-01-01", "art_design", 0, "Zero"),
                record("2024-01-01", "art_design", 1, "   "),
            ])
            .unwrap();

        assert_eq!(report.rejected, 2);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_layout_and_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, MergePolicy::FirstWriterWins);
        let mut full = record("2024-01-01", "art_design", 1, "Foo, Vol. 2");
        full.author = Some("Ann".to_string());
        full.url = Some("https://www.books.com.tw/products/1".to_string());
        store.merge(&[full.clone()]).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("date,channel,list_name,rank,title,author,isbn,url")
        );
        assert_eq!(
            lines.next(),
            Some(
                "2024-01-01,books_com_tw,art_design,1,\"Foo, Vol. 2\",Ann,,https://www.books.com.tw/products/1"
            )
        );

        let loaded = store.load().unwrap();
        assert_eq!(loaded, vec![full]);
        assert_eq!(loaded[0].isbn, None);
    }

    #[test]
    fn test_reads_rows_written_by_other_tools() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bestsellers.csv");
        fs::write(
            &path,
            "date,channel,list_name,rank,title,author,isbn,url\n\
             2024-01-01,eslite,humanities,3,小王子,,,\n",
        )
        .unwrap();

        let loaded = RecordStore::new(&path, MergePolicy::FirstWriterWins)
            .load()
            .unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].channel, Channel::Eslite);
        assert_eq!(loaded[0].rank, 3);
        assert_eq!(loaded[0].author, None);
    }

    #[test]
    fn test_corrupt_store_fails_merge_and_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bestsellers.csv");
        let before = "date,channel,list_name,rank,title,author,isbn,url\n\
                        not-a-date,eslite,humanities,3,X,,,\n";
        fs::write(&path, before).unwrap();
        let store = RecordStore::new(&path, MergePolicy::FirstWriterWins);

        let err = store
            .merge(&[record("2024-01-01", "art_design", 1, "Foo")])
            .unwrap_err();

        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_unwritable_location_fails_without_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file in the way").unwrap();
        let store = RecordStore::new(blocker.join("bestsellers.csv"), MergePolicy::FirstWriterWins);

        let result = store.merge(&[record("2024-01-01", "art_design", 1, "Foo")]);

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "file in the way");
    }

    #[test]
    fn test_merge_policy_parsing() {
        assert_eq!("first".parse(), Ok(MergePolicy::FirstWriterWins));
        assert_eq!("Last-Writer-Wins".parse(), Ok(MergePolicy::LastWriterWins));
        assert!("newest".parse::<MergePolicy>().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_merges_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, MergePolicy::FirstWriterWins);

        let handles: Vec<_> = (1..=8)
            .map(|rank| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .merge_async(vec![record("2024-01-01", "art_design", rank, "T")])
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.load_async().await.unwrap().len(), 8);
    }
}
