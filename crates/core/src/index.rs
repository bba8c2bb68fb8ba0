//! Metadata rows for stored files.
//!
//! Every physical file in the store is referenced by one or more [`StoredFile`] rows.
//! Rows are created, never updated, and removed either explicitly or when their owning
//! entity is purged. Two rows may point at the same physical file when identical bytes
//! were uploaded twice; each upload event keeps its own row, display name and timestamp.
//!
//! # Implementations
//!
//! - [`MemoryIndex`]: process-local, for tests and embedding
//! - [`SqliteIndex`]: a `stored_files` table in a SQLite database, safe to share
//!   between handles and processes

use crate::constants::{INDEX_BUSY_TIMEOUT, INDEX_MAX_CONNECTIONS, INDEX_WORKER_THREADS};
use crate::{IngestError, IngestResult};
use chrono::{DateTime, SecondsFormat, Utc};
use pfs_files::{Bucket, StoredBlob};
use pfs_types::{EntityId, FileId, Modality, ReportFormat};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::runtime::Runtime;

/// One stored-file metadata row.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredFile {
    pub id: FileId,

    /// Owning entity (patient)
    pub entity: EntityId,

    pub modality: Modality,

    /// Set only for report exports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_format: Option<ReportFormat>,

    /// Logical bucket path, `"{modality}/{entity}"`
    pub bucket: String,

    /// Name shown to users; archive members carry `"{archive stem}/{path in archive}"`
    pub display_name: String,

    /// Primary digest, names the physical file
    pub md5: String,

    /// Secondary digest, used for integrity checks
    pub sha256: String,

    /// `"{md5}{lowercased extension}"`
    pub canonical_name: String,

    pub size_bytes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn bucket_ref(&self) -> Bucket {
        Bucket::new(self.modality, self.entity)
    }
}

/// A row about to be inserted. The canonical name can only come from a [`StoredBlob`]
/// produced by the store, never from a caller.
#[derive(Debug, Clone)]
pub struct NewStoredFile {
    bucket: Bucket,
    report_format: Option<ReportFormat>,
    display_name: String,
    blob: StoredBlob,
}

impl NewStoredFile {
    pub fn new(bucket: Bucket, display_name: impl Into<String>, blob: StoredBlob) -> Self {
        Self {
            bucket,
            report_format: None,
            display_name: display_name.into(),
            blob,
        }
    }

    #[must_use]
    pub fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = Some(format);
        self
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn canonical_name(&self) -> &str {
        &self.blob.canonical_name
    }

    fn into_row(self, id: FileId) -> StoredFile {
        StoredFile {
            id,
            entity: self.bucket.entity(),
            modality: self.bucket.modality(),
            report_format: self.report_format,
            bucket: self.bucket.to_string(),
            display_name: self.display_name,
            md5: self.blob.digests.md5,
            sha256: self.blob.digests.sha256,
            canonical_name: self.blob.canonical_name,
            size_bytes: self.blob.size_bytes,
            media_type: self.blob.media_type,
            created_at: Utc::now(),
        }
    }
}

/// Storage for stored-file rows.
///
/// Implementations must be safe to share across the per-bucket ingestion threads.
pub trait FileIndex: Send + Sync {
    /// Inserts a new row with a freshly allocated id. Ids are never reused.
    fn insert(&self, new: NewStoredFile) -> IngestResult<StoredFile>;

    /// Looks a row up by id; rows of a different modality do not match.
    fn get(&self, modality: Modality, id: FileId) -> IngestResult<Option<StoredFile>>;

    /// Removes a row, returning it if it existed.
    fn remove(&self, id: FileId) -> IngestResult<Option<StoredFile>>;

    /// All rows owned by `entity`, ordered by id.
    fn list_entity(&self, entity: EntityId) -> IngestResult<Vec<StoredFile>>;

    /// Rows of one bucket, ordered by id.
    fn list(&self, entity: EntityId, modality: Modality) -> IngestResult<Vec<StoredFile>> {
        Ok(self
            .list_entity(entity)?
            .into_iter()
            .filter(|row| row.modality == modality)
            .collect())
    }

    /// Report export rows of one entity and format.
    fn reports(&self, entity: EntityId, format: ReportFormat) -> IngestResult<Vec<StoredFile>> {
        Ok(self
            .list(entity, Modality::ReportExport)?
            .into_iter()
            .filter(|row| row.report_format == Some(format))
            .collect())
    }

    /// Number of rows referencing the physical file `bucket/canonical_name`.
    fn reference_count(&self, bucket: &str, canonical_name: &str) -> IngestResult<usize>;
}

#[derive(Debug, Default)]
struct IndexState {
    next_id: u64,
    files: BTreeMap<FileId, StoredFile>,
}

impl IndexState {
    fn insert(&mut self, new: NewStoredFile) -> StoredFile {
        self.next_id += 1;
        let row = new.into_row(FileId::new(self.next_id));
        self.files.insert(row.id, row.clone());
        row
    }

    fn get(&self, modality: Modality, id: FileId) -> Option<StoredFile> {
        self.files
            .get(&id)
            .filter(|row| row.modality == modality)
            .cloned()
    }

    fn list_entity(&self, entity: EntityId) -> Vec<StoredFile> {
        self.files
            .values()
            .filter(|row| row.entity == entity)
            .cloned()
            .collect()
    }

    fn reference_count(&self, bucket: &str, canonical_name: &str) -> usize {
        self.files
            .values()
            .filter(|row| row.bucket == bucket && row.canonical_name == canonical_name)
            .count()
    }
}

/// Process-local index.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: RwLock<IndexState>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileIndex for MemoryIndex {
    fn insert(&self, new: NewStoredFile) -> IngestResult<StoredFile> {
        let mut state = self.state.write().map_err(|_| IngestError::IndexPoisoned)?;
        Ok(state.insert(new))
    }

    fn get(&self, modality: Modality, id: FileId) -> IngestResult<Option<StoredFile>> {
        let state = self.state.read().map_err(|_| IngestError::IndexPoisoned)?;
        Ok(state.get(modality, id))
    }

    fn remove(&self, id: FileId) -> IngestResult<Option<StoredFile>> {
        let mut state = self.state.write().map_err(|_| IngestError::IndexPoisoned)?;
        Ok(state.files.remove(&id))
    }

    fn list_entity(&self, entity: EntityId) -> IngestResult<Vec<StoredFile>> {
        let state = self.state.read().map_err(|_| IngestError::IndexPoisoned)?;
        Ok(state.list_entity(entity))
    }

    fn reference_count(&self, bucket: &str, canonical_name: &str) -> IngestResult<usize> {
        let state = self.state.read().map_err(|_| IngestError::IndexPoisoned)?;
        Ok(state.reference_count(bucket, canonical_name))
    }
}

const COLUMNS: &str = "id, entity, modality, report_format, bucket, display_name, md5, sha256, \
                       canonical_name, size_bytes, media_type, created_at";

/// Index stored in the `stored_files` table of a SQLite database.
///
/// Every mutation is a single statement, so it commits atomically and other handles
/// (in this process or another) see it immediately. Ids come from `AUTOINCREMENT`
/// and are never handed out twice, even after the newest row is removed. The
/// database runs in WAL mode with full sync, so a committed row survives a crash.
///
/// Calls block on a private runtime; do not call them from inside another async
/// runtime.
#[derive(Debug)]
pub struct SqliteIndex {
    path: PathBuf,
    pool: SqlitePool,
    runtime: Runtime,
}

impl SqliteIndex {
    /// Opens the index at `path`, creating the database and its schema if needed.
    ///
    /// # Errors
    ///
    /// - `IngestError::IndexLocation` if the parent directory cannot be created
    /// - `IngestError::IndexDatabase` if the file is not a usable SQLite database
    pub fn open(path: &Path) -> IngestResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(IngestError::IndexLocation)?;
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(INDEX_WORKER_THREADS)
            .thread_name("pfs-index")
            .enable_all()
            .build()
            .map_err(IngestError::IndexRuntime)?;

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(INDEX_BUSY_TIMEOUT);

        let pool = runtime.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(INDEX_MAX_CONNECTIONS)
                .connect_with(options)
                .await?;
            init_schema(&pool).await?;
            Ok::<_, sqlx::Error>(pool)
        })?;

        tracing::debug!(path = %path.display(), "opened metadata index");

        Ok(Self {
            path: path.to_path_buf(),
            pool,
            runtime,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run<T>(&self, query: impl Future<Output = Result<T, sqlx::Error>>) -> IngestResult<T> {
        Ok(self.runtime.block_on(query)?)
    }

    fn fetch_rows(
        &self,
        sql: &str,
        entity: EntityId,
        extra: &[&str],
    ) -> IngestResult<Vec<StoredFile>> {
        let mut query = sqlx::query(sql).bind(to_sql(entity.get())?);
        for value in extra {
            query = query.bind(*value);
        }
        let rows = self.run(query.fetch_all(&self.pool))?;
        rows.iter().map(stored_file_from_row).collect()
    }
}

impl Drop for SqliteIndex {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stored_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity INTEGER NOT NULL,
            modality TEXT NOT NULL,
            report_format TEXT,
            bucket TEXT NOT NULL,
            display_name TEXT NOT NULL,
            md5 TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            media_type TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stored_files_entity ON stored_files(entity, modality)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stored_files_blob ON stored_files(bucket, canonical_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn to_sql(value: u64) -> IngestResult<i64> {
    i64::try_from(value)
        .map_err(|_| IngestError::InvalidInput(format!("{value} is out of range for the index")))
}

fn stored_file_from_row(row: &SqliteRow) -> IngestResult<StoredFile> {
    let id: i64 = row.try_get("id")?;
    let corrupt = |what: &str| IngestError::IndexCorrupt(format!("row {id}: {what}"));

    let entity: i64 = row.try_get("entity")?;
    let size_bytes: i64 = row.try_get("size_bytes")?;
    let modality: String = row.try_get("modality")?;
    let report_format: Option<String> = row.try_get("report_format")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(StoredFile {
        id: FileId::new(u64::try_from(id).map_err(|_| corrupt("negative id"))?),
        entity: EntityId::new(u64::try_from(entity).map_err(|_| corrupt("negative entity"))?),
        modality: modality.parse().map_err(|_| corrupt("unknown modality"))?,
        report_format: report_format
            .map(|f| f.parse::<ReportFormat>())
            .transpose()
            .map_err(|_| corrupt("unknown report format"))?,
        bucket: row.try_get("bucket")?,
        display_name: row.try_get("display_name")?,
        md5: row.try_get("md5")?,
        sha256: row.try_get("sha256")?,
        canonical_name: row.try_get("canonical_name")?,
        size_bytes: u64::try_from(size_bytes).map_err(|_| corrupt("negative size"))?,
        media_type: row.try_get("media_type")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|_| corrupt("bad timestamp"))?
            .with_timezone(&Utc),
    })
}

impl FileIndex for SqliteIndex {
    fn insert(&self, new: NewStoredFile) -> IngestResult<StoredFile> {
        // id is assigned by the database
        let mut row = new.into_row(FileId::new(0));
        let query = sqlx::query(
            "INSERT INTO stored_files (entity, modality, report_format, bucket, display_name, \
             md5, sha256, canonical_name, size_bytes, media_type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(to_sql(row.entity.get())?)
        .bind(row.modality.dir_name())
        .bind(row.report_format.map(ReportFormat::as_str))
        .bind(row.bucket.as_str())
        .bind(row.display_name.as_str())
        .bind(row.md5.as_str())
        .bind(row.sha256.as_str())
        .bind(row.canonical_name.as_str())
        .bind(to_sql(row.size_bytes)?)
        .bind(row.media_type.as_deref())
        .bind(row.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true));

        let result = self.run(query.execute(&self.pool))?;
        let id = u64::try_from(result.last_insert_rowid())
            .map_err(|_| IngestError::IndexCorrupt("negative row id".into()))?;
        row.id = FileId::new(id);
        Ok(row)
    }

    fn get(&self, modality: Modality, id: FileId) -> IngestResult<Option<StoredFile>> {
        let sql = format!("SELECT {COLUMNS} FROM stored_files WHERE id = ? AND modality = ?");
        let query = sqlx::query(&sql)
            .bind(to_sql(id.get())?)
            .bind(modality.dir_name());
        let row = self.run(query.fetch_optional(&self.pool))?;
        row.as_ref().map(stored_file_from_row).transpose()
    }

    fn remove(&self, id: FileId) -> IngestResult<Option<StoredFile>> {
        let sql = format!("DELETE FROM stored_files WHERE id = ? RETURNING {COLUMNS}");
        let query = sqlx::query(&sql).bind(to_sql(id.get())?);
        let removed = self.run(query.fetch_all(&self.pool))?;
        removed.first().map(stored_file_from_row).transpose()
    }

    fn list_entity(&self, entity: EntityId) -> IngestResult<Vec<StoredFile>> {
        let sql = format!("SELECT {COLUMNS} FROM stored_files WHERE entity = ? ORDER BY id");
        self.fetch_rows(&sql, entity, &[])
    }

    fn list(&self, entity: EntityId, modality: Modality) -> IngestResult<Vec<StoredFile>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM stored_files WHERE entity = ? AND modality = ? ORDER BY id"
        );
        self.fetch_rows(&sql, entity, &[modality.dir_name()])
    }

    fn reports(&self, entity: EntityId, format: ReportFormat) -> IngestResult<Vec<StoredFile>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM stored_files \
             WHERE entity = ? AND modality = ? AND report_format = ? ORDER BY id"
        );
        self.fetch_rows(
            &sql,
            entity,
            &[Modality::ReportExport.dir_name(), format.as_str()],
        )
    }

    fn reference_count(&self, bucket: &str, canonical_name: &str) -> IngestResult<usize> {
        let query = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stored_files WHERE bucket = ? AND canonical_name = ?",
        )
        .bind(bucket)
        .bind(canonical_name);
        let count = self.run(query.fetch_one(&self.pool))?;
        usize::try_from(count).map_err(|_| IngestError::IndexCorrupt("negative row count".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfs_files::ContentDigests;
    use tempfile::TempDir;

    fn blob(md5: &str, ext: &str) -> StoredBlob {
        StoredBlob {
            canonical_name: format!("{md5}{ext}"),
            digests: ContentDigests {
                md5: md5.to_string(),
                sha256: "0".repeat(64),
            },
            size_bytes: 3,
            media_type: None,
        }
    }

    fn new_row(modality: Modality, entity: u64, name: &str, md5: &str) -> NewStoredFile {
        NewStoredFile::new(
            Bucket::new(modality, EntityId::new(entity)),
            name,
            blob(md5, ".txt"),
        )
    }

    fn exercise(index: &dyn FileIndex) {
        let a = index.insert(new_row(Modality::Mri, 1, "a.txt", "aaa")).unwrap();
        let b = index.insert(new_row(Modality::Mri, 1, "b.txt", "aaa")).unwrap();
        let c = index.insert(new_row(Modality::Eeg, 1, "c.txt", "ccc")).unwrap();
        index.insert(new_row(Modality::Mri, 2, "d.txt", "aaa")).unwrap();

        assert_eq!(a.id, FileId::new(1));
        assert_eq!(b.id, FileId::new(2));
        assert_eq!(a.bucket, "mri/1");
        assert_eq!(a.canonical_name, "aaa.txt");

        assert_eq!(index.get(Modality::Mri, a.id).unwrap(), Some(a.clone()));
        assert_eq!(index.get(Modality::Eeg, a.id).unwrap(), None);

        assert_eq!(index.list_entity(EntityId::new(1)).unwrap().len(), 3);
        assert_eq!(
            index.list(EntityId::new(1), Modality::Mri).unwrap(),
            vec![a.clone(), b.clone()]
        );
        assert_eq!(index.reference_count("mri/1", "aaa.txt").unwrap(), 2);
        assert_eq!(index.reference_count("mri/2", "aaa.txt").unwrap(), 1);

        assert_eq!(index.remove(c.id).unwrap(), Some(c.clone()));
        assert_eq!(index.remove(c.id).unwrap(), None);

        let e = index.insert(new_row(Modality::Eeg, 1, "e.txt", "eee")).unwrap();
        assert_eq!(e.id, FileId::new(5), "ids are never reused");
    }

    #[test]
    fn memory_index_behaviour() {
        exercise(&MemoryIndex::new());
    }

    #[test]
    fn sqlite_index_behaviour_and_persistence() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("stored_files.sqlite3");

        let index = SqliteIndex::open(&path).unwrap();
        exercise(&index);
        drop(index);

        let reopened = SqliteIndex::open(&path).unwrap();
        let rows = reopened.list_entity(EntityId::new(1)).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "e.txt"]);

        let next = reopened
            .insert(new_row(Modality::Pet, 1, "f.txt", "fff"))
            .unwrap();
        assert_eq!(next.id, FileId::new(6));
    }

    #[test]
    fn sqlite_index_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stored_files.sqlite3");
        fs::write(&path, "files: [this is: not, a: database]".repeat(64)).unwrap();
        assert!(matches!(
            SqliteIndex::open(&path),
            Err(IngestError::IndexDatabase(_))
        ));
    }

    #[test]
    fn handles_sharing_a_database_never_reuse_ids() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stored_files.sqlite3");
        let first = SqliteIndex::open(&path).unwrap();
        let second = SqliteIndex::open(&path).unwrap();

        let ids: Vec<FileId> = std::thread::scope(|scope| {
            let workers: Vec<_> = [(&first, "a"), (&second, "b")]
                .into_iter()
                .map(|(index, prefix)| {
                    scope.spawn(move || {
                        (0..25)
                            .map(|n| {
                                let name = format!("{prefix}{n}.txt");
                                index.insert(new_row(Modality::Mri, 1, &name, prefix)).unwrap().id
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        let distinct: std::collections::BTreeSet<_> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), 50, "every insert gets its own id");

        drop(first);
        drop(second);
        let reopened = SqliteIndex::open(&path).unwrap();
        let rows = reopened.list_entity(EntityId::new(1)).unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!(reopened.reference_count("mri/1", "a.txt").unwrap(), 25);
        assert_eq!(reopened.reference_count("mri/1", "b.txt").unwrap(), 25);
    }

    #[test]
    fn sqlite_rows_are_committed_and_synced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stored_files.sqlite3");
        let writer = SqliteIndex::open(&path).unwrap();

        let synchronous = writer
            .run(sqlx::query_scalar::<_, i64>("PRAGMA synchronous").fetch_one(&writer.pool))
            .unwrap();
        assert_eq!(synchronous, 2, "synchronous = FULL");
        let journal = writer
            .run(sqlx::query_scalar::<_, String>("PRAGMA journal_mode").fetch_one(&writer.pool))
            .unwrap();
        assert_eq!(journal, "wal");

        for n in 0..200 {
            writer
                .insert(new_row(Modality::Eeg, 7, &format!("{n}.edf"), "abc"))
                .unwrap();
        }

        // a second handle sees every row while the writer is still open
        let reader = SqliteIndex::open(&path).unwrap();
        assert_eq!(reader.list(EntityId::new(7), Modality::Eeg).unwrap().len(), 200);
        assert_eq!(reader.remove(FileId::new(200)).unwrap().unwrap().display_name, "199.edf");
        assert_eq!(writer.get(Modality::Eeg, FileId::new(200)).unwrap(), None);
    }

    #[test]
    fn sqlite_report_rows_round_trip_format_and_media_type() {
        let temp = TempDir::new().unwrap();
        let index = SqliteIndex::open(&temp.path().join("stored_files.sqlite3")).unwrap();
        let bucket = Bucket::new(Modality::ReportExport, EntityId::new(9));
        let mut pdf = blob("111", ".pdf");
        pdf.media_type = Some("application/pdf".into());
        let stored = index
            .insert(NewStoredFile::new(bucket, "p", pdf).with_report_format(ReportFormat::Pdf))
            .unwrap();
        index
            .insert(NewStoredFile::new(bucket, "w", blob("222", ".docx")).with_report_format(ReportFormat::Word))
            .unwrap();

        assert_eq!(index.reports(EntityId::new(9), ReportFormat::Pdf).unwrap(), vec![stored.clone()]);
        assert_eq!(index.get(Modality::ReportExport, stored.id).unwrap(), Some(stored));
        assert!(index.reports(EntityId::new(9), ReportFormat::Csv).unwrap().is_empty());
    }

    #[test]
    fn report_rows_filter_by_format() {
        let index = MemoryIndex::new();
        let bucket = Bucket::new(Modality::ReportExport, EntityId::new(9));
        index
            .insert(NewStoredFile::new(bucket, "p", blob("111", ".pdf")).with_report_format(ReportFormat::Pdf))
            .unwrap();
        index
            .insert(NewStoredFile::new(bucket, "p", blob("222", ".csv")).with_report_format(ReportFormat::Csv))
            .unwrap();

        let pdfs = index.reports(EntityId::new(9), ReportFormat::Pdf).unwrap();
        assert_eq!(pdfs.len(), 1);
        assert_eq!(pdfs[0].canonical_name, "111.pdf");
        assert_eq!(pdfs[0].bucket, "info/9");
    }

    #[test]
    fn stored_file_serialization() {
        let row = new_row(Modality::Seeg, 3, "run/x.edf", "abc").into_row(FileId::new(4));
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"modality\":\"seeg\""));
        assert!(json.contains("\"bucket\":\"seeg/3\""));
        assert!(!json.contains("report_format"));
    }
}
