//! Content-addressed store implementation
//!
//! [`ContentStore`] writes byte streams into bucket directories under a single storage
//! root. Each upload is first spooled into a uniquely named temporary file inside the
//! bucket (hashing in the same pass), then atomically renamed to its canonical name
//! `<md5><extension>`.
//!
//! # Guarantees
//!
//! - A partially written file is never visible under its canonical name
//! - Concurrent ingestions into the same bucket never share a temporary name
//! - Identical content with the same extension always maps to the same path, so a
//!   repeated write is an overwrite with identical bytes
//! - The canonical name is computed here and is never accepted from a caller

use crate::constants::{DEFAULT_CHUNK_SIZE, SNIFF_LEN, SPOOL_PREFIX};
use crate::hasher::{ContentDigests, ContentHasher};
use crate::layout::Bucket;
use crate::FilesError;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Result of committing a file into the store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredBlob {
    /// `<md5><lowercased extension>`, the file name inside the bucket
    pub canonical_name: String,

    pub digests: ContentDigests,

    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    ///
    /// This is a best-effort detection from magic bytes and should not be considered
    /// authoritative.
    pub media_type: Option<String>,
}

/// An upload that has been written and hashed but not yet given its canonical name.
///
/// Dropping it without calling [`ContentStore::commit`] deletes the temporary file.
#[derive(Debug)]
pub struct SpooledUpload {
    bucket: Bucket,
    temp: NamedTempFile,
    digests: ContentDigests,
    size_bytes: u64,
    head: Vec<u8>,
}

impl SpooledUpload {
    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn digests(&self) -> &ContentDigests {
        &self.digests
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Leading bytes of the content, for format sniffing.
    pub fn head(&self) -> &[u8] {
        &self.head
    }
}

/// Content-addressed store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    chunk_size: usize,
}

impl ContentStore {
    /// Opens the store at `root`, creating the directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the path exists but is not a
    /// directory, or cannot be created or canonicalised.
    pub fn new(root: &Path) -> Result<Self, FilesError> {
        if root.exists() && !root.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        fs::create_dir_all(root).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create {}: {}",
                root.display(),
                e
            ))
        })?;

        let root = root.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Overrides the read size used while spooling.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Returns the canonicalised storage root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn bucket_dir(&self, bucket: &Bucket) -> PathBuf {
        bucket.dir_under(&self.root)
    }

    /// Physical location of a stored file from its recorded bucket path and name.
    #[must_use]
    pub fn physical_path(&self, bucket_path: &str, canonical_name: &str) -> PathBuf {
        self.root.join(bucket_path).join(canonical_name)
    }

    /// Creates the bucket directory if needed and returns it.
    pub fn ensure_bucket_dir(&self, bucket: &Bucket) -> Result<PathBuf, FilesError> {
        let dir = self.bucket_dir(bucket);
        fs::create_dir_all(&dir).map_err(|source| FilesError::BucketCreation {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Writes `reader` to a fresh temporary file in the bucket, hashing as it goes.
    ///
    /// The stream is consumed exactly once in chunks of the configured size.
    ///
    /// # Errors
    ///
    /// - `FilesError::BucketCreation` if the bucket directory cannot be created
    /// - `FilesError::SourceRead` if the stream fails
    /// - `FilesError::Io` if the temporary file cannot be created or written
    pub fn spool<R: Read>(&self, bucket: &Bucket, mut reader: R) -> Result<SpooledUpload, FilesError> {
        let dir = self.ensure_bucket_dir(bucket)?;
        let mut temp = tempfile::Builder::new()
            .prefix(SPOOL_PREFIX)
            .tempfile_in(&dir)?;

        let mut hasher = ContentHasher::new();
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FilesError::SourceRead(e)),
            };
            let chunk = &buffer[..read];
            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            hasher.update(chunk);
            temp.write_all(chunk)?;
        }
        temp.as_file().sync_all()?;

        let size_bytes = hasher.bytes();
        Ok(SpooledUpload {
            bucket: *bucket,
            temp,
            digests: hasher.finalize(),
            size_bytes,
            head,
        })
    }

    /// Renames a spooled upload to `<md5><extension>` inside its bucket.
    ///
    /// `extension` includes the leading dot; use [`canonical_extension`] to derive it.
    pub fn commit(
        &self,
        spooled: SpooledUpload,
        extension: Option<&str>,
    ) -> Result<StoredBlob, FilesError> {
        let SpooledUpload {
            bucket,
            temp,
            digests,
            size_bytes,
            head,
        } = spooled;

        let name = canonical_name(&digests.md5, extension);
        let final_path = self.bucket_dir(&bucket).join(&name);

        temp.persist(&final_path)
            .map_err(|e| FilesError::Commit {
                path: final_path.clone(),
                source: e.error,
            })?;

        tracing::debug!(bucket = %bucket, name = %name, size_bytes, "committed file");

        Ok(StoredBlob {
            canonical_name: name,
            digests,
            size_bytes,
            media_type: infer::get(&head).map(|kind| kind.mime_type().to_string()),
        })
    }

    /// Stores `reader` under a name derived from its MD5 and the extension of
    /// `display_name`.
    pub fn put<R: Read>(
        &self,
        bucket: &Bucket,
        display_name: &str,
        reader: R,
    ) -> Result<StoredBlob, FilesError> {
        let spooled = self.spool(bucket, reader)?;
        let extension = canonical_extension(display_name, None);
        self.commit(spooled, extension.as_deref())
    }

    /// Removes a stored file. A file that is already gone is not an error.
    ///
    /// Returns whether a file was actually removed.
    pub fn remove(&self, bucket_path: &str, canonical_name: &str) -> Result<bool, FilesError> {
        if canonical_name.is_empty() || canonical_name.contains(['/', '\\']) {
            return Err(FilesError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a stored file name: {canonical_name}"),
            )));
        }

        let path = self.physical_path(bucket_path, canonical_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesError::Io(io::Error::new(
                e.kind(),
                format!("Failed to remove {}: {}", path.display(), e),
            ))),
        }
    }

    /// Removes the bucket directory if it is empty. Returns whether it was removed.
    pub fn prune_bucket(&self, bucket: &Bucket) -> bool {
        fs::remove_dir(self.bucket_dir(bucket)).is_ok()
    }
}

/// Canonical stored name: the MD5 followed by the lowercased extension.
pub fn canonical_name(md5: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{}{}", md5, ext.to_lowercase()),
        None => md5.to_string(),
    }
}

/// Derives the lowercased, dot-prefixed extension used in canonical names.
///
/// The extension comes from the last path segment of `display_name`; if that has none,
/// from `fallback` (typically the name of the source file on disk). Leading dots of
/// hidden files are not extensions, and anything other than ASCII alphanumerics,
/// `-` and `_` after the dot disqualifies the extension.
pub fn canonical_extension(display_name: &str, fallback: Option<&str>) -> Option<String> {
    extension_of(display_name).or_else(|| fallback.and_then(extension_of))
}

fn extension_of(name: &str) -> Option<String> {
    let segment = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem_start = segment.len() - segment.trim_start_matches('.').len();
    let dot = segment[stem_start..].rfind('.')? + stem_start;
    let ext = &segment[dot + 1..];
    let valid = !ext.is_empty()
        && ext
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    valid.then(|| format!(".{}", ext.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfs_types::{EntityId, Modality};
    use tempfile::TempDir;

    fn store() -> (TempDir, ContentStore) {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(&temp.path().join("large_files")).unwrap();
        (temp, store)
    }

    fn bucket() -> Bucket {
        Bucket::new(Modality::Mri, EntityId::new(12))
    }

    fn bucket_listing(store: &ContentStore, bucket: &Bucket) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(store.bucket_dir(bucket))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn new_creates_missing_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("root");
        let store = ContentStore::new(&root).unwrap();
        assert!(root.is_dir());
        assert!(store.root().is_absolute());
    }

    #[test]
    fn new_rejects_file_as_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        fs::write(&root, "not a directory").unwrap();
        assert!(matches!(
            ContentStore::new(&root),
            Err(FilesError::InvalidRootDirectory(_))
        ));
    }

    #[test]
    fn put_names_file_by_md5_and_lowercased_extension() {
        let (_temp, store) = store();
        let blob = store.put(&bucket(), "Scan.NII", &b"hello"[..]).unwrap();

        assert_eq!(blob.canonical_name, "5d41402abc4b2a76b9719d911017c592.nii");
        assert_eq!(blob.size_bytes, 5);
        assert_eq!(
            fs::read(store.bucket_dir(&bucket()).join(&blob.canonical_name)).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn identical_bytes_share_one_physical_file() {
        let (_temp, store) = store();
        let first = store.put(&bucket(), "a.txt", &b"same content"[..]).unwrap();
        let second = store.put(&bucket(), "renamed/b.TXT", &b"same content"[..]).unwrap();

        assert_eq!(first.canonical_name, second.canonical_name);
        assert_eq!(bucket_listing(&store, &bucket()), vec![first.canonical_name]);
    }

    #[test]
    fn no_temporary_files_survive_commit() {
        let (_temp, store) = store();
        store.put(&bucket(), "one.edf", &b"1"[..]).unwrap();
        store.put(&bucket(), "two.edf", &b"2"[..]).unwrap();

        let listing = bucket_listing(&store, &bucket());
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|n| !n.starts_with(SPOOL_PREFIX)));
    }

    #[test]
    fn dropped_spool_removes_temporary_file() {
        let (_temp, store) = store();
        let spooled = store.spool(&bucket(), &b"abandoned"[..]).unwrap();
        let path = spooled.path().to_path_buf();
        assert!(path.exists());
        drop(spooled);
        assert!(!path.exists());
    }

    #[test]
    fn spool_records_digests_and_head() {
        let (_temp, store) = store();
        let store = store.with_chunk_size(3);
        let spooled = store.spool(&bucket(), &b"hello"[..]).unwrap();
        assert_eq!(spooled.digests().md5, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(spooled.size_bytes(), 5);
        assert_eq!(spooled.head(), b"hello");
    }

    #[test]
    fn failing_stream_leaves_nothing_behind() {
        struct Broken(usize);
        impl Read for Broken {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0 == 0 {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "client left"));
                }
                self.0 -= 1;
                buf[0] = b'x';
                Ok(1)
            }
        }

        let (_temp, store) = store();
        let result = store.put(&bucket(), "partial.bin", Broken(3));
        assert!(matches!(result, Err(FilesError::SourceRead(_))));
        assert!(bucket_listing(&store, &bucket()).is_empty());
    }

    #[test]
    fn detects_media_type() {
        let (_temp, store) = store();
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let blob = store.put(&bucket(), "slice.png", &png[..]).unwrap();
        assert_eq!(blob.media_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn remove_missing_file_is_not_an_error() {
        let (_temp, store) = store();
        let blob = store.put(&bucket(), "x.txt", &b"x"[..]).unwrap();
        let bucket_path = bucket().to_string();

        assert!(store.remove(&bucket_path, &blob.canonical_name).unwrap());
        assert!(!store.remove(&bucket_path, &blob.canonical_name).unwrap());
    }

    #[test]
    fn remove_rejects_path_like_names() {
        let (_temp, store) = store();
        assert!(store.remove("mri/12", "../escape").is_err());
    }

    #[test]
    fn prune_only_removes_empty_buckets() {
        let (_temp, store) = store();
        let blob = store.put(&bucket(), "x.txt", &b"x"[..]).unwrap();
        assert!(!store.prune_bucket(&bucket()));
        store.remove(&bucket().to_string(), &blob.canonical_name).unwrap();
        assert!(store.prune_bucket(&bucket()));
        assert!(!store.bucket_dir(&bucket()).exists());
    }

    #[test]
    fn canonical_name_lowercases_extension() {
        assert_eq!(canonical_name("abc", Some(".TXT")), "abc.txt");
        assert_eq!(canonical_name("abc", None), "abc");
    }

    #[test]
    fn extension_rules() {
        assert_eq!(canonical_extension("note.txt", None).as_deref(), Some(".txt"));
        assert_eq!(canonical_extension("a.tar.GZ", None).as_deref(), Some(".gz"));
        assert_eq!(
            canonical_extension("study/run.1/data.EDF", None).as_deref(),
            Some(".edf")
        );
        assert_eq!(canonical_extension("dir.v2/README", None), None);
        assert_eq!(canonical_extension(".bashrc", None), None);
        assert_eq!(canonical_extension("..hidden.cfg", None).as_deref(), Some(".cfg"));
        assert_eq!(canonical_extension("trailing.", None), None);
        assert_eq!(canonical_extension("weird.t:xt", None), None);
        assert_eq!(
            canonical_extension("README", Some("upload.DCM")).as_deref(),
            Some(".dcm")
        );
    }
}
