use crate::record::RunRecord;
use crate::vector::{Vector, VectorParseError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised while writing or reading vector files.
///
/// Any of these during capture is fatal to the harness: a vector that cannot
/// be stored is coverage silently lost.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The output directory could not be created or is not a directory.
    #[error("Vector directory error: {0}")]
    Directory(String),

    /// Creating, writing, syncing or renaming a vector file failed.
    #[error("Vector I/O error: {0}")]
    Io(String),

    /// A vector file read back from disk is not in `<name>: 0x<hex>` form.
    #[error("Vector file {path:?} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: VectorParseError,
    },
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        PersistError::Io(err.to_string())
    }
}

/// Directory of persisted vectors, one `vectorNNNNNNNN.test` file per
/// accepted run.
///
/// Files are written under a hidden temporary name in the same directory and
/// renamed into place, so a reader only ever sees complete vectors under the
/// final names.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dir: PathBuf,
}

impl VectorStore {
    const FILE_PREFIX: &'static str = "vector";
    const FILE_EXTENSION: &'static str = "test";
    const TEMP_PREFIX: &'static str = ".vector-";
    const TEMP_SUFFIX: &'static str = ".tmp";

    /// Opens `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                PersistError::Directory(format!(
                    "Failed to create vector directory at {:?}: {}",
                    dir, e
                ))
            })?;
        } else if !dir.is_dir() {
            return Err(PersistError::Directory(format!(
                "Vector path {:?} exists but is not a directory",
                dir
            )));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final file name for the vector of run `index`. Zero padding keeps
    /// lexicographic order equal to run order.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!(
            "{}{:08}.{}",
            Self::FILE_PREFIX,
            index,
            Self::FILE_EXTENSION
        ))
    }

    /// Writes `record` to a temporary file and syncs it; nothing is visible
    /// under the final name until [`StagedVector::commit`].
    pub fn stage(&self, record: &RunRecord) -> Result<StagedVector, PersistError> {
        let mut temp = tempfile::Builder::new()
            .prefix(Self::TEMP_PREFIX)
            .suffix(Self::TEMP_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| {
                PersistError::Io(format!(
                    "Failed to create temporary vector file in {:?}: {}",
                    self.dir, e
                ))
            })?;

        let contents = record.render();
        temp.write_all(contents.as_bytes())
            .and_then(|_| temp.flush())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| {
                PersistError::Io(format!(
                    "Failed to write temporary vector file {:?}: {}",
                    temp.path(),
                    e
                ))
            })?;

        Ok(StagedVector {
            temp,
            final_path: self.path_for(record.index()),
        })
    }

    /// Stages and commits `record`, returning the final path.
    pub fn persist(&self, record: &RunRecord) -> Result<PathBuf, PersistError> {
        self.stage(record)?.commit()
    }

    /// Final vector files currently in the directory, in run order.
    pub fn list(&self) -> Result<Vec<PathBuf>, PersistError> {
        let mut found = Vec::new();
        for entry_result in fs::read_dir(&self.dir).map_err(|e| {
            PersistError::Io(format!(
                "Failed to read vector directory {:?}: {}",
                self.dir, e
            ))
        })? {
            let entry = entry_result?;
            let path = entry.path();
            if path.is_file() && Self::is_vector_name(&path) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    fn is_vector_name(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.strip_prefix(Self::FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(Self::FILE_EXTENSION))
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Reads a persisted vector back.
    pub fn load(path: &Path) -> Result<Vector, PersistError> {
        let text = fs::read_to_string(path).map_err(|e| {
            PersistError::Io(format!("Failed to read vector file {:?}: {}", path, e))
        })?;
        Vector::parse(&text).map_err(|source| PersistError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A fully written vector waiting to be renamed into place.
///
/// Dropping it without committing deletes the temporary file.
#[derive(Debug)]
pub struct StagedVector {
    temp: NamedTempFile,
    final_path: PathBuf,
}

impl StagedVector {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Atomically renames the temporary file to the final name, replacing any
    /// previous file there.
    pub fn commit(self) -> Result<PathBuf, PersistError> {
        let StagedVector { temp, final_path } = self;
        temp.persist(&final_path).map_err(|e| {
            PersistError::Io(format!(
                "Failed to rename {:?} to {:?}: {}",
                e.file.path(),
                final_path,
                e.error
            ))
        })?;
        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;
    use tempfile::tempdir;

    fn sample_record(index: u64, value: u32) -> RunRecord {
        let mut record = RunRecord::new(index);
        record.push_field(Field::new("x", value.to_le_bytes().to_vec()));
        record.push_field(Field::new("c", vec![0x7f]));
        record
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn open_creates_missing_directory() {
        let root = tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let store = VectorStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn open_rejects_a_regular_file() {
        let root = tempdir().unwrap();
        let file_path = root.path().join("not_a_dir");
        fs::write(&file_path, b"x").unwrap();
        match VectorStore::open(&file_path) {
            Err(PersistError::Directory(msg)) => assert!(msg.contains("not a directory")),
            other => panic!("Expected Directory error, got {other:?}"),
        }
    }

    #[test]
    fn persist_writes_rendered_record_under_indexed_name() {
        let root = tempdir().unwrap();
        let store = VectorStore::open(root.path()).unwrap();
        let path = store.persist(&sample_record(7, 0xdeadbeef)).unwrap();

        assert_eq!(path, root.path().join("vector00000007.test"));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "x: 0xdeadbeef\nc: 0x7f\n"
        );
        assert_eq!(dir_entries(root.path()), vec!["vector00000007.test"]);
    }

    #[test]
    fn dropped_stage_never_reaches_the_final_name() {
        let root = tempdir().unwrap();
        let store = VectorStore::open(root.path()).unwrap();

        let staged = store.stage(&sample_record(0, 1)).unwrap();
        let temp_path = staged.temp_path().to_path_buf();
        assert!(temp_path.exists());
        assert!(!staged.final_path().exists());
        assert_eq!(
            fs::read_to_string(&temp_path).unwrap(),
            "x: 0x00000001\nc: 0x7f\n"
        );

        drop(staged);
        assert!(!store.path_for(0).exists());
        assert!(!temp_path.exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn interrupted_rewrite_keeps_the_prior_complete_file() {
        let root = tempdir().unwrap();
        let store = VectorStore::open(root.path()).unwrap();
        let path = store.persist(&sample_record(0, 0x11111111)).unwrap();

        let staged = store.stage(&sample_record(0, 0x22222222)).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "x: 0x11111111\nc: 0x7f\n"
        );
        drop(staged);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "x: 0x11111111\nc: 0x7f\n"
        );

        store.persist(&sample_record(0, 0x22222222)).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "x: 0x22222222\nc: 0x7f\n"
        );
    }

    #[test]
    fn list_returns_vectors_in_run_order_and_skips_others() {
        let root = tempdir().unwrap();
        let store = VectorStore::open(root.path()).unwrap();
        for index in [10, 2, 0] {
            store.persist(&sample_record(index, index as u32)).unwrap();
        }
        fs::write(root.path().join("notes.txt"), b"ignore").unwrap();
        fs::write(root.path().join("vectorX.test"), b"ignore").unwrap();
        let _pending = store.stage(&sample_record(99, 0)).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(
            listed,
            vec![store.path_for(0), store.path_for(2), store.path_for(10)]
        );
    }

    #[test]
    fn load_reads_back_the_persisted_fields() {
        let root = tempdir().unwrap();
        let store = VectorStore::open(root.path()).unwrap();
        let record = sample_record(1, 0x01020304);
        let path = store.persist(&record).unwrap();

        let vector = VectorStore::load(&path).unwrap();
        assert_eq!(vector.fields, record.fields());
    }

    #[test]
    fn load_reports_malformed_files_with_their_path() {
        let root = tempdir().unwrap();
        let path = root.path().join("vector00000000.test");
        fs::write(&path, "garbage\n").unwrap();
        match VectorStore::load(&path) {
            Err(PersistError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn persist_into_a_vanished_directory_fails() {
        let root = tempdir().unwrap();
        let dir = root.path().join("gone");
        let store = VectorStore::open(&dir).unwrap();
        fs::remove_dir(&dir).unwrap();

        match store.persist(&sample_record(0, 0)) {
            Err(PersistError::Io(msg)) => assert!(msg.contains("temporary vector file")),
            other => panic!("Expected Io error, got {other:?}"),
        }
    }
}
