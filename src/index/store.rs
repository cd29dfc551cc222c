//! Single-slot persistence for the vector index.
//!
//! The store owns one directory and one `index.json` inside it. Saving writes a sibling
//! temporary file and renames it over the previous index, so a failed or interrupted save
//! leaves the prior index readable.

use super::VectorIndex;
use super::types::{IndexError, StoredIndex};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// File name of the persisted index inside the store directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Reads and writes the single persisted index.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    /// Create a store rooted at `dir`. Nothing is touched until the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the index.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the index file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    /// Whether an index has been saved.
    pub fn exists(&self) -> bool {
        self.file_path().is_file()
    }

    /// Replace the persisted index with `index`.
    pub fn save(&self, index: &VectorIndex) -> Result<(), IndexError> {
        fs::create_dir_all(&self.dir)?;
        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_json::to_writer(&mut writer, &index.to_stored())?;
            writer.flush()?;
        }
        staged.as_file().sync_all()?;
        staged
            .persist(self.file_path())
            .map_err(|error| IndexError::Io(error.error))?;

        tracing::info!(
            path = %self.file_path().display(),
            chunks = index.len(),
            dimension = index.dimension(),
            "Saved index"
        );
        Ok(())
    }

    /// Load the persisted index, or [`IndexError::NotFound`] when none was saved.
    pub fn load(&self) -> Result<VectorIndex, IndexError> {
        let path = self.file_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(IndexError::NotFound(self.dir.clone()));
            }
            Err(error) => return Err(error.into()),
        };
        let stored: StoredIndex = serde_json::from_reader(BufReader::new(file))?;
        let index = VectorIndex::from_stored(stored)?;
        tracing::debug!(path = %path.display(), chunks = index.len(), "Loaded index");
        Ok(index)
    }
}
