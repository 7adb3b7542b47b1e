//! Registry of source files known to a compilation run.

use crate::loc::FileId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Registry mapping [`FileId`]s to file paths.
///
/// Files are registered once and keep their id for the run. The database
/// never reads file contents itself; the parser front-end does that and
/// reports locations in terms of the ids registered here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDb {
    files: Vec<PathBuf>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file path, returning its id.
    ///
    /// Registering the same path twice returns the existing id.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> FileId {
        let path = path.into();
        if let Some(i) = self.files.iter().position(|p| *p == path) {
            return FileId::from_raw(i as u32);
        }
        let id = FileId::from_raw(self.files.len() as u32);
        self.files.push(path);
        id
    }

    /// Returns the path for a file id, or `None` for unknown or dummy ids.
    pub fn path(&self, id: FileId) -> Option<&Path> {
        self.files.get(id.as_raw() as usize).map(PathBuf::as_path)
    }

    /// Returns the number of registered files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no files are registered.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup() {
        let mut db = SourceDb::new();
        let id = db.add("design/top.vhd");
        assert_eq!(db.path(id), Some(Path::new("design/top.vhd")));
    }

    #[test]
    fn duplicate_paths_share_id() {
        let mut db = SourceDb::new();
        let a = db.add("a.vhd");
        let b = db.add("a.vhd");
        assert_eq!(a, b);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn distinct_paths_get_distinct_ids() {
        let mut db = SourceDb::new();
        let a = db.add("a.vhd");
        let b = db.add("b.vhd");
        assert_ne!(a, b);
    }

    #[test]
    fn dummy_id_resolves_to_none() {
        let db = SourceDb::new();
        assert_eq!(db.path(FileId::DUMMY), None);
    }
}
