use std::path::PathBuf;
use tempfile::TempDir;

/// Scratch directory standing in for a native library directory.
pub struct LibraryDir {
    dir: TempDir,
}

impl LibraryDir {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create scratch library dir"),
        }
    }

    /// Directory holding a file named like the shim library that is not a
    /// loadable shared object.
    pub fn with_corrupt_library(file_name: &str) -> Self {
        let library = Self::empty();
        std::fs::write(library.path().join(file_name), b"definitely not a shared object")
            .expect("write corrupt library");
        library
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}
