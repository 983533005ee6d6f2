// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem. Clones share the same contents, so a test can
/// create or inspect files while the loop holds another handle.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail_removals: Arc<Mutex<bool>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut files = self.files.lock().unwrap();
        files.insert(path.as_ref().to_path_buf(), content.into());
    }

    /// While set, every `remove_file` fails and leaves the file in place.
    pub fn fail_removals(&self, fail: bool) {
        *self.fail_removals.lock().unwrap() = fail;
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        if *self.fail_removals.lock().unwrap() {
            return Err(anyhow!("mock removal failure for {:?}", path));
        }
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}
