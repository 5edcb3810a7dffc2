// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Paths whose removal fails.
    failing_removals: HashSet<PathBuf>,
    /// Paths whose creation fails.
    failing_writes: HashSet<PathBuf>,
}

/// In-memory filesystem for tests, with injectable failures.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
    temp_dir: PathBuf,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let temp_dir = PathBuf::from("/tmp");
        let mut state = MockState::default();
        state.entries.insert(temp_dir.clone(), MockEntry::Dir);

        Self {
            state: Arc::new(Mutex::new(state)),
            temp_dir,
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut state = self.lock();
        ensure_parents(&mut state.entries, path);
        state
            .entries
            .insert(path.to_path_buf(), MockEntry::File(content.into()));
    }

    /// Make removing `path` fail.
    pub fn fail_removal_of(&self, path: impl AsRef<Path>) {
        self.lock()
            .failing_removals
            .insert(path.as_ref().to_path_buf());
    }

    /// Make writing or creating `path` fail.
    pub fn fail_write_of(&self, path: impl AsRef<Path>) {
        self.lock().failing_writes.insert(path.as_ref().to_path_buf());
    }

    pub fn entry(&self, path: impl AsRef<Path>) -> Option<MockEntry> {
        self.lock().entries.get(path.as_ref()).cloned()
    }

    /// Every path currently present, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock().entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ensure_parents(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        entries
            .entry(ancestor.to_path_buf())
            .or_insert(MockEntry::Dir);
    }
}

impl FileSystem for MockFileSystem {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if self.lock().failing_writes.contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        self.add_file(path, contents);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.failing_writes.contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        if let Some(MockEntry::File(_)) = state.entries.get(path) {
            return Err(anyhow!("File exists: {:?}", path));
        }
        ensure_parents(&mut state.entries, path);
        state.entries.insert(path.to_path_buf(), MockEntry::Dir);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.failing_removals.contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        match state.entries.get(path) {
            Some(MockEntry::File(_)) => {
                state.entries.remove(path);
                Ok(())
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.failing_removals.contains(path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        match state.entries.get(path) {
            Some(MockEntry::Dir) => {
                state.entries.retain(|p, _| !p.starts_with(path));
                Ok(())
            }
            Some(MockEntry::File(_)) => Err(anyhow!("Not a directory: {:?}", path)),
            None => Err(anyhow!("Directory not found: {:?}", path)),
        }
    }

    fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone()
    }
}
