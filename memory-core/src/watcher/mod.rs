//! # File Watcher (C3)
//!
//! Recursive filesystem observer that coalesces raw `notify` events into
//! debounced, content-changed callbacks. Grounded in
//! `original_source/src/memory/file_watcher.py`'s `DebouncedFileWatcher`
//! (SHA-256 content-hash dedup, a pending-set + single-shot timer for
//! debouncing), re-expressed over `tokio` tasks/channels instead of
//! `asyncio`.

use crate::types::config::WatcherConfig;
use crate::{Error, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What happened to a watched path once its debounce window elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Content changed (or the file is new) and is readable on disk.
    Changed(PathBuf),
    /// The path no longer exists on disk.
    Deleted(PathBuf),
}

struct DebounceState {
    pending: HashSet<PathBuf>,
    timer: Option<JoinHandle<()>>,
}

/// Recursive, debounced, content-hash-deduped file watcher. `stop` cancels
/// the pending debounce timer synchronously; no callback fires after it
/// returns.
pub struct FileWatcher {
    config: WatcherConfig,
    hashes: Arc<Mutex<HashMap<PathBuf, String>>>,
    debounce: Arc<Mutex<DebounceState>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
    inner: Mutex<Option<notify::RecommendedWatcher>>,
}

impl FileWatcher {
    #[must_use]
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            hashes: Arc::new(Mutex::new(HashMap::new())),
            debounce: Arc::new(Mutex::new(DebounceState {
                pending: HashSet::new(),
                timer: None,
            })),
            watch_task: Mutex::new(None),
            inner: Mutex::new(None),
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.config.exclude_patterns.iter().any(|pattern| {
            let needle = pattern.trim_end_matches("/**").trim_end_matches("**");
            !needle.is_empty() && path_str.contains(needle.as_ref())
        })
    }

    fn compute_hash(path: &Path) -> Option<String> {
        let bytes = std::fs::read(path).ok()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Some(format!("{:x}", hasher.finalize()))
    }

    /// Returns true only for genuine content changes (or first sight of a
    /// new file); records the new hash as a side effect.
    fn has_changed(&self, path: &Path) -> bool {
        let Some(hash) = Self::compute_hash(path) else {
            return false; // missing-file reads are swallowed
        };
        let mut hashes = self.hashes.lock();
        let changed = hashes.get(path) != Some(&hash);
        hashes.insert(path.to_path_buf(), hash);
        changed
    }

    /// Start watching `root` recursively, invoking `on_change` once per
    /// debounce window per path. Returns once the watcher thread is armed.
    pub fn start<F>(&self, root: &Path, on_change: F) -> Result<()>
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })
        .map_err(|e| Error::Indexing(format!("failed to create file watcher: {e}")))?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Error::Indexing(format!("failed to watch {}: {e}", root.display())))?;
        *self.inner.lock() = Some(watcher);

        let debounce_ms = self.config.debounce_ms;
        let debounce = Arc::clone(&self.debounce);
        let hashes = Arc::clone(&self.hashes);
        let allowed: Vec<String> = self.config.allowed_extensions.clone();
        let excludes: Vec<String> = self.config.exclude_patterns.clone();
        let on_change = Arc::new(on_change);

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for path in event.paths {
                    if path.is_dir() {
                        continue;
                    }
                    if is_excluded_static(&excludes, &path) {
                        continue;
                    }
                    let ext_ok = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|ext| allowed.iter().any(|a| a == ext));
                    if !ext_ok {
                        continue;
                    }

                    let is_delete = matches!(event.kind, EventKind::Remove(_)) || !path.exists();
                    if is_delete {
                        hashes.lock().remove(&path);
                        let on_change = Arc::clone(&on_change);
                        on_change(ChangeEvent::Deleted(path));
                        continue;
                    }

                    let changed = {
                        let Some(hash) = Self::compute_hash(&path) else {
                            continue;
                        };
                        let mut hashes = hashes.lock();
                        let changed = hashes.get(&path) != Some(&hash);
                        hashes.insert(path.clone(), hash);
                        changed
                    };
                    if !changed {
                        continue;
                    }

                    arm_debounce(&debounce, debounce_ms, path, Arc::clone(&on_change));
                }
            }
        });
        *self.watch_task.lock() = Some(task);
        Ok(())
    }

    /// Cancel the pending debounce timer and the watch task. No callback
    /// fires after this returns.
    pub fn stop(&self) {
        if let Some(timer) = self.debounce.lock().timer.take() {
            timer.abort();
        }
        self.debounce.lock().pending.clear();
        if let Some(task) = self.watch_task.lock().take() {
            task.abort();
        }
        *self.inner.lock() = None;
    }

    /// Whether `path` is currently tracked with a known content hash.
    #[must_use]
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.hashes.lock().contains_key(path)
    }
}

fn is_excluded_static(patterns: &[String], path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    patterns.iter().any(|pattern| {
        let needle = pattern.trim_end_matches("/**").trim_end_matches("**");
        !needle.is_empty() && path_str.contains(needle.as_ref())
    })
}

fn arm_debounce(
    debounce: &Arc<Mutex<DebounceState>>,
    debounce_ms: u64,
    path: PathBuf,
    on_change: Arc<dyn Fn(ChangeEvent) + Send + Sync>,
) {
    let mut state = debounce.lock();
    state.pending.insert(path);
    if let Some(old_timer) = state.timer.take() {
        old_timer.abort();
    }
    let debounce_clone = Arc::clone(debounce);
    let timer = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(debounce_ms)).await;
        let pending: Vec<PathBuf> = {
            let mut state = debounce_clone.lock();
            state.timer = None;
            state.pending.drain().collect()
        };
        for path in pending {
            on_change(ChangeEvent::Changed(path));
        }
    });
    state.timer = Some(timer);
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn scenario_s2_burst_of_edits_yields_one_callback() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WatcherConfig::default();
        config.debounce_ms = 200;
        config.allowed_extensions = vec!["txt".to_string()];
        let watcher = FileWatcher::new(config);

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        watcher
            .start(dir.path(), move |event| {
                if matches!(event, ChangeEvent::Changed(_)) {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        let file = dir.path().join("a.txt");
        for i in 0..5 {
            std::fs::write(&file, format!("content {i}")).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        watcher.stop();
    }

    #[test]
    fn exclude_pattern_filters_node_modules() {
        let watcher = FileWatcher::new(WatcherConfig::default());
        assert!(watcher.is_excluded(Path::new("/proj/node_modules/x.js")));
        assert!(!watcher.is_excluded(Path::new("/proj/src/x.js")));
    }

    #[test]
    fn stop_cancels_pending_timer_without_panicking() {
        let watcher = FileWatcher::new(WatcherConfig::default());
        watcher.stop();
    }

    #[tokio::test]
    async fn scenario_s2_deletion_removes_path_from_hash_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WatcherConfig::default();
        config.debounce_ms = 50;
        config.allowed_extensions = vec!["txt".to_string()];
        let watcher = Arc::new(FileWatcher::new(config));
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hi").unwrap();
        watcher.start(dir.path(), |_| {}).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(watcher.is_tracked(&file));

        std::fs::remove_file(&file).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!watcher.is_tracked(&file));
        watcher.stop();
    }

    #[test]
    fn has_changed_detects_genuine_content_change() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "first").unwrap();
        let mut config = WatcherConfig::default();
        config.allowed_extensions = vec!["py".to_string()];
        let watcher = FileWatcher::new(config);

        assert!(watcher.has_changed(&file));
        assert!(!watcher.has_changed(&file));
        std::fs::write(&file, "second").unwrap();
        assert!(watcher.has_changed(&file));
    }
}
