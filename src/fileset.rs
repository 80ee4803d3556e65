//! FileSet: the in-memory generated file tree
//!
//! Ordered path -> content mapping. Insertion order is preserved so "select
//! the first file" stays stable while chunks stream in. Updating a path reuses
//! its entry and bumps its `revision`, which lets consumers tell a changed
//! file apart from a new one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Generator progress messages travel in this pseudo-file.
pub const STATUS_LOG_PATH: &str = "status.log";

/// Directories never loaded from disk.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target", "dist"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    path: String,
    content: String,
    revision: u64,
}

impl GeneratedFile {
    fn new(path: String, content: String) -> Self {
        Self {
            path,
            content,
            revision: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of content changes applied since the entry was created.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Final path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Extension without the dot, lowercased. `None` for dotfiles without one.
    pub fn extension(&self) -> Option<String> {
        let name = self.name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// What a mutation did to the targeted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Created,
    Updated,
    Unchanged,
    /// The path was empty or otherwise unusable; nothing was stored.
    Rejected,
}

/// Normalize a generator-supplied path to the `a/b/c.ts` form.
///
/// Backslashes become `/`, leading `/` and `./` segments are dropped and empty
/// segments collapse. Returns `None` when nothing usable remains.
pub fn normalize_path(raw: &str) -> Option<String> {
    let replaced = raw.trim().replace('\\', "/");
    let segments: Vec<&str> = replaced
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<GeneratedFile>,
    index: HashMap<String, usize>,
    generation: u64,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(path, content)` pairs; later duplicates overwrite earlier ones.
    pub fn from_entries<I, P, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut set = Self::new();
        for (path, content) in entries {
            set.upsert(path.as_ref(), content);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Bumped on every mutation that changed something.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, path: &str) -> Option<&GeneratedFile> {
        self.index.get(path).map(|&i| &self.files[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Files in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Insertion position of a path, used as the tie-breaker for ordering.
    pub fn position(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// Append `delta` to the content at `path`, creating the entry if absent.
    pub fn append(&mut self, path: &str, delta: &str) -> FileChange {
        let Some(path) = normalize_path(path) else {
            warn!("rejecting append to invalid path {:?}", path);
            return FileChange::Rejected;
        };

        match self.index.get(&path) {
            Some(&i) => {
                if delta.is_empty() {
                    return FileChange::Unchanged;
                }
                let file = &mut self.files[i];
                file.content.push_str(delta);
                file.revision += 1;
                self.generation += 1;
                FileChange::Updated
            }
            None => {
                self.insert_new(path, delta.to_string());
                FileChange::Created
            }
        }
    }

    /// Set the content at `path`, creating the entry if absent.
    pub fn upsert(&mut self, path: &str, content: impl Into<String>) -> FileChange {
        let Some(path) = normalize_path(path) else {
            warn!("rejecting write to invalid path {:?}", path);
            return FileChange::Rejected;
        };
        let content = content.into();

        match self.index.get(&path) {
            Some(&i) => {
                let file = &mut self.files[i];
                if file.content == content {
                    return FileChange::Unchanged;
                }
                file.content = content;
                file.revision += 1;
                self.generation += 1;
                FileChange::Updated
            }
            None => {
                self.insert_new(path, content);
                FileChange::Created
            }
        }
    }

    /// Drop every entry and load `entries` in order.
    pub fn replace_all<I, P, C>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        self.files.clear();
        self.index.clear();
        for (path, content) in entries {
            self.upsert(path.as_ref(), content);
        }
        self.generation += 1;
    }

    pub fn clear(&mut self) {
        if self.files.is_empty() {
            return;
        }
        self.files.clear();
        self.index.clear();
        self.generation += 1;
    }

    fn insert_new(&mut self, path: String, content: String) {
        self.index.insert(path.clone(), self.files.len());
        self.files.push(GeneratedFile::new(path, content));
        self.generation += 1;
    }

    /// First file in insertion order, ignoring the status log.
    pub fn first(&self) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path != STATUS_LOG_PATH)
    }

    /// Keep `current` selected while it exists, else fall back to the first file.
    pub fn reconcile_selection(&self, current: Option<&str>) -> Option<&GeneratedFile> {
        current
            .filter(|p| *p != STATUS_LOG_PATH)
            .and_then(|p| self.get(p))
            .or_else(|| self.first())
    }

    /// Progress messages carried by `status.log`.
    ///
    /// A JSON body with a string `code` field is a single message; anything
    /// else is read as one message per non-blank line.
    pub fn status_messages(&self) -> Vec<String> {
        let Some(log) = self.get(STATUS_LOG_PATH) else {
            return Vec::new();
        };

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&log.content) {
            if let Some(code) = value.get("code").and_then(|c| c.as_str()) {
                return vec![code.to_string()];
            }
        }

        log.content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Load every UTF-8 file under `root`, keyed by its `/`-separated relative path.
    pub fn load_dir(root: &Path) -> io::Result<FileSet> {
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            ));
        }

        let mut set = FileSet::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && SKIPPED_DIRS.contains(&&*e.file_name().to_string_lossy()))
            });

        for entry in walker {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let rel = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            match fs::read_to_string(entry.path()) {
                Ok(content) => {
                    set.upsert(&rel, content);
                }
                Err(e) => debug!("skipping {}: {}", rel, e),
            }
        }

        Ok(set)
    }

    /// Write every file (except the status log) below `dir`. Returns the count written.
    pub fn write_to(&self, dir: &Path) -> io::Result<usize> {
        let mut written = 0;
        for file in self.files.iter().filter(|f| f.path != STATUS_LOG_PATH) {
            if file.path.split('/').any(|s| s == "..") {
                warn!("refusing to write {} outside the output directory", file.path);
                continue;
            }
            let target = dir.join(&file.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &file.content)?;
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("src/App.tsx").as_deref(), Some("src/App.tsx"));
        assert_eq!(normalize_path("/src//App.tsx").as_deref(), Some("src/App.tsx"));
        assert_eq!(normalize_path("./src\\App.tsx").as_deref(), Some("src/App.tsx"));
        assert_eq!(normalize_path(""), None);
        assert_eq!(normalize_path("/./"), None);
    }

    #[test]
    fn test_append_concatenates_in_order() {
        let mut set = FileSet::new();
        assert_eq!(set.append("App.tsx", "export default "), FileChange::Created);
        assert_eq!(set.append("App.tsx", "function App(){}"), FileChange::Updated);
        assert_eq!(
            set.get("App.tsx").unwrap().content(),
            "export default function App(){}"
        );
        assert_eq!(set.get("App.tsx").unwrap().revision(), 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_upsert_reports_unchanged() {
        let mut set = FileSet::new();
        set.upsert("a.ts", "x");
        let generation = set.generation();
        assert_eq!(set.upsert("a.ts", "x"), FileChange::Unchanged);
        assert_eq!(set.generation(), generation);
        assert_eq!(set.upsert("a.ts", "y"), FileChange::Updated);
        assert!(set.generation() > generation);
    }

    #[test]
    fn test_insertion_order_and_first() {
        let set = FileSet::from_entries([("status.log", "hi"), ("b.ts", "1"), ("a.ts", "2")]);
        let paths: Vec<&str> = set.paths().collect();
        assert_eq!(paths, vec!["status.log", "b.ts", "a.ts"]);
        assert_eq!(set.first().unwrap().path(), "b.ts");
    }

    #[test]
    fn test_rejects_empty_path() {
        let mut set = FileSet::new();
        assert_eq!(set.append("", "x"), FileChange::Rejected);
        assert!(set.is_empty());
    }

    #[test]
    fn test_reconcile_selection() {
        let set = FileSet::from_entries([("a.ts", "1"), ("b.ts", "2")]);
        assert_eq!(set.reconcile_selection(Some("b.ts")).unwrap().path(), "b.ts");
        assert_eq!(set.reconcile_selection(Some("gone.ts")).unwrap().path(), "a.ts");
        assert_eq!(set.reconcile_selection(None).unwrap().path(), "a.ts");
        assert!(FileSet::new().reconcile_selection(Some("a.ts")).is_none());
    }

    #[test]
    fn test_status_messages() {
        let json = FileSet::from_entries([("status.log", r#"{"code": "Planning files"}"#)]);
        assert_eq!(json.status_messages(), vec!["Planning files".to_string()]);

        let lines = FileSet::from_entries([("status.log", "one\n\n two \n")]);
        assert_eq!(lines.status_messages(), vec!["one".to_string(), "two".to_string()]);

        assert!(FileSet::new().status_messages().is_empty());
    }

    #[test]
    fn test_file_name_and_extension() {
        let set = FileSet::from_entries([("src/App.TSX", ""), (".env", "")]);
        let app = set.get("src/App.TSX").unwrap();
        assert_eq!(app.name(), "App.TSX");
        assert_eq!(app.extension().as_deref(), Some("tsx"));
        assert_eq!(set.get(".env").unwrap().extension(), None);
    }

    #[test]
    fn test_load_and_write_roundtrip_on_disk() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("src/components")).unwrap();
        std::fs::create_dir_all(src.path().join("node_modules/x")).unwrap();
        std::fs::write(src.path().join("src/App.tsx"), "app").unwrap();
        std::fs::write(src.path().join("src/components/Button.tsx"), "btn").unwrap();
        std::fs::write(src.path().join("node_modules/x/index.js"), "skip").unwrap();

        let set = FileSet::load_dir(src.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("src/components/Button.tsx").unwrap().content(), "btn");
        assert!(!set.contains("node_modules/x/index.js"));

        let out = tempfile::tempdir().unwrap();
        assert_eq!(set.write_to(out.path()).unwrap(), 2);
        let written = std::fs::read_to_string(out.path().join("src/App.tsx")).unwrap();
        assert_eq!(written, "app");
    }
}
