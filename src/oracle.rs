/// Workspace oracles: the read-only capabilities the safety analyzer
/// calls but does not own.
///
/// The analyzer never touches the filesystem directly; everything goes
/// through [`WorkspaceOracle`] so hosts can substitute their own index
/// and tests can substitute a deterministic mock.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;
use thiserror::Error;
use tracing::debug;

/// Errors from oracle lookups.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workspace walk failed: {0}")]
    Walk(String),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Async read-only view of the workspace.
///
/// All implementations must be `Send + Sync` to allow use behind `Arc`.
/// Paths are workspace-relative with forward slashes.
#[async_trait]
pub trait WorkspaceOracle: Send + Sync {
    /// Whether the target path currently exists.
    async fn path_exists(&self, path: &str) -> Result<bool, OracleError>;

    /// Files whose import-like lines reference the given path (best
    /// effort, textual scan, not an exhaustive dependency resolution).
    async fn find_dependents(&self, path: &str) -> Result<Vec<String>, OracleError>;

    /// Files in the target's directory with confusably similar stems.
    async fn similar_files(&self, path: &str) -> Result<Vec<String>, OracleError>;

    /// Every file in the workspace, relative paths. Feeds pathless-block
    /// inference.
    async fn list_files(&self) -> Result<Vec<String>, OracleError>;
}

// ── Filesystem-backed oracle ─────────────────────────────────────────

/// Oracle backed by a real workspace root.
///
/// Walks respect `.gitignore`; scans are plain text, line-oriented.
pub struct FsOracle {
    root: PathBuf,
}

impl FsOracle {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Walk the workspace, collecting relative file paths.
    fn walk_files(root: &Path) -> Result<Vec<String>, OracleError> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(root).hidden(false).build();
        for entry in walker {
            let entry = entry.map_err(|e| OracleError::Walk(e.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(root) {
                files.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl WorkspaceOracle for FsOracle {
    async fn path_exists(&self, path: &str) -> Result<bool, OracleError> {
        let full = self.resolve(path);
        Ok(tokio::fs::try_exists(&full).await?)
    }

    async fn find_dependents(&self, path: &str) -> Result<Vec<String>, OracleError> {
        let root = self.root.clone();
        let target = path.to_string();
        // The walk and per-file reads are blocking; keep them off the
        // async executor.
        tokio::task::spawn_blocking(move || {
            let stem = Path::new(&target)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&target)
                .to_string();
            let mut dependents = Vec::new();

            for rel in Self::walk_files(&root)? {
                if rel == target {
                    continue;
                }
                let Ok(content) = std::fs::read_to_string(root.join(&rel)) else {
                    continue; // binary or unreadable; not a dependent
                };
                let imports = content.lines().any(|line| {
                    let l = line.trim_start();
                    (l.starts_with("import")
                        || l.starts_with("from ")
                        || l.starts_with("use ")
                        || l.contains("require("))
                        && l.contains(&stem)
                });
                if imports {
                    dependents.push(rel);
                }
            }
            debug!(target = %target, count = dependents.len(), "dependent scan");
            Ok(dependents)
        })
        .await
        .map_err(|e| OracleError::Unavailable(e.to_string()))?
    }

    async fn similar_files(&self, path: &str) -> Result<Vec<String>, OracleError> {
        let target = path.to_string();
        let dir = self
            .resolve(path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || {
            let wanted = fold_stem(&target);
            if wanted.is_empty() {
                return Ok(Vec::new());
            }
            let mut similar = Vec::new();
            if !dir.is_dir() {
                return Ok(similar);
            }
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.path().is_file() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&root)
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|_| entry.path().to_string_lossy().to_string());
                if rel == target {
                    continue;
                }
                let candidate = fold_stem(&rel);
                if candidate == wanted
                    || candidate.contains(&wanted)
                    || wanted.contains(&candidate)
                {
                    similar.push(rel);
                }
            }
            Ok(similar)
        })
        .await
        .map_err(|e| OracleError::Unavailable(e.to_string()))?
    }

    async fn list_files(&self) -> Result<Vec<String>, OracleError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::walk_files(&root))
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?
    }
}

/// Case-and-separator-insensitive file stem, for similarity checks.
fn fold_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

// ── Mock oracle ──────────────────────────────────────────────────────

/// Deterministic in-memory oracle for tests and offline analysis.
#[derive(Default)]
pub struct MockOracle {
    existing: HashSet<String>,
    dependents: HashMap<String, Vec<String>>,
    similar: HashMap<String, Vec<String>>,
    failing: bool,
}

impl MockOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existing.extend(files.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_dependents(mut self, path: &str, dependents: Vec<String>) -> Self {
        self.dependents.insert(path.to_string(), dependents);
        self
    }

    #[must_use]
    pub fn with_similar(mut self, path: &str, similar: Vec<String>) -> Self {
        self.similar.insert(path.to_string(), similar);
        self
    }

    /// Make every lookup fail, for exercising the analyzer's
    /// inconclusive path.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn check(&self) -> Result<(), OracleError> {
        if self.failing {
            return Err(OracleError::Unavailable("mock oracle set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkspaceOracle for MockOracle {
    async fn path_exists(&self, path: &str) -> Result<bool, OracleError> {
        self.check()?;
        Ok(self.existing.contains(path))
    }

    async fn find_dependents(&self, path: &str) -> Result<Vec<String>, OracleError> {
        self.check()?;
        Ok(self.dependents.get(path).cloned().unwrap_or_default())
    }

    async fn similar_files(&self, path: &str) -> Result<Vec<String>, OracleError> {
        self.check()?;
        Ok(self.similar.get(path).cloned().unwrap_or_default())
    }

    async fn list_files(&self) -> Result<Vec<String>, OracleError> {
        self.check()?;
        let mut files: Vec<String> = self.existing.iter().cloned().collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fs_oracle_path_exists() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.ts"), "export const a = 1;").unwrap();

        let oracle = FsOracle::new(dir.path());
        assert!(oracle.path_exists("src/a.ts").await.unwrap());
        assert!(!oracle.path_exists("src/missing.ts").await.unwrap());
    }

    #[tokio::test]
    async fn test_fs_oracle_find_dependents() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/date.ts"), "export const now = 1;").unwrap();
        fs::write(
            dir.path().join("src/app.ts"),
            "import { now } from './date';\nconsole.log(now);",
        )
        .unwrap();
        fs::write(dir.path().join("src/other.ts"), "const unrelated = 2;").unwrap();

        let oracle = FsOracle::new(dir.path());
        let deps = oracle.find_dependents("src/date.ts").await.unwrap();
        assert_eq!(deps, vec!["src/app.ts"]);
    }

    #[tokio::test]
    async fn test_fs_oracle_similar_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/user-service.ts"), "").unwrap();
        fs::write(dir.path().join("src/userservice.ts"), "").unwrap();
        fs::write(dir.path().join("src/unrelated.ts"), "").unwrap();

        let oracle = FsOracle::new(dir.path());
        let similar = oracle.similar_files("src/user-service.ts").await.unwrap();
        assert_eq!(similar, vec!["src/userservice.ts"]);
    }

    #[tokio::test]
    async fn test_fs_oracle_list_files_relative() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.ts"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let oracle = FsOracle::new(dir.path());
        let mut files = oracle.list_files().await.unwrap();
        files.sort();
        assert_eq!(files, vec!["README.md", "src/a.ts"]);
    }

    #[tokio::test]
    async fn test_mock_oracle_failing() {
        let oracle = MockOracle::new().failing();
        assert!(oracle.path_exists("anything").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_oracle_lookups() {
        let oracle = MockOracle::new()
            .with_files(["src/a.ts"])
            .with_dependents("src/a.ts", vec!["src/b.ts".to_string()]);
        assert!(oracle.path_exists("src/a.ts").await.unwrap());
        assert_eq!(
            oracle.find_dependents("src/a.ts").await.unwrap(),
            vec!["src/b.ts"]
        );
        assert!(oracle.similar_files("src/a.ts").await.unwrap().is_empty());
    }
}
