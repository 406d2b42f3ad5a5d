//! Discovers the accounts this agent serves from a maFiles folder.

use std::path::{Path, PathBuf};

use crate::AgentError;
use crate::store::MaFile;

/// One readable maFile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedAccount {
    pub login: String,
    pub path: PathBuf,
}

/// Lists `*.maFile` files in one directory.
#[derive(Debug, Clone)]
pub struct MaFileScanner {
    dir: PathBuf,
}

impl MaFileScanner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads every maFile in the directory, sorted by login.
    ///
    /// Creates the directory when it does not exist. Files that fail to
    /// parse or lack `account_name` are skipped with a warning; a login
    /// seen twice keeps its first file.
    pub async fn scan(&self) -> Result<Vec<ScannedAccount>, AgentError> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| AgentError::io(&self.dir, e))?;
            tracing::info!(dir = %self.dir.display(), "created empty maFiles directory");
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| AgentError::io(&self.dir, e))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "maFile") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut accounts: Vec<ScannedAccount> = Vec::with_capacity(paths.len());
        for path in paths {
            let login = match MaFile::read(&path).await {
                Ok(mafile) => mafile.account_name.filter(|name| !name.trim().is_empty()),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable maFile");
                    continue;
                }
            };
            let Some(login) = login else {
                tracing::warn!(path = %path.display(), "skipping maFile without account_name");
                continue;
            };
            if accounts.iter().any(|a| a.login.eq_ignore_ascii_case(&login)) {
                tracing::warn!(login, path = %path.display(), "duplicate maFile ignored");
                continue;
            }
            accounts.push(ScannedAccount { login, path });
        }
        accounts.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(accounts)
    }

    /// Just the logins of [`scan`](Self::scan).
    pub async fn logins(&self) -> Result<Vec<String>, AgentError> {
        Ok(self.scan().await?.into_iter().map(|a| a.login).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_reads_account_names_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2.maFile"), r#"{"account_name": "zed"}"#).unwrap();
        std::fs::write(dir.path().join("1.maFile"), r#"{"account_name": "alice"}"#).unwrap();
        std::fs::write(dir.path().join("broken.maFile"), "{").unwrap();
        std::fs::write(dir.path().join("nameless.maFile"), r#"{"shared_secret": "x"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), r#"{"account_name": "ghost"}"#).unwrap();

        let logins = MaFileScanner::new(dir.path()).logins().await.unwrap();
        assert_eq!(logins, vec!["alice", "zed"]);
    }

    #[tokio::test]
    async fn test_scan_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mafiles = dir.path().join("maFiles");

        let accounts = MaFileScanner::new(&mafiles).scan().await.unwrap();
        assert!(accounts.is_empty());
        assert!(mafiles.is_dir());
    }

    #[tokio::test]
    async fn test_scan_drops_case_insensitive_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.maFile"), r#"{"account_name": "Alice"}"#).unwrap();
        std::fs::write(dir.path().join("b.maFile"), r#"{"account_name": "alice"}"#).unwrap();

        let accounts = MaFileScanner::new(dir.path()).scan().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].path, dir.path().join("a.maFile"));
    }
}
