// ── JSON/text document store ──
//
// Reads tolerate a missing file (`Ok(None)`); writes go to a staging file
// next to the target and are renamed over it. Files under a directory the
// process cannot write to are installed through `sudo install` when that
// is configured.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sbpolicy_core::CoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::command::Runner;
use crate::error::HostError;

const INSTALL: &str = "/usr/bin/install";

/// Pretty-printed JSON with two-space indent and a trailing newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HostError> {
    let mut text = serde_json::to_string_pretty(value).map_err(CoreError::Json)?;
    text.push('\n');
    Ok(text)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentStore {
    install_with_sudo: bool,
    dry_run: bool,
}

impl DocumentStore {
    pub fn new(install_with_sudo: bool) -> Self {
        Self {
            install_with_sudo,
            dry_run: false,
        }
    }

    /// Never touch the filesystem on write; log what would have been written.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, HostError> {
        let Some(text) = read_optional(path).await? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| HostError::Parse {
                path: path.to_owned(),
                source,
            })
    }

    /// Read a file that must exist.
    pub async fn read_text(&self, path: &Path) -> Result<String, HostError> {
        read_optional(path).await?.ok_or_else(|| HostError::Missing {
            path: path.to_owned(),
        })
    }

    /// Read a document, or persist and return `seed()` when there is none
    /// yet. The flag is `true` when the document was seeded.
    pub async fn load_or_seed<T>(
        &self,
        path: &Path,
        seed: impl FnOnce() -> T,
    ) -> Result<(T, bool), HostError>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(document) = self.read_json(path).await? {
            return Ok((document, false));
        }
        let document = seed();
        info!(path = %path.display(), "seeding default document");
        self.write_json(path, &document).await?;
        Ok((document, true))
    }

    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), HostError> {
        let text = to_pretty_json(value)?;
        self.write_text(path, &text).await
    }

    pub async fn write_text(&self, path: &Path, text: &str) -> Result<(), HostError> {
        if self.dry_run {
            info!(path = %path.display(), bytes = text.len(), "dry run: skipping write");
            return Ok(());
        }

        match write_atomic(path, text).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = text.len(), "wrote document");
                Ok(())
            }
            Err(source) if source.kind() == ErrorKind::PermissionDenied && self.install_with_sudo => {
                warn!(path = %path.display(), "direct write denied, installing with sudo");
                install_privileged(path, text).await
            }
            Err(source) => Err(HostError::Write {
                path: path.to_owned(),
                source,
            }),
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, HostError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(HostError::Read {
            path: path.to_owned(),
            source,
        }),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "document".to_owned(), |name| name.to_string_lossy().into_owned())
}

fn staging_path(path: &Path) -> PathBuf {
    path.with_file_name(format!(".{}.{}.tmp", file_name(path), std::process::id()))
}

async fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let staging = staging_path(path);
    let result = async {
        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(text.as_bytes()).await?;
        // contents must be durable before the rename makes them visible
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, path).await
    }
    .await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&staging).await;
    }
    result
}

async fn install_privileged(path: &Path, text: &str) -> Result<(), HostError> {
    let staging = std::env::temp_dir().join(format!(
        "sbpolicy-{}-{}",
        std::process::id(),
        file_name(path)
    ));
    tokio::fs::write(&staging, text)
        .await
        .map_err(|source| HostError::Write {
            path: staging.clone(),
            source,
        })?;

    let source = staging.to_string_lossy();
    let target = path.to_string_lossy();
    let result = Runner::new(true)
        .run(INSTALL, &["-m", "0644", &source, &target])
        .await;
    let _ = tokio::fs::remove_file(&staging).await;
    result.map(|_| ())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::default();
        let value: Option<Value> = store.read_json(&dir.path().join("absent.json")).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn writes_pretty_json_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/doc.json");
        let store = DocumentStore::default();

        store.write_json(&path, &json!({"a": [1]})).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"a\": [\n    1\n  ]\n}\n");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        let store = DocumentStore::default();

        store.write_text(&path, "first\n").await.unwrap();
        store.write_text(&path, "second\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("inside"), "x").unwrap();

        let err = DocumentStore::default()
            .write_text(&path, "text")
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Write { .. }));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("taken")]);
    }

    #[tokio::test]
    async fn invalid_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = DocumentStore::default()
            .read_json::<Value>(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn seeds_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeded.json");
        let store = DocumentStore::default();

        let (first, seeded) = store.load_or_seed(&path, || json!({"v": 1})).await.unwrap();
        assert!(seeded);
        let (second, seeded) = store.load_or_seed(&path, || json!({"v": 2})).await.unwrap();
        assert!(!seeded);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        DocumentStore::default()
            .dry_run(true)
            .write_json(&path, &json!({}))
            .await
            .unwrap();
        assert!(!path.exists());
    }
}
