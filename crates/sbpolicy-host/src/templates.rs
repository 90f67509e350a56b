// ── Saved VLESS link templates ──
//
// One JSON file per template, `{ "name": ..., "vless": ... }`, named
// `<sanitized name>[-N].json` inside the templates directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sbpolicy_core::{CoreError, link};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::HostError;
use crate::store::DocumentStore;

const FALLBACK_NAME: &str = "vless-template";
const EXTENSION: &str = ".json";

/// Listing entry; the link itself is only returned by [`TemplateStore::read`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub vless: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    vless: Option<String>,
}

/// `^[A-Za-z0-9._-]+\.json$`
pub fn is_template_id(id: &str) -> bool {
    id.strip_suffix(EXTENSION).is_some_and(|stem| {
        !stem.is_empty()
            && stem
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    })
}

/// Replace each run of chars matching `replace` with a single `_`.
fn collapse_runs(text: &str, replace: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if replace(ch) {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

/// File stem for a display name: path separators and `#` become `_`, any
/// other run outside `[A-Za-z0-9_.-]` becomes `_`, and leading/trailing
/// `_`/`-` are trimmed.
pub fn sanitize_file_stem(name: &str) -> String {
    let separators = collapse_runs(name.trim(), |ch| matches!(ch, '#' | '/' | '\\'));
    let cleaned = collapse_runs(&separators, |ch| {
        !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
    });
    let trimmed = cleaned.trim_matches(|ch| ch == '_' || ch == '-');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
    store: DocumentStore,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>, store: DocumentStore) -> Self {
        Self {
            dir: dir.into(),
            store,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> Result<(), HostError> {
        if self.store.is_dry_run() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| HostError::Write {
                path: self.dir.clone(),
                source,
            })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, HostError> {
        if !is_template_id(id) {
            return Err(CoreError::not_found("template", id).into());
        }
        Ok(self.dir.join(id))
    }

    /// Valid templates sorted by name. Unreadable files are skipped.
    pub async fn list(&self) -> Result<Vec<TemplateEntry>, HostError> {
        self.ensure_dir().await?;
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HostError::Read {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|source| HostError::Read {
            path: self.dir.clone(),
            source,
        })? {
            let id = entry.file_name().to_string_lossy().into_owned();
            if !is_template_id(&id) {
                continue;
            }
            let file: TemplateFile = match self.store.read_json(&entry.path()).await {
                Ok(Some(file)) => file,
                Ok(None) | Err(_) => {
                    debug!(id = %id, "skipping unreadable template");
                    continue;
                }
            };
            let created_at = entry
                .metadata()
                .await
                .ok()
                .and_then(|meta| meta.created().or_else(|_| meta.modified()).ok())
                .map(DateTime::<Utc>::from);
            let name = file
                .name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| id.trim_end_matches(EXTENSION).to_owned());
            entries.push(TemplateEntry {
                id,
                name,
                created_at,
            });
        }

        entries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(entries)
    }

    pub async fn read(&self, id: &str) -> Result<Template, HostError> {
        let path = self.path_for(id)?;
        let file: TemplateFile = self
            .store
            .read_json(&path)
            .await?
            .ok_or_else(|| CoreError::not_found("template", id))?;
        let vless = file
            .vless
            .filter(|vless| !vless.is_empty())
            .ok_or_else(|| CoreError::validation("Template missing vless string"))?;
        Ok(Template {
            id: id.to_owned(),
            name: file.name.unwrap_or_default(),
            vless,
        })
    }

    /// Validate the link and store it under a fresh file name.
    pub async fn save(&self, name: Option<&str>, vless: &str) -> Result<TemplateEntry, HostError> {
        let vless = vless.trim();
        link::decode(vless)?;
        self.ensure_dir().await?;

        let display_name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .or_else(|| link::display_name(vless))
            .unwrap_or_else(|| FALLBACK_NAME.to_owned());
        let stem = sanitize_file_stem(&display_name);

        let mut index = 0_u32;
        let id = loop {
            let candidate = if index == 0 {
                format!("{stem}{EXTENSION}")
            } else {
                format!("{stem}-{index}{EXTENSION}")
            };
            let taken = tokio::fs::try_exists(self.dir.join(&candidate))
                .await
                .map_err(|source| HostError::Read {
                    path: self.dir.clone(),
                    source,
                })?;
            if !taken {
                break candidate;
            }
            index += 1;
        };

        let file = TemplateFile {
            name: Some(display_name.clone()),
            vless: Some(vless.to_owned()),
        };
        self.store.write_json(&self.dir.join(&id), &file).await?;
        info!(id = %id, "saved link template");
        Ok(TemplateEntry {
            id,
            name: display_name,
            created_at: Some(Utc::now()),
        })
    }

    pub async fn delete(&self, id: &str) -> Result<(), HostError> {
        let path = self.path_for(id)?;
        if self.store.is_dry_run() {
            info!(id = %id, "dry run: skipping template delete");
            return Ok(());
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(id = %id, "deleted link template");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(CoreError::not_found("template", id).into())
            }
            Err(source) => Err(HostError::Write { path, source }),
        }
    }
}
