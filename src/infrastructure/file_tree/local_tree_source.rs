// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Local directory tree as an enumerable source.
//!
//! Listing walks `<root>/<object>` and keeps regular files whose file name
//! matches the pattern. Item names are paths relative to that base, with `/`
//! separators, sorted so repeated listings partition identically. Reading a
//! partition yields one document per file: `path`, `name`, `size` and
//! `timestamp` (seconds since the epoch).

use crate::domain::entities::{Document, Item};
use crate::domain::errors::{ConnectorError, Result};
use crate::ports::source_port::{Cursor, EnumerableSource};
use log::{debug, warn};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

pub struct LocalTreeSource {
    base: PathBuf,
}

impl LocalTreeSource {
    pub fn new(root: impl AsRef<Path>, object: &str) -> Self {
        let base = if object.is_empty() {
            root.as_ref().to_path_buf()
        } else {
            root.as_ref().join(object.trim_start_matches('/'))
        };
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn walk(&self, dir: &Path, prefix: &str, pattern: &Regex, recursive: bool, out: &mut Vec<Item>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let relative = if prefix.is_empty() {
                file_name.clone()
            } else {
                format!("{}/{}", prefix, file_name)
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if recursive {
                    self.walk(&entry.path(), &relative, pattern, recursive, out)?;
                }
            } else if file_type.is_file() && pattern.is_match(&file_name) {
                let meta = entry.metadata()?;
                out.push(Item {
                    name: relative,
                    size: meta.len(),
                    timestamp: modified_secs(&meta),
                });
            } else {
                debug!("Skipping {}", entry.path().display());
            }
        }
        Ok(())
    }
}

fn modified_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl EnumerableSource for LocalTreeSource {
    fn list(&self, pattern: &Regex, recursive: bool) -> Result<Vec<Item>> {
        if !self.base.is_dir() {
            return Err(ConnectorError::Source(format!(
                "{} is not a directory",
                self.base.display()
            )));
        }
        let mut items = Vec::new();
        self.walk(&self.base, "", pattern, recursive, &mut items)?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn open_items(&self, items: &[Item]) -> Result<Cursor> {
        let base = self.base.clone();
        let cursor = items.to_vec().into_iter().map(move |item| -> Result<Document> {
            let path = base.join(&item.name);
            let meta = fs::metadata(&path).map_err(|e| {
                ConnectorError::Source(format!("{}: {}", path.display(), e))
            })?;
            if meta.len() != item.size {
                warn!(
                    "{} changed size since listing ({} -> {})",
                    item.name,
                    item.size,
                    meta.len()
                );
            }
            let name = Path::new(&item.name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| item.name.clone());
            let mut doc = Document::new();
            doc.insert("path".into(), Value::from(item.name));
            doc.insert("name".into(), Value::from(name));
            doc.insert("size".into(), Value::from(meta.len()));
            doc.insert("timestamp".into(), Value::from(modified_secs(&meta)));
            Ok(doc)
        });
        Ok(Box::new(cursor))
    }
}
