// Directory helpers: translate every .plist under a directory into one JSON map
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{EncodeError, TranslateError};
use crate::normalize::BookmarkNode;
use crate::translate::{TranslateOpts, translate_to_node};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Translated(BookmarkNode),
    Failed {
        #[serde(rename = "$error")]
        error: String,
    },
}

pub fn find_plist_files(dir: &Path) -> Result<Vec<PathBuf>, TranslateError> {
    if !dir.is_dir() {
        return Err(TranslateError::Io {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| TranslateError::Io {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: io::Error::other(e.to_string()),
        })?;
        let p = entry.path();
        let is_plist = p
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("plist"));
        if entry.file_type().is_file() && is_plist {
            out.push(p.to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

/// Each file is translated on its own; a failing file becomes a `$error`
/// entry instead of aborting the batch. Keys are `/`-separated relative paths.
pub fn translate_dir(
    dir: &Path,
    opts: &TranslateOpts,
) -> Result<BTreeMap<String, BatchEntry>, TranslateError> {
    let files = find_plist_files(dir)?;
    debug!(count = files.len(), dir = %dir.display(), "batch translating");
    let mut out = BTreeMap::new();
    for f in files {
        let name = f
            .strip_prefix(dir)
            .unwrap_or(&f)
            .to_string_lossy()
            .replace('\\', "/");
        let res = fs::read(&f)
            .map_err(|source| TranslateError::Io {
                path: f.clone(),
                source,
            })
            .and_then(|bytes| translate_to_node(&bytes, opts));
        let entry = match res {
            Ok(node) => BatchEntry::Translated(node),
            Err(e) => {
                warn!(file = %f.display(), error = %e, "skipping file");
                BatchEntry::Failed {
                    error: e.to_string(),
                }
            }
        };
        out.insert(name, entry);
    }
    Ok(out)
}

pub fn batch_to_json(entries: &BTreeMap<String, BatchEntry>) -> Result<Vec<u8>, EncodeError> {
    let mut out = serde_json::to_vec_pretty(entries)?;
    out.push(b'\n');
    Ok(out)
}
