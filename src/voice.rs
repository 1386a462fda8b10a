//! Voice/model resolution.
//!
//! A voices directory holds `<voice>.onnx` models, each with its
//! `<voice>.onnx.json` configuration sidecar next to it. Models may sit in
//! nested directories.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::ValidationError;

/// File extension of voice models.
pub const MODEL_EXTENSION: &str = "onnx";

/// Resolved on-disk files of a voice. Both paths existed at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelLocation {
    pub model_path: PathBuf,
    pub config_path: PathBuf,
}

/// Resolve `name` to its model and configuration under `voice_dir`.
///
/// The match is exact and case-sensitive. When the name exists in several
/// subdirectories the lexicographically first path is used.
pub fn resolve(name: &str, voice_dir: &Path) -> Result<ModelLocation, ValidationError> {
    if !voice_dir.is_dir() {
        return Err(ValidationError::VoiceDirNotFound(voice_dir.to_path_buf()));
    }

    let not_found = || ValidationError::VoiceNotFound {
        name: name.to_string(),
        dir: voice_dir.to_path_buf(),
    };

    if !is_plain_name(name) {
        return Err(not_found());
    }

    let file_name = format!("{name}.{MODEL_EXTENSION}");
    let model_path = model_files(voice_dir)
        .find(|entry| entry.file_name() == file_name.as_str())
        .map(DirEntry::into_path)
        .ok_or_else(not_found)?;
    let config_path = sidecar_path(&model_path);
    if !config_path.is_file() {
        return Err(ValidationError::ConfigNotFound {
            name: name.to_string(),
            path: config_path,
        });
    }

    log::debug!(
        "Resolved voice '{}' to {}",
        name,
        model_path.display()
    );
    Ok(ModelLocation {
        model_path,
        config_path,
    })
}

/// Names of all voice models under `voice_dir`, sorted and without
/// duplicates. A missing directory yields an empty list.
pub fn discover_voices(voice_dir: &Path) -> Vec<String> {
    model_files(voice_dir)
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `<model>.json` next to the model file.
pub fn sidecar_path(model_path: &Path) -> PathBuf {
    let mut os = model_path.as_os_str().to_owned();
    os.push(".json");
    PathBuf::from(os)
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

/// Model files under `voice_dir`, depth first with siblings sorted by name.
/// Unreadable entries are skipped.
fn model_files(voice_dir: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(voice_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path().extension().and_then(|x| x.to_str()) == Some(MODEL_EXTENSION)
        })
}
