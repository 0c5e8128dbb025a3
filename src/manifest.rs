//! `diagram-manifest.json`, an index of the exported views.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifact::{artifact_file_name, ArtifactKind, ImageFormat};
use crate::views::View;
use crate::{ExportError, Result};

pub const MANIFEST_FILE: &str = "diagram-manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub views: Vec<ManifestEntry>,
}

/// One view. File names for both formats are listed whichever format was
/// exported; key names are `null` for image views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub view_type: String,
    pub png: String,
    pub png_key: Option<String>,
    pub svg: String,
    pub svg_key: Option<String>,
}

impl From<&View> for ManifestEntry {
    fn from(view: &View) -> Self {
        let key_name = |format| {
            view.has_key()
                .then(|| artifact_file_name(&view.key, ArtifactKind::Key, format))
        };
        Self {
            key: view.key.clone(),
            title: view.display_title().to_string(),
            view_type: view.view_type.clone(),
            png: artifact_file_name(&view.key, ArtifactKind::Diagram, ImageFormat::Png),
            png_key: key_name(ImageFormat::Png),
            svg: artifact_file_name(&view.key, ArtifactKind::Diagram, ImageFormat::Svg),
            svg_key: key_name(ImageFormat::Svg),
        }
    }
}

impl Manifest {
    pub fn from_views(views: &[View]) -> Self {
        Self {
            views: views.iter().map(ManifestEntry::from).collect(),
        }
    }
}

pub fn write_manifest(dir: &Path, views: &[View]) -> Result<PathBuf> {
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(&Manifest::from_views(views))?;
    fs::write(&path, json).map_err(|source| ExportError::Artifact {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Writes the manifest, logging instead of failing.
pub fn write_manifest_best_effort(dir: &Path, views: &[View]) -> Option<PathBuf> {
    match write_manifest(dir, views) {
        Ok(path) => {
            info!(" - {MANIFEST_FILE}");
            Some(path)
        }
        Err(err) => {
            warn!("Could not write {MANIFEST_FILE}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::tempdir;

    fn views() -> Vec<View> {
        let mut sys = View::new("sys", "SystemContext");
        sys.title = Some("System Context".to_string());
        vec![sys, View::new("img1", "Image")]
    }

    #[test]
    fn entries_list_both_formats_and_null_keys_for_images() {
        let manifest = Manifest::from_views(&views());
        let json = serde_json::to_value(&manifest).unwrap();
        let sys = &json["views"][0];
        assert_eq!(sys["key"], "sys");
        assert_eq!(sys["title"], "System Context");
        assert_eq!(sys["type"], "SystemContext");
        assert_eq!(sys["png"], "sys.png");
        assert_eq!(sys["pngKey"], "sys-key.png");
        assert_eq!(sys["svgKey"], "sys-key.svg");

        let img = &json["views"][1];
        assert_eq!(img["title"], "img1");
        assert_eq!(img["svg"], "img1.svg");
        assert_eq!(img["pngKey"], Value::Null);
        assert_eq!(img["svgKey"], Value::Null);
    }

    #[test]
    fn writes_pretty_json_into_the_directory() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path(), &views()).unwrap();
        assert_eq!(path, dir.path().join(MANIFEST_FILE));
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"views\""));
        let parsed: Manifest = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.views.len(), 2);
    }

    #[test]
    fn best_effort_swallows_failures() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(write_manifest_best_effort(&missing, &views()).is_none());
    }
}
