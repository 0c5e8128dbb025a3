//! The views an export job walks through.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::BrowserPage;
use crate::scripting::RenderSurface;
use crate::wait::poll_until;
use crate::{ExportError, Result, Stage};

/// View type that exports as a single image, without a key.
pub const IMAGE_VIEW_TYPE: &str = "Image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub key: String,
    #[serde(rename = "type")]
    pub view_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// A static image view: one artifact.
    Image,
    /// Any rendered diagram: the diagram plus its key.
    Diagram,
}

impl View {
    pub fn new(key: impl Into<String>, view_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            view_type: view_type.into(),
            title: None,
            name: None,
        }
    }

    pub fn kind(&self) -> ViewKind {
        if self.view_type == IMAGE_VIEW_TYPE {
            ViewKind::Image
        } else {
            ViewKind::Diagram
        }
    }

    pub fn has_key(&self) -> bool {
        self.kind() == ViewKind::Diagram
    }

    pub fn artifact_count(&self) -> usize {
        match self.kind() {
            ViewKind::Image => 1,
            ViewKind::Diagram => 2,
        }
    }

    /// Title, else name, else key.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.name.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or(&self.key)
    }
}

/// Number of files a job over `views` must write.
pub fn expected_artifacts(views: &[View]) -> usize {
    views.iter().map(View::artifact_count).sum()
}

/// Rejects keys that cannot name a file inside the output directory and warns
/// about duplicates, which would overwrite each other.
pub fn validate_views(views: &[View]) -> Result<()> {
    let mut seen = HashSet::new();
    for view in views {
        let key = view.key.as_str();
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\'])
            || key.contains('\0')
        {
            return Err(ExportError::Config(format!(
                "view key {key:?} cannot be used as a file name"
            )));
        }
        if !seen.insert(key) {
            warn!("Duplicate view key '{key}'; later exports overwrite earlier files");
        }
    }
    Ok(())
}

/// Waits for the first diagram to render, then fetches the view list once.
pub async fn enumerate_views<P>(
    surface: &RenderSurface<'_, P>,
    interval: Duration,
    readiness_timeout: Duration,
) -> Result<Vec<View>>
where
    P: BrowserPage + ?Sized,
{
    let ready = poll_until(interval, readiness_timeout, || async move {
        Ok(surface
            .is_diagram_rendered(Stage::Readiness)
            .await?
            .then_some(()))
    })
    .await?;
    if ready.is_none() {
        return Err(ExportError::timeout(Stage::Readiness, readiness_timeout));
    }

    let views = surface.views().await?;
    validate_views(&views)?;
    info!("Found {} views to export", views.len());
    Ok(views)
}
