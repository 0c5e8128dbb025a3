//! The per-view export loop.

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::artifact::{artifact_file_name, ArtifactKind, ArtifactWriter, ImageFormat};
use crate::browser::BrowserPage;
use crate::job::ExportJob;
use crate::scripting::RenderSurface;
use crate::views::View;
use crate::wait::poll_until;
use crate::{ExportError, Result, Stage};

/// Exports every view of `job` in order, one at a time.
///
/// Each successful write is recorded on the job's tracker. The first failure
/// ends the loop; later views are not attempted.
pub async fn export_views<P>(
    surface: &RenderSurface<'_, P>,
    job: &mut ExportJob,
    writer: &ArtifactWriter,
    interval: Duration,
    render_timeout: Duration,
) -> Result<Vec<PathBuf>>
where
    P: BrowserPage + ?Sized,
{
    let mut written = Vec::with_capacity(job.tracker.expected());
    let format = job.format;
    for view in &job.views {
        debug!(key = %view.key, view_type = %view.view_type, "exporting view");
        surface.change_view(&view.key).await?;
        wait_for_render(surface, &view.key, interval, render_timeout).await?;

        let diagram = export_artifact(surface, writer, view, ArtifactKind::Diagram, format).await?;
        job.tracker.record();
        written.push(diagram);

        if view.has_key() {
            let key = export_artifact(surface, writer, view, ArtifactKind::Key, format).await?;
            job.tracker.record();
            written.push(key);
        }
    }
    Ok(written)
}

async fn wait_for_render<P>(
    surface: &RenderSurface<'_, P>,
    key: &str,
    interval: Duration,
    render_timeout: Duration,
) -> Result<()>
where
    P: BrowserPage + ?Sized,
{
    let stage = Stage::Render(key.to_string());
    let rendered = poll_until(interval, render_timeout, || {
        let stage = stage.clone();
        async move { Ok(surface.is_diagram_rendered(stage).await?.then_some(())) }
    })
    .await?;
    rendered.ok_or_else(|| ExportError::timeout(stage, render_timeout))
}

async fn export_artifact<P>(
    surface: &RenderSurface<'_, P>,
    writer: &ArtifactWriter,
    view: &View,
    kind: ArtifactKind,
    format: ImageFormat,
) -> Result<PathBuf>
where
    P: BrowserPage + ?Sized,
{
    let file_name = artifact_file_name(&view.key, kind, format);
    match (format, kind) {
        (ImageFormat::Svg, ArtifactKind::Diagram) => {
            let svg = surface.export_svg(&view.key).await?;
            writer.write_svg(&file_name, &svg)
        }
        (ImageFormat::Svg, ArtifactKind::Key) => {
            let svg = surface.export_key_svg(&view.key).await?;
            writer.write_svg(&file_name, &svg)
        }
        (ImageFormat::Png, ArtifactKind::Diagram) => {
            let png = surface.export_png(&view.key).await?;
            writer.write_png(&file_name, &png)
        }
        (ImageFormat::Png, ArtifactKind::Key) => {
            let png = surface.export_key_png(&view.key).await?;
            writer.write_png(&file_name, &png)
        }
    }
}
