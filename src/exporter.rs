//! Runs a whole export job against a browser page.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::artifact::{ArtifactWriter, ImageFormat};
use crate::auth::{authenticate, AuthOutcome, Credentials};
use crate::browser::{BrowserOptions, BrowserPage, PlaywrightSession};
use crate::export::export_views;
use crate::job::ExportJob;
use crate::locator::locate_render_surface;
use crate::manifest::write_manifest_best_effort;
use crate::target::viewer_url;
use crate::views::enumerate_views;
use crate::{Config, ExportError, Result, Stage};

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub target: Url,
    pub format: ImageFormat,
    pub credentials: Option<Credentials>,
}

impl ExportRequest {
    pub fn new(target: Url, format: ImageFormat) -> Self {
        Self {
            target,
            format,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Summary of a finished job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub viewer_url: String,
    pub format: ImageFormat,
    pub output_dir: PathBuf,
    pub auth: AuthOutcome,
    pub views: usize,
    pub expected: usize,
    pub actual: usize,
    pub files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    pub elapsed_ms: u64,
}

/// Sign in, find the render surface, export every view, then write the
/// manifest. Does not close `page`.
pub async fn export_with_page<P>(
    page: &P,
    request: &ExportRequest,
    config: &Config,
) -> Result<ExportReport>
where
    P: BrowserPage + ?Sized,
{
    let started = Instant::now();
    let timeouts = &config.timeouts;

    let auth = authenticate(
        page,
        &request.target,
        request.credentials.as_ref(),
        timeouts.navigation,
        timeouts.login,
        timeouts.poll_interval,
    )
    .await?;

    let viewer = viewer_url(&request.target);
    let surface = locate_render_surface(
        page,
        &viewer,
        timeouts.navigation,
        timeouts.poll_interval,
        timeouts.discovery,
    )
    .await?;
    let views = enumerate_views(&surface, timeouts.poll_interval, timeouts.readiness).await?;

    let mut job = ExportJob::new(request.format, views);
    info!(
        " - Starting export of {} views ({} files)",
        job.views.len(),
        job.tracker.expected()
    );
    let writer = ArtifactWriter::new(&config.output_dir);
    let files = export_views(
        &surface,
        &mut job,
        &writer,
        timeouts.poll_interval,
        timeouts.render,
    )
    .await?;
    job.tracker.verify()?;

    let manifest = if config.manifest {
        write_manifest_best_effort(writer.dir(), &job.views)
    } else {
        None
    };
    info!(" - Finished");

    Ok(ExportReport {
        viewer_url: viewer.to_string(),
        format: request.format,
        output_dir: config.output_dir.clone(),
        auth,
        views: job.views.len(),
        expected: job.tracker.expected(),
        actual: job.tracker.actual(),
        files,
        manifest,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

/// [`export_with_page`] bounded by the job timeout and `cancel`. The page is
/// closed on every path.
pub async fn export_with_deadline<P>(
    page: &P,
    request: &ExportRequest,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ExportReport>
where
    P: BrowserPage + ?Sized,
{
    let limit = config.timeouts.job;
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ExportError::Cancelled),
        result = tokio::time::timeout(limit, export_with_page(page, request, config)) => {
            result.unwrap_or_else(|_| Err(ExportError::timeout(Stage::Job, limit)))
        }
    };

    if let Err(err) = page.close().await {
        warn!("Failed to close browser: {err}");
    }
    outcome
}

/// Launches Chromium through the Playwright helper and runs one job.
pub async fn run_export(
    request: &ExportRequest,
    config: &Config,
    cancel: CancellationToken,
) -> Result<ExportReport> {
    config.validate()?;
    let options = BrowserOptions::from(config);
    let session = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ExportError::Cancelled),
        session = PlaywrightSession::launch(options) => session?,
    };
    export_with_deadline(&session, request, config, &cancel).await
}
