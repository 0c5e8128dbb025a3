//! Finds the frame that exposes the scripting API.
//!
//! The viewer may embed the diagram canvas in an iframe, and that iframe can
//! appear some time after the page loads, so the frame list is re-read on
//! every poll.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{BrowserPage, FrameHandle, WaitUntil};
use crate::scripting::{at_stage, scripts, RenderSurface};
use crate::wait::poll_until;
use crate::{ExportError, Result, Stage};

/// Opens the viewer and polls its frames until one has
/// `window.structurizr.scripting`.
pub async fn locate_render_surface<'p, P>(
    page: &'p P,
    viewer: &Url,
    navigation_timeout: Duration,
    interval: Duration,
    discovery_timeout: Duration,
) -> Result<RenderSurface<'p, P>>
where
    P: BrowserPage + ?Sized,
{
    info!(" - Opening {viewer}");
    page.goto(viewer.as_str(), WaitUntil::DomContentLoaded, navigation_timeout)
        .await
        .map_err(|err| at_stage(err, Stage::Navigation))?;

    let found = poll_until(interval, discovery_timeout, || async move {
        let frames = page
            .frames()
            .await
            .map_err(|err| at_stage(err, Stage::Discovery))?;
        Ok(first_scripting_frame(page, frames).await)
    })
    .await?;

    match found {
        Some(frame) => {
            debug!(frame = frame.id, url = %frame.url, "render surface located");
            Ok(RenderSurface::new(page, frame))
        }
        None => {
            report_frames(page).await;
            Err(ExportError::timeout(Stage::Discovery, discovery_timeout))
        }
    }
}

async fn first_scripting_frame<P>(page: &P, frames: Vec<FrameHandle>) -> Option<FrameHandle>
where
    P: BrowserPage + ?Sized,
{
    for frame in frames {
        match page.evaluate(&frame, scripts::HAS_SCRIPTING, Value::Null).await {
            Ok(Value::Bool(true)) => return Some(frame),
            Ok(_) => {}
            // Detached or cross-origin frames throw; treat them as not ready.
            Err(err) => debug!(frame = frame.id, url = %frame.url, "probe failed: {err}"),
        }
    }
    None
}

async fn report_frames<P>(page: &P)
where
    P: BrowserPage + ?Sized,
{
    match page.frames().await {
        Ok(frames) => {
            warn!(
                "structurizr.scripting not found in any of {} frame(s)",
                frames.len()
            );
            for frame in &frames {
                let title = page
                    .evaluate(frame, scripts::DOCUMENT_TITLE, Value::Null)
                    .await
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                warn!("   frame {}: {} {:?}", frame.id, frame.url, title);
            }
        }
        Err(err) => warn!("structurizr.scripting not found; frames unavailable: {err}"),
    }
}
