//! Diagram Export (dexport) Library
//!
//! Bulk export of Structurizr diagrams to PNG or SVG. A job signs in when
//! credentials are given, finds the frame exposing the viewer's scripting
//! API, enumerates the workspace views and exports each one through that API,
//! writing `{key}.{ext}` and, for diagram views, `{key}-key.{ext}`.
//!
//! # Module Overview
//!
//! - [`browser`] - The page seam and the Playwright-backed implementation
//! - [`auth`] - Optional sign-in
//! - [`locator`] - Render surface discovery across frames
//! - [`views`] - View model, readiness wait and enumeration
//! - [`export`] - The per-view export loop
//! - [`job`] - Expected vs. written artifact counts
//! - [`manifest`] - `diagram-manifest.json`
//! - [`exporter`] - Whole-job orchestration with deadline and cancellation
//! - [`config`] - Configuration file and environment overrides
//!
//! # Example
//!
//! ```no_run
//! use dexport_lib::{parse_target, run_export, Config, ExportRequest, ImageFormat};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> dexport_lib::Result<()> {
//! let target = parse_target("https://structurizr.example.com/workspace/1")?;
//! let request = ExportRequest::new(target, ImageFormat::Svg);
//! let report = run_export(&request, &Config::default(), CancellationToken::new()).await?;
//! println!("wrote {} files", report.actual);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod auth;
pub mod browser;
pub mod config;
pub mod error;
pub mod export;
pub mod exporter;
pub mod job;
pub mod locator;
pub mod logging;
pub mod manifest;
pub mod scripting;
pub mod target;
pub mod viewport;
pub mod views;
pub mod wait;

pub use artifact::{artifact_file_name, decode_png_data_uri, ArtifactKind, ArtifactWriter, ImageFormat};
pub use auth::{authenticate, AuthOutcome, Credentials};
pub use browser::{BrowserOptions, BrowserPage, FrameHandle, PlaywrightSession, WaitUntil};
pub use config::{Config, Timeouts};
pub use error::{ErrorCategory, ErrorPayload, ExportError, Result, Stage};
pub use exporter::{export_with_deadline, export_with_page, run_export, ExportReport, ExportRequest};
pub use job::{CompletionTracker, ExportJob};
pub use locator::locate_render_surface;
pub use logging::{init_logging, LogFormat};
pub use manifest::{write_manifest, Manifest, ManifestEntry, MANIFEST_FILE};
pub use scripting::RenderSurface;
pub use target::{parse_target, viewer_url};
pub use viewport::Viewport;
pub use views::{enumerate_views, expected_artifacts, View, IMAGE_VIEW_TYPE};
