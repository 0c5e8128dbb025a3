//! Typed access to the diagramming tool's in-page scripting API.
//!
//! A [`RenderSurface`] is the frame in which `window.structurizr.scripting`
//! was found, paired with the page it lives in. Every remote call goes through
//! here so that failures are tagged with the stage that issued them.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::browser::{BrowserPage, FrameHandle};
use crate::views::View;
use crate::{ExportError, Result, Stage};

/// Function bodies evaluated in the render surface. The single argument is
/// bound to `arg`.
pub mod scripts {
    pub const HAS_SCRIPTING: &str =
        "return !!(window.structurizr && window.structurizr.scripting);";

    pub const IS_DIAGRAM_RENDERED: &str = "const s = window.structurizr && window.structurizr.scripting; \
return !!(s && s.isDiagramRendered && s.isDiagramRendered() === true);";

    pub const GET_VIEWS: &str = "return window.structurizr.scripting.getViews().map((v) => \
({ key: v.key, type: v.type, title: v.title || null, name: v.name || null }));";

    pub const CHANGE_VIEW: &str = "window.structurizr.scripting.changeView(arg); return null;";

    pub const EXPORT_SVG: &str =
        "return window.structurizr.scripting.exportCurrentDiagramToSVG({ includeMetadata: true });";

    pub const EXPORT_KEY_SVG: &str =
        "return window.structurizr.scripting.exportCurrentDiagramKeyToSVG();";

    /// The PNG exports report through a callback; the promise settles on the
    /// first invocation only.
    pub const EXPORT_PNG: &str = "return new Promise((resolve, reject) => { \
let settled = false; \
const done = (png) => { if (!settled) { settled = true; resolve(png); } }; \
try { window.structurizr.scripting.exportCurrentDiagramToPNG({ includeMetadata: true, crop: false }, done); } \
catch (e) { settled = true; reject(e); } });";

    pub const EXPORT_KEY_PNG: &str = "return new Promise((resolve, reject) => { \
let settled = false; \
const done = (png) => { if (!settled) { settled = true; resolve(png); } }; \
try { window.structurizr.scripting.exportCurrentDiagramKeyToPNG(done); } \
catch (e) { settled = true; reject(e); } });";

    /// Used for diagnostics when discovery fails.
    pub const DOCUMENT_TITLE: &str = "return document.title || '';";
}

pub struct RenderSurface<'p, P: BrowserPage + ?Sized> {
    page: &'p P,
    frame: FrameHandle,
}

impl<'p, P: BrowserPage + ?Sized> RenderSurface<'p, P> {
    pub fn new(page: &'p P, frame: FrameHandle) -> Self {
        Self { page, frame }
    }

    pub async fn is_diagram_rendered(&self, stage: Stage) -> Result<bool> {
        self.call(scripts::IS_DIAGRAM_RENDERED, Value::Null, stage)
            .await
    }

    pub async fn views(&self) -> Result<Vec<View>> {
        self.call(scripts::GET_VIEWS, Value::Null, Stage::Enumeration)
            .await
    }

    pub async fn change_view(&self, key: &str) -> Result<()> {
        let stage = Stage::Render(key.to_string());
        self.evaluate(scripts::CHANGE_VIEW, Value::String(key.to_string()), stage)
            .await
            .map(|_| ())
    }

    pub async fn export_svg(&self, key: &str) -> Result<String> {
        self.call(scripts::EXPORT_SVG, Value::Null, Stage::Export(key.to_string()))
            .await
    }

    pub async fn export_key_svg(&self, key: &str) -> Result<String> {
        self.call(scripts::EXPORT_KEY_SVG, Value::Null, Stage::Export(key.to_string()))
            .await
    }

    /// Returns the PNG as a `data:image/png;base64,...` URI.
    pub async fn export_png(&self, key: &str) -> Result<String> {
        self.call(scripts::EXPORT_PNG, Value::Null, Stage::Export(key.to_string()))
            .await
    }

    pub async fn export_key_png(&self, key: &str) -> Result<String> {
        self.call(scripts::EXPORT_KEY_PNG, Value::Null, Stage::Export(key.to_string()))
            .await
    }

    async fn call<T: DeserializeOwned>(&self, script: &str, arg: Value, stage: Stage) -> Result<T> {
        let value = self.evaluate(script, arg, stage.clone()).await?;
        serde_json::from_value(value).map_err(|e| {
            ExportError::script(stage, format!("unexpected result from scripting API: {e}"))
        })
    }

    async fn evaluate(&self, script: &str, arg: Value, stage: Stage) -> Result<Value> {
        self.page
            .evaluate(&self.frame, script, arg)
            .await
            .map_err(|err| at_stage(err, stage))
    }
}

/// Re-labels helper failures with the stage that issued the call.
pub(crate) fn at_stage(err: ExportError, stage: Stage) -> ExportError {
    match err {
        ExportError::Browser(message) => ExportError::Script { stage, message },
        ExportError::Timeout {
            stage: Stage::Request(_),
            after,
        } => ExportError::Timeout { stage, after },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn browser_errors_become_script_errors_for_the_stage() {
        let err = at_stage(
            ExportError::Browser("changeView is not a function".to_string()),
            Stage::Render("sys".to_string()),
        );
        match err {
            ExportError::Script { stage, message } => {
                assert_eq!(stage, Stage::Render("sys".to_string()));
                assert!(message.contains("changeView"));
            }
            other => panic!("expected script error, got {other:?}"),
        }
    }

    #[test]
    fn request_timeouts_take_the_callers_stage() {
        let err = at_stage(
            ExportError::timeout(Stage::Request("evaluate"), Duration::from_secs(30)),
            Stage::Export("sys".to_string()),
        );
        assert!(matches!(
            err,
            ExportError::Timeout { stage: Stage::Export(ref key), .. } if key == "sys"
        ));
    }

    #[test]
    fn other_errors_pass_through() {
        let err = at_stage(ExportError::Cancelled, Stage::Enumeration);
        assert!(matches!(err, ExportError::Cancelled));
    }

    #[test]
    fn png_scripts_settle_once() {
        for script in [scripts::EXPORT_PNG, scripts::EXPORT_KEY_PNG] {
            assert!(script.contains("if (!settled)"));
            assert!(script.starts_with("return new Promise"));
        }
    }
}
