//! Browser automation seam.
//!
//! Everything that talks to a page goes through [`BrowserPage`]. The
//! production implementation is [`PlaywrightSession`], a long-lived Node.js
//! helper running Playwright; tests substitute an in-memory page.
//!
//! # Module Structure
//!
//! - [`session`] - Helper process lifecycle and request/response correlation
//! - [`bridge`] - The helper script, availability checks and error mapping

mod bridge;
mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::Result;

pub use bridge::{ensure_node_available, ensure_playwright_available};
pub use session::{BrowserOptions, PlaywrightSession, DEFAULT_LAUNCH_TIMEOUT};

/// Opaque handle to one browsing context (the main frame or an iframe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHandle {
    pub id: u64,
    pub url: String,
    #[serde(default)]
    pub main: bool,
}

/// Load state a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

/// The narrow set of page primitives an export job needs.
///
/// Scripts passed to [`BrowserPage::evaluate`] are JavaScript function
/// bodies; the single argument is bound to `arg` and a returned promise is
/// awaited.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()>;

    /// Current location of the main frame.
    async fn current_url(&self) -> Result<String>;

    /// Every browsing context currently attached to the page.
    async fn frames(&self) -> Result<Vec<FrameHandle>>;

    async fn evaluate(&self, frame: &FrameHandle, script: &str, arg: Value) -> Result<Value>;

    /// Whether `selector` matches an element in the main frame.
    async fn has_selector(&self, selector: &str) -> Result<bool>;

    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Presses `key` with `selector` focused.
    async fn press(&self, selector: &str, key: &str) -> Result<()>;

    /// Releases the browser. Calling it twice is harmless.
    async fn close(&self) -> Result<()>;
}
