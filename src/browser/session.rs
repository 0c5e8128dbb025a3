//! Playwright-backed browser session.
//!
//! A [`PlaywrightSession`] owns one Node.js helper process for the lifetime
//! of an export job. Requests are written to the helper's stdin as JSON lines;
//! a reader task routes each response line to the waiting caller through a
//! one-shot channel keyed by request id, so a reply can only complete the call
//! that asked for it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::bridge::{
    ensure_node_available, ensure_playwright_available, map_playwright_error, map_spawn_error,
    BridgeOp, BridgeRequest, BridgeResponse, BRIDGE_SCRIPT,
};
use super::{BrowserPage, FrameHandle, WaitUntil};
use crate::config::Config;
use crate::{ExportError, Result, Stage, Viewport};

/// Default time allowed for the helper to launch Chromium.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for a single helper request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time a navigation request gets beyond the Playwright-side timeout,
/// so Playwright reports the timeout rather than the channel.
const NAVIGATION_SLACK: Duration = Duration::from_secs(5);

/// Time allowed for the helper to close the browser and exit.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Helper stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// Configuration options for browser sessions.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// The Node.js command to use (default: "node").
    pub node_command: String,
    /// Viewport dimensions for the browser.
    pub viewport: Viewport,
    /// Device pixel ratio used for PNG exports.
    pub device_scale_factor: f64,
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Accept self-signed certificates (on-premises installs often use them).
    pub ignore_https_errors: bool,
    /// Timeout for the helper to report that Chromium is up.
    pub launch_timeout: Duration,
    /// Deadline for any single request other than navigation.
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            viewport: Viewport::default(),
            device_scale_factor: 2.0,
            headless: true,
            ignore_https_errors: true,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl From<&Config> for BrowserOptions {
    fn from(config: &Config) -> Self {
        Self {
            node_command: config.node_command.clone(),
            viewport: config.viewport,
            device_scale_factor: config.device_scale_factor,
            headless: config.headless,
            ignore_https_errors: config.ignore_https_errors,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            request_timeout: config.timeouts.script,
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeResponse>>>>;
type StderrTail = Arc<Mutex<VecDeque<String>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running Playwright helper with one page open.
pub struct PlaywrightSession {
    options: BrowserOptions,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    child: tokio::sync::Mutex<Child>,
    pending: Pending,
    next_id: AtomicU64,
    stderr_tail: StderrTail,
    closed: AtomicBool,
}

impl std::fmt::Debug for PlaywrightSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaywrightSession")
            .field("options", &self.options)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl PlaywrightSession {
    /// Spawns the helper and waits until Chromium is up.
    ///
    /// The helper is killed if the session is dropped without [`close`].
    ///
    /// [`close`]: BrowserPage::close
    pub async fn launch(options: BrowserOptions) -> Result<Self> {
        // Fail fast if Node or Playwright is missing to avoid a long launch timeout.
        ensure_node_available(&options.node_command).await?;
        ensure_playwright_available(&options.node_command).await?;

        let mut cmd = Command::new(&options.node_command);
        cmd.arg("-e")
            .arg(BRIDGE_SCRIPT)
            .arg(if options.headless { "1" } else { "0" })
            .arg(options.viewport.width.to_string())
            .arg(options.viewport.height.to_string())
            .arg(options.device_scale_factor.to_string())
            .arg(if options.ignore_https_errors { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            viewport = %options.viewport,
            headless = options.headless,
            "launching Playwright helper"
        );
        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, &options.node_command))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExportError::Browser("helper stdout was not captured".to_string()))?;
        let stderr_tail: StderrTail = Arc::default();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, stderr_tail.clone()));
        }

        let pending: Pending = Arc::default();
        let (ready_tx, ready_rx) = oneshot::channel();
        lock(&pending).insert(0, ready_tx);
        tokio::spawn(read_responses(stdout, pending.clone()));

        let launch_timeout = options.launch_timeout;
        let session = Self {
            options,
            stdin: tokio::sync::Mutex::new(stdin),
            child: tokio::sync::Mutex::new(child),
            pending,
            next_id: AtomicU64::new(1),
            stderr_tail,
            closed: AtomicBool::new(false),
        };

        match timeout(launch_timeout, ready_rx).await {
            Ok(Ok(response)) if response.status == "ready" => {
                info!("Browser ready");
                Ok(session)
            }
            Ok(Ok(response)) => Err(response
                .into_result()
                .err()
                .unwrap_or_else(|| ExportError::Browser("unexpected launch handshake".to_string()))),
            Ok(Err(_)) => Err(session.helper_exited().await),
            Err(_) => Err(ExportError::timeout(Stage::Launch, launch_timeout)),
        }
    }

    async fn request(&self, op: BridgeOp<'_>, limit: Duration) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExportError::Browser("browser session is closed".to_string()));
        }
        self.send(op, limit).await
    }

    async fn send(&self, op: BridgeOp<'_>, limit: Duration) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = op.name();
        let mut line = serde_json::to_string(&BridgeRequest { id, op })?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        {
            let mut stdin = self.stdin.lock().await;
            let written = match stdin.as_mut() {
                Some(stdin) => match stdin.write_all(line.as_bytes()).await {
                    Ok(()) => stdin.flush().await,
                    Err(err) => Err(err),
                },
                None => Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "helper stdin already closed",
                )),
            };
            if let Err(err) = written {
                lock(&self.pending).remove(&id);
                return Err(ExportError::Browser(format!(
                    "failed to send '{name}' to the browser helper: {err}"
                )));
            }
        }
        debug!(id, op = name, "helper request sent");

        match timeout(limit, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(self.helper_exited().await),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(ExportError::timeout(Stage::Request(name), limit))
            }
        }
    }

    /// Builds the error for a helper that stopped answering, including the
    /// tail of its stderr.
    async fn helper_exited(&self) -> ExportError {
        let status = {
            let mut child = self.child.lock().await;
            match timeout(Duration::from_secs(2), child.wait()).await {
                Ok(Ok(status)) => status.to_string(),
                _ => "unknown".to_string(),
            }
        };
        let tail = lock(&self.stderr_tail)
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        map_playwright_error(status, &tail)
    }
}

#[async_trait]
impl BrowserPage for PlaywrightSession {
    async fn goto(&self, url: &str, wait_until: WaitUntil, limit: Duration) -> Result<()> {
        let op = BridgeOp::Goto {
            url,
            wait_until,
            timeout_ms: limit.as_millis() as u64,
        };
        match self.request(op, limit + NAVIGATION_SLACK).await {
            Ok(_) => Ok(()),
            Err(ExportError::Timeout { .. }) => Err(ExportError::timeout(Stage::Navigation, limit)),
            Err(ExportError::Browser(msg)) if msg.to_ascii_lowercase().contains("timeout") => {
                Err(ExportError::timeout(Stage::Navigation, limit))
            }
            Err(ExportError::Browser(msg)) => Err(ExportError::Browser(format!(
                "navigation to {url} failed: {msg}"
            ))),
            Err(other) => Err(other),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let value = self
            .request(BridgeOp::Url, self.options.request_timeout)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn frames(&self) -> Result<Vec<FrameHandle>> {
        let value = self
            .request(BridgeOp::Frames, self.options.request_timeout)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn evaluate(&self, frame: &FrameHandle, script: &str, arg: Value) -> Result<Value> {
        let op = BridgeOp::Evaluate {
            frame: frame.id,
            script,
            arg: &arg,
        };
        self.request(op, self.options.request_timeout).await
    }

    async fn has_selector(&self, selector: &str) -> Result<bool> {
        let value = self
            .request(
                BridgeOp::HasSelector { selector },
                self.options.request_timeout,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let limit = self.options.request_timeout;
        let op = BridgeOp::Fill {
            selector,
            value,
            timeout_ms: limit.as_millis() as u64,
        };
        self.request(op, limit + NAVIGATION_SLACK).await.map(|_| ())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let limit = self.options.request_timeout;
        let op = BridgeOp::Click {
            selector,
            timeout_ms: limit.as_millis() as u64,
        };
        self.request(op, limit + NAVIGATION_SLACK).await.map(|_| ())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        let limit = self.options.request_timeout;
        let op = BridgeOp::Press {
            selector,
            key,
            timeout_ms: limit.as_millis() as u64,
        };
        self.request(op, limit + NAVIGATION_SLACK).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.send(BridgeOp::Close, CLOSE_TIMEOUT).await;
        // EOF on stdin makes the helper shut down even if the close request failed.
        self.stdin.lock().await.take();

        let mut child = self.child.lock().await;
        match timeout(CLOSE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "browser helper exited"),
            Ok(Err(err)) => warn!("waiting for browser helper failed: {err}"),
            Err(_) => {
                warn!("browser helper did not exit within {CLOSE_TIMEOUT:?}; killing it");
                if let Err(err) = child.kill().await {
                    warn!("failed to kill browser helper: {err}");
                }
            }
        }
        result.map(|_| ())
    }
}

async fn read_responses(stdout: ChildStdout, pending: Pending) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<BridgeResponse>(line) {
                    Ok(response) => {
                        let Some(id) = response.id else {
                            warn!(
                                "browser helper rejected a request: {}",
                                response.message.as_deref().unwrap_or("no details")
                            );
                            continue;
                        };
                        match lock(&pending).remove(&id) {
                            Some(waiter) => {
                                let _ = waiter.send(response);
                            }
                            None => debug!(id, "dropping response nobody is waiting for"),
                        }
                    }
                    Err(err) => debug!("ignoring non-protocol helper output ({err})"),
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!("reading browser helper output failed: {err}");
                break;
            }
        }
    }
    // Dropping the senders wakes every waiter with a closed-channel error.
    lock(&pending).clear();
}

async fn forward_stderr(stderr: ChildStderr, tail: StderrTail) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "dexport::helper", "{line}");
        let mut buffer = lock(&tail);
        if buffer.len() == STDERR_TAIL_LINES {
            buffer.pop_front();
        }
        buffer.push_back(line);
    }
}
