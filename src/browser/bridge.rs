//! Playwright helper for the browser session.
//!
//! This module contains the inline Node.js helper script, the JSON-lines
//! protocol types, error mapping, and availability checks for Node.js and
//! Playwright.

use crate::{ExportError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::WaitUntil;

/// Long-lived helper: launches Chromium, then serves one JSON request per
/// stdin line and answers with one JSON line on stdout. EOF on stdin closes
/// the browser.
pub(crate) const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const [, headlessFlag, width, height, scale, ignoreHttps] = process.argv;
const AsyncFunction = Object.getPrototypeOf(async function () {}).constructor;

function send(message, done) {
  process.stdout.write(JSON.stringify(message) + '\n', done);
}

function errorMessage(err) {
  return err && err.message ? err.message : String(err);
}

async function run() {
  let browser;
  let page;
  try {
    const { chromium } = require('playwright');
    browser = await chromium.launch({
      headless: headlessFlag !== '0',
      args: ['--no-sandbox', '--disable-setuid-sandbox', '--disable-dev-shm-usage']
    });
    const context = await browser.newContext({
      viewport: { width: parseInt(width, 10), height: parseInt(height, 10) },
      deviceScaleFactor: parseFloat(scale),
      ignoreHTTPSErrors: ignoreHttps === '1'
    });
    page = await context.newPage();
  } catch (err) {
    console.error(JSON.stringify({ status: 'error', message: errorMessage(err) }));
    if (browser) {
      await browser.close().catch(() => {});
    }
    send({ id: 0, status: 'error', message: errorMessage(err) }, () => process.exit(1));
    return;
  }

  const frameIds = new Map();
  const framesById = new Map();
  let nextFrameId = 1;

  function handleFor(frame) {
    let id = frameIds.get(frame);
    if (id === undefined) {
      id = nextFrameId++;
      frameIds.set(frame, id);
      framesById.set(id, frame);
    }
    return { id, url: frame.url(), main: frame === page.mainFrame() };
  }

  page.on('framedetached', (frame) => {
    const id = frameIds.get(frame);
    frameIds.delete(frame);
    if (id !== undefined) {
      framesById.delete(id);
    }
  });

  function frameById(id) {
    const frame = framesById.get(id);
    if (!frame || frame.isDetached()) {
      throw new Error('frame ' + id + ' is detached');
    }
    return frame;
  }

  let closing = null;
  function shutdown() {
    if (!closing) {
      closing = browser.close().catch(() => {});
    }
    return closing;
  }

  const handlers = {
    goto: async (req) => {
      await page.goto(req.url, { waitUntil: req.waitUntil, timeout: req.timeoutMs });
      return page.url();
    },
    url: async () => page.url(),
    frames: async () => page.frames().map(handleFor),
    evaluate: async (req) => {
      const frame = frameById(req.frame);
      const value = await frame.evaluate(new AsyncFunction('arg', req.script), req.arg);
      return value === undefined ? null : value;
    },
    hasSelector: async (req) => (await page.$(req.selector)) !== null,
    fill: async (req) => {
      await page.fill(req.selector, req.value, { timeout: req.timeoutMs });
      return null;
    },
    click: async (req) => {
      await page.click(req.selector, { timeout: req.timeoutMs });
      return null;
    },
    press: async (req) => {
      await page.press(req.selector, req.key, { timeout: req.timeoutMs });
      return null;
    },
    close: async () => {
      await shutdown();
      return null;
    }
  };

  send({ id: 0, status: 'ready' });

  const lines = readline.createInterface({ input: process.stdin, crlfDelay: Infinity });
  lines.on('line', async (line) => {
    if (!line.trim()) {
      return;
    }
    let req;
    try {
      req = JSON.parse(line);
    } catch (err) {
      send({ id: null, status: 'error', message: 'malformed request: ' + errorMessage(err) });
      return;
    }
    try {
      const handler = handlers[req.op];
      if (!handler) {
        throw new Error('unknown op ' + req.op);
      }
      const value = await handler(req);
      send({ id: req.id, status: 'ok', value }, req.op === 'close' ? () => process.exit(0) : undefined);
    } catch (err) {
      send({ id: req.id, status: 'error', message: errorMessage(err) });
    }
  });
  lines.on('close', async () => {
    await shutdown();
    process.exit(0);
  });
}

run();
"#;

/// Timeout for checking node/playwright availability.
pub(crate) const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Script to check if Playwright is installed.
const PLAYWRIGHT_CHECK_SCRIPT: &str = "require('playwright'); process.stdout.write('ok');";

/// One request line sent to the helper.
#[derive(Debug, Serialize)]
pub(crate) struct BridgeRequest<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub op: BridgeOp<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub(crate) enum BridgeOp<'a> {
    Goto {
        url: &'a str,
        wait_until: WaitUntil,
        timeout_ms: u64,
    },
    Url,
    Frames,
    Evaluate {
        frame: u64,
        script: &'a str,
        arg: &'a Value,
    },
    HasSelector {
        selector: &'a str,
    },
    Fill {
        selector: &'a str,
        value: &'a str,
        timeout_ms: u64,
    },
    Click {
        selector: &'a str,
        timeout_ms: u64,
    },
    Press {
        selector: &'a str,
        key: &'a str,
        timeout_ms: u64,
    },
    Close,
}

impl BridgeOp<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeOp::Goto { .. } => "goto",
            BridgeOp::Url => "url",
            BridgeOp::Frames => "frames",
            BridgeOp::Evaluate { .. } => "evaluate",
            BridgeOp::HasSelector { .. } => "hasSelector",
            BridgeOp::Fill { .. } => "fill",
            BridgeOp::Click { .. } => "click",
            BridgeOp::Press { .. } => "press",
            BridgeOp::Close => "close",
        }
    }
}

/// One response line from the helper. `id` 0 is the launch handshake.
#[derive(Debug, Deserialize)]
pub(crate) struct BridgeResponse {
    pub id: Option<u64>,
    pub status: String,
    #[serde(default)]
    pub value: Value,
    pub message: Option<String>,
}

impl BridgeResponse {
    pub fn into_result(self) -> Result<Value> {
        if self.status == "ok" {
            Ok(self.value)
        } else {
            Err(map_bridge_error(
                self.message.as_deref().unwrap_or("no additional details"),
            ))
        }
    }
}

/// Maps a spawn error to an appropriate ExportError.
pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> ExportError {
    if err.kind() == io::ErrorKind::NotFound {
        ExportError::Config(format!(
            "Unable to spawn Playwright helper; '{}' was not found on PATH",
            command
        ))
    } else {
        ExportError::Io(err)
    }
}

/// Maps a helper failure message to an ExportError.
pub(crate) fn map_bridge_error(message: &str) -> ExportError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("cannot find module 'playwright'") {
        ExportError::Config(
            "Playwright npm package is missing; install with `npm install playwright`.".to_string(),
        )
    } else if lower.contains("executable doesn't exist") {
        ExportError::Browser(format!(
            "Chromium executable is missing; run `npx playwright install chromium`. ({})",
            first_line(message)
        ))
    } else {
        ExportError::Browser(message.trim().to_string())
    }
}

/// Maps helper stderr output (when it died without answering) to an ExportError.
pub(crate) fn map_playwright_error(status_text: impl Into<String>, stderr: &str) -> ExportError {
    if let Ok(response) = serde_json::from_str::<BridgeResponse>(stderr.trim()) {
        if let Some(message) = response.message {
            return map_bridge_error(&message);
        }
    }

    let lower = stderr.to_ascii_lowercase();
    if lower.contains("cannot find module 'playwright'") || lower.contains("executable doesn't exist")
    {
        return map_bridge_error(stderr);
    }

    ExportError::Browser(format!(
        "Playwright helper exited with status {}: {}",
        status_text.into(),
        stderr.trim()
    ))
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message).trim()
}

/// Ensures Node.js is available on the system.
pub async fn ensure_node_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let status = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.status())
        .await
        .map_err(|_| {
            ExportError::Config(format!(
                "Timed out checking node availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !status.success() {
        return Err(ExportError::Config(format!(
            "Node command {:?} is not available (exit {})",
            node_command, status
        )));
    }

    Ok(())
}

/// Ensures the Playwright npm package is installed.
pub async fn ensure_playwright_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("-e")
        .arg(PLAYWRIGHT_CHECK_SCRIPT)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            ExportError::Config(format!(
                "Timed out checking Playwright availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(map_playwright_error(
            format!("{:?}", output.status),
            &stderr,
        ));
    }

    Ok(())
}
