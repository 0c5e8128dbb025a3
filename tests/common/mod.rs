//! Scripted in-memory page standing in for Chromium.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dexport_lib::scripting::scripts;
use dexport_lib::{BrowserPage, Config, ExportError, FrameHandle, Result, View, WaitUntil};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
];
pub const KEY_PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x01];

pub fn png_data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

#[derive(Debug, Default)]
struct State {
    location: String,
    current_view: Option<String>,
    submitted: bool,
    calls: Vec<String>,
    closed: usize,
}

/// Knobs describing how the fake viewer behaves.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub views: Vec<View>,
    /// Frame exposing the scripting API; `None` means it never appears.
    pub scripting_frame: Option<u64>,
    /// Frames whose capability probe throws.
    pub failing_frames: Vec<u64>,
    pub login_form: bool,
    pub submit_button: bool,
    /// A view that never finishes rendering.
    pub stuck_view: Option<String>,
    /// Whether clicking submit leaves the sign-in page.
    pub redirect_on_submit: bool,
    /// Selector queries throw once the form was submitted, as they do while
    /// the page is navigating.
    pub selector_error_after_submit: bool,
    /// Replaces the data URI returned by both PNG exports.
    pub png_payload: Option<String>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            views: Vec::new(),
            scripting_frame: Some(2),
            failing_frames: Vec::new(),
            login_form: false,
            submit_button: true,
            stuck_view: None,
            redirect_on_submit: true,
            selector_error_after_submit: false,
            png_payload: None,
        }
    }
}

pub struct FakePage {
    scenario: Scenario,
    state: Mutex<State>,
}

impl FakePage {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_views(views: Vec<View>) -> Self {
        Self::new(Scenario {
            views,
            ..Scenario::default()
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn log(&self, call: String) {
        self.state().calls.push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn close_count(&self) -> usize {
        self.state().closed
    }

    fn frame_list(&self) -> Vec<FrameHandle> {
        let location = self.state().location.clone();
        (1..=3)
            .map(|id| FrameHandle {
                id,
                url: if id == 1 {
                    location.clone()
                } else {
                    format!("{location}#frame{id}")
                },
                main: id == 1,
            })
            .collect()
    }

    fn current_view(&self) -> String {
        self.state().current_view.clone().unwrap_or_default()
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str, _wait_until: WaitUntil, _timeout: Duration) -> Result<()> {
        self.log(format!("goto {url}"));
        self.state().location = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().location.clone())
    }

    async fn frames(&self) -> Result<Vec<FrameHandle>> {
        Ok(self.frame_list())
    }

    async fn evaluate(&self, frame: &FrameHandle, script: &str, arg: Value) -> Result<Value> {
        if script == scripts::HAS_SCRIPTING {
            if self.scenario.failing_frames.contains(&frame.id) {
                return Err(ExportError::Browser("Execution context was destroyed".into()));
            }
            return Ok(Value::Bool(self.scenario.scripting_frame == Some(frame.id)));
        }
        if script == scripts::DOCUMENT_TITLE {
            return Ok(Value::String("Structurizr".into()));
        }
        if Some(frame.id) != self.scenario.scripting_frame {
            return Err(ExportError::Browser("structurizr is not defined".into()));
        }

        let view = self.current_view();
        match script {
            s if s == scripts::IS_DIAGRAM_RENDERED => {
                Ok(Value::Bool(self.scenario.stuck_view.as_deref() != Some(view.as_str())))
            }
            s if s == scripts::GET_VIEWS => Ok(serde_json::to_value(&self.scenario.views)?),
            s if s == scripts::CHANGE_VIEW => {
                let key = arg.as_str().unwrap_or_default().to_string();
                self.log(format!("changeView {key}"));
                self.state().current_view = Some(key);
                Ok(Value::Null)
            }
            s if s == scripts::EXPORT_SVG => Ok(Value::String(format!("<svg id=\"{view}\"/>"))),
            s if s == scripts::EXPORT_KEY_SVG => {
                Ok(Value::String(format!("<svg id=\"{view}-key\"/>")))
            }
            s if s == scripts::EXPORT_PNG => Ok(Value::String(
                self.scenario
                    .png_payload
                    .clone()
                    .unwrap_or_else(|| png_data_uri(PNG_BYTES)),
            )),
            s if s == scripts::EXPORT_KEY_PNG => Ok(Value::String(
                self.scenario
                    .png_payload
                    .clone()
                    .unwrap_or_else(|| png_data_uri(KEY_PNG_BYTES)),
            )),
            other => Err(ExportError::Browser(format!("unexpected script: {other}"))),
        }
    }

    async fn has_selector(&self, selector: &str) -> Result<bool> {
        if self.scenario.selector_error_after_submit && self.state().submitted {
            return Err(ExportError::Browser(
                "Execution context was destroyed, most likely because of a navigation".into(),
            ));
        }
        if !self.scenario.login_form || !self.state().location.ends_with("/signin") {
            return Ok(false);
        }
        Ok(match selector {
            "#username" | "#password" => true,
            "button[type=\"submit\"]" => self.scenario.submit_button,
            _ => false,
        })
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.log(format!("fill {selector}={value}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.log(format!("click {selector}"));
        let mut state = self.state();
        state.submitted = true;
        if self.scenario.redirect_on_submit {
            state.location = state.location.replace("/signin", "/dashboard");
        }
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        self.log(format!("press {selector} {key}"));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state().closed += 1;
        Ok(())
    }
}

/// Config with short waits, writing into `dir`.
pub fn fast_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.output_dir = dir.to_path_buf();
    config.timeouts.login = Duration::from_millis(200);
    config.timeouts.discovery = Duration::from_millis(200);
    config.timeouts.readiness = Duration::from_millis(200);
    config.timeouts.render = Duration::from_millis(200);
    config.timeouts.job = Duration::from_secs(10);
    config.timeouts.poll_interval = Duration::from_millis(10);
    config
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
