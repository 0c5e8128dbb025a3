use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::ParseError;

/// Phase of an export job, used to name where a fatal error happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Launch,
    Navigation,
    SignIn,
    Discovery,
    Readiness,
    Enumeration,
    Render(String),
    Export(String),
    Request(&'static str),
    Job,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Launch => write!(f, "browser launch"),
            Stage::Navigation => write!(f, "navigation"),
            Stage::SignIn => write!(f, "sign-in"),
            Stage::Discovery => write!(f, "render surface discovery"),
            Stage::Readiness => write!(f, "diagram readiness"),
            Stage::Enumeration => write!(f, "view enumeration"),
            Stage::Render(key) => write!(f, "render of view '{key}'"),
            Stage::Export(key) => write!(f, "export of view '{key}'"),
            Stage::Request(op) => write!(f, "browser request '{op}'"),
            Stage::Job => write!(f, "export job"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Scripting call failed during {stage}: {message}")]
    Script { stage: Stage, message: String },

    #[error("Timed out after {after:?} during {stage}")]
    Timeout { stage: Stage, after: Duration },

    #[error("Invalid export payload: {0}")]
    Payload(String),

    #[error("Failed to write {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Export incomplete: expected {expected} artifacts, wrote {actual}")]
    Incomplete { expected: usize, actual: usize },

    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    pub fn script(stage: Stage, message: impl Into<String>) -> Self {
        ExportError::Script {
            stage,
            message: message.into(),
        }
    }

    pub fn timeout(stage: Stage, after: Duration) -> Self {
        ExportError::Timeout { stage, after }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            ExportError::Io(e) => ErrorPayload::new(
                ErrorCategory::Io,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            ExportError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify the target URL (e.g., https://structurizr.example.com/workspace/1).",
            ),
            ExportError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Browser,
                e.to_string(),
                "The browser helper returned unexpected data; re-run with --verbose for details.",
            ),
            ExportError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("playwright npm package is missing") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Install Playwright (e.g., `npm install playwright` and `npx playwright install chromium`).",
                    )
                } else if lower.contains("not found on path") || lower.contains("node command") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Install Node.js and ensure the node binary is on PATH (or set node_command in the config file).",
                    )
                } else if lower.contains("view key") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Rename the offending view in the workspace; view keys become output file names.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags and the config file (e.g., --viewport WIDTHxHEIGHT, timeouts in seconds).",
                    )
                }
            }
            ExportError::Browser(msg) => {
                if msg.to_ascii_lowercase().contains("executable") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Run `npx playwright install chromium` to download the browser.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Re-run with --verbose to see the browser helper output.",
                    )
                }
            }
            ExportError::Script { .. } => ErrorPayload::new(
                ErrorCategory::Remote,
                self.to_string(),
                "Check that the workspace loads in a regular browser and exposes the scripting API.",
            ),
            ExportError::Timeout { stage, .. } => {
                let remediation = match stage {
                    Stage::Discovery => "The diagram viewer never exposed structurizr.scripting; check the URL, credentials and --discovery-timeout.",
                    Stage::Readiness => "The first diagram never finished rendering; raise timeouts.readiness in the config file.",
                    Stage::Render(_) => "A diagram did not finish rendering; try a larger --render-timeout.",
                    Stage::Navigation | Stage::SignIn => "The page did not load in time; check connectivity or raise --nav-timeout.",
                    Stage::Job => "The whole export exceeded --job-timeout; raise it for large workspaces.",
                    _ => "Raise --script-timeout or re-run with --verbose.",
                };
                ErrorPayload::new(ErrorCategory::Timeout, self.to_string(), remediation)
            }
            ExportError::Payload(msg) => ErrorPayload::new(
                ErrorCategory::Remote,
                msg.to_string(),
                "The exported image data was malformed; re-run with --verbose.",
            ),
            ExportError::Artifact { .. } => ErrorPayload::new(
                ErrorCategory::Io,
                self.to_string(),
                "Check that --output-dir exists and is writable.",
            ),
            ExportError::Incomplete { .. } => ErrorPayload::new(
                ErrorCategory::Incomplete,
                self.to_string(),
                "Some artifacts were not written; re-run the export.",
            ),
            ExportError::Cancelled => ErrorPayload::new(
                ErrorCategory::Cancelled,
                self.to_string(),
                "The export was interrupted; partial output may remain in the output directory.",
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Browser,
    Remote,
    Timeout,
    Io,
    Incomplete,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
