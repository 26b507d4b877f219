//! Status lookup tool — tracks a visa application with the tracking
//! service.
//!
//! The checker is a trait so the tool can be tested against stubs and the
//! gateway can swap in whatever the tracking service looks like in a given
//! deployment. The HTTP checker enforces a 10-second bound of its own.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use visagent_core::error::ToolError;
use visagent_core::tool::{Tool, ToolResult};

/// The outcome of one tracking lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The service reported a status text.
    Status(String),
    /// The service was reached and accepted the details but reported no
    /// status text.
    Submitted,
    /// The service did not answer within the wait bound.
    TimedOut,
    /// Any other failure (unreachable, bad response, rejected details).
    Failed,
}

/// Looks up the status of one application.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    async fn lookup(&self, reference_no: &str, date_of_birth: &str) -> TrackOutcome;
}

/// Render an outcome as the user-facing message. Each variant maps to a
/// distinguishable string so the model (and the user) can tell "no status
/// yet" apart from "the lookup broke".
fn render(reference_no: &str, outcome: &TrackOutcome) -> String {
    match outcome {
        TrackOutcome::Status(s) => {
            format!("The status for application {reference_no} is: {s}")
        }
        TrackOutcome::Submitted => {
            "Successfully submitted, but no status was found. Please check your details.".into()
        }
        TrackOutcome::TimedOut => "Error: the tracking service timed out.".into(),
        TrackOutcome::Failed => "Sorry, I was unable to retrieve the status.".into(),
    }
}

/// Checker backed by the HTTP tracking service.
///
/// Posts `{"reference_no", "date_of_birth"}` to the configured endpoint
/// and expects `{"found": bool, "status": string?}` back.
pub struct HttpStatusChecker {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TrackResponse {
    found: bool,
    #[serde(default)]
    status: Option<String>,
}

impl HttpStatusChecker {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl StatusChecker for HttpStatusChecker {
    async fn lookup(&self, reference_no: &str, date_of_birth: &str) -> TrackOutcome {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "reference_no": reference_no,
                "date_of_birth": date_of_birth,
            }))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(reference_no, "Tracking service timed out");
                return TrackOutcome::TimedOut;
            }
            Err(e) => {
                warn!(reference_no, error = %e, "Tracking service unreachable");
                return TrackOutcome::Failed;
            }
        };

        if !response.status().is_success() {
            warn!(reference_no, status = response.status().as_u16(), "Tracking service error");
            return TrackOutcome::Failed;
        }

        match response.json::<TrackResponse>().await {
            Ok(body) => match body.status.filter(|s| !s.trim().is_empty()) {
                Some(status) => TrackOutcome::Status(status),
                None if body.found => TrackOutcome::Submitted,
                None => TrackOutcome::Failed,
            },
            Err(e) => {
                warn!(reference_no, error = %e, "Malformed tracking response");
                TrackOutcome::Failed
            }
        }
    }
}

/// Tracks the status of a visa application by reference number and
/// date of birth.
pub struct TrackVisaStatusTool {
    checker: Arc<dyn StatusChecker>,
}

impl TrackVisaStatusTool {
    pub fn new(checker: Arc<dyn StatusChecker>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl Tool for TrackVisaStatusTool {
    fn name(&self) -> &str {
        "track_visa_status"
    }

    fn description(&self) -> &str {
        "Track the status of an existing visa application. Requires the application \
         reference number and the applicant's date of birth (YYYY-MM-DD). Ask the user \
         for both before calling this tool."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reference_no": {
                    "type": "string",
                    "description": "The application reference number"
                },
                "date_of_birth": {
                    "type": "string",
                    "description": "The applicant's date of birth, YYYY-MM-DD"
                }
            },
            "required": ["reference_no", "date_of_birth"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let reference_no = arguments["reference_no"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ToolError::InvalidArguments("Missing 'reference_no' argument".into())
            })?;
        let date_of_birth = arguments["date_of_birth"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ToolError::InvalidArguments("Missing 'date_of_birth' argument".into())
            })?;

        debug!(reference_no, "Tracking visa application");

        let outcome = self.checker.lookup(reference_no, date_of_birth).await;
        let success = matches!(
            outcome,
            TrackOutcome::Status(_) | TrackOutcome::Submitted
        );

        Ok(ToolResult {
            call_id: String::new(),
            success,
            output: render(reference_no, &outcome),
        })
    }
}
