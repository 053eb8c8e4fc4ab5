use serde::Deserialize;

/// Voice-call status callback the telephony provider POSTs back as
/// `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallStatusCallback {
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    /// Whole seconds, sent as a string. Missing or unparsable counts as 0.
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "AnsweredBy")]
    pub answered_by: Option<String>,
}

impl CallStatusCallback {
    pub fn status(&self) -> &str {
        self.call_status.as_deref().unwrap_or("")
    }

    pub fn duration_secs(&self) -> i64 {
        self.call_duration
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}
