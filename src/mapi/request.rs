/*!
Typed tool requests.

Each tool payload is decoded into one of these structs and validated right
away (`decode`). Nothing downstream re-checks field constraints.
*/

use rmcp::model::JsonObject;
use rmcp::schemars;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::rules::Rule;

/* ---- Errors ---- */

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid arguments: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Field constraints checked after decoding.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Decode an untyped tool payload into `T` and validate it.
///
/// A missing payload is treated as an empty object so that required-field
/// errors read the same way for both cases.
pub fn decode<T>(payload: Option<JsonObject>) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let value = serde_json::Value::Object(payload.unwrap_or_default());
    let request: T = serde_json::from_value(value).map_err(ValidationError::Decode)?;
    request.validate()?;
    Ok(request)
}

/* ---- run ---- */

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RunRequest {
    #[schemars(description = "How long to fuzz: 'auto' or an amount such as 30s, 10min, 1h")]
    pub duration: String,

    #[schemars(description = "Path or URL of the OpenAPI/Swagger specification")]
    pub specification: String,

    pub options: RunOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RunOptions {
    #[schemars(description = "Base URL of the API under test (http or https)")]
    pub url: String,

    #[serde(default)]
    #[schemars(description = "Only run these rules (--include-rule, repeatable)")]
    pub include_rules: Vec<Rule>,

    #[serde(default)]
    #[schemars(description = "Skip these rules (--ignore-rule, repeatable)")]
    pub ignore_rules: Vec<Rule>,

    #[serde(default)]
    #[schemars(description = "Also run the ZAP scanner alongside mapi")]
    pub zap: bool,

    #[serde(default)]
    #[schemars(description = "Write a HAR file of all requests to this path")]
    pub har: Option<String>,

    #[serde(default)]
    #[schemars(description = "Authorization header values (--header-auth, repeatable)")]
    pub header_auth: Vec<String>,

    #[serde(default = "default_replay_issues")]
    #[schemars(description = "Replay discovered issues after the run (default true)")]
    pub replay_issues: bool,
}

fn default_replay_issues() -> bool {
    true
}

const DURATION_UNITS: &[&str] = &[
    "", "s", "sec", "secs", "second", "seconds", "m", "min", "mins", "minute", "minutes", "h",
    "hr", "hrs", "hour", "hours",
];

fn check_duration(raw: &str) -> Result<(), ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::Empty { field: "duration" });
    }
    if raw == "auto" {
        return Ok(());
    }
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    let positive = !amount.is_empty() && amount.chars().any(|c| c != '0');
    if !positive || !DURATION_UNITS.contains(&unit) {
        return Err(ValidationError::Invalid {
            field: "duration",
            reason: format!("expected 'auto' or an amount like 30s, 10min, 1h (got '{raw}')"),
        });
    }
    Ok(())
}

fn check_not_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl Validate for RunRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_duration(&self.duration)?;
        check_not_empty("specification", &self.specification)?;
        self.options.validate()
    }
}

impl Validate for RunOptions {
    fn validate(&self) -> Result<(), ValidationError> {
        check_not_empty("options.url", &self.url)?;
        let url = Url::parse(&self.url).map_err(|e| ValidationError::Invalid {
            field: "options.url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::Invalid {
                field: "options.url",
                reason: format!("unsupported scheme '{}' (expected http or https)", url.scheme()),
            });
        }
        if let Some(har) = &self.har {
            check_not_empty("options.har", har)?;
        }
        for value in &self.header_auth {
            check_not_empty("options.header_auth", value)?;
        }
        Ok(())
    }
}

/* ---- defect_list ---- */

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DefectListRequest {
    #[schemars(description = "Number of the run whose defects to list", range(min = 1))]
    pub run_id: i64,
}

impl Validate for DefectListRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_range("run_id", self.run_id, 1, i64::MAX)
    }
}

/* ---- discover ---- */

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DiscoverRequest {
    #[schemars(description = "Host name or address to probe for API specifications")]
    pub host: String,

    #[schemars(description = "TCP port to probe", range(min = 1, max = 65535))]
    pub port: i64,
}

impl Validate for DiscoverRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_not_empty("host", &self.host)?;
        if self.host.chars().any(char::is_whitespace) {
            return Err(ValidationError::Invalid {
                field: "host",
                reason: "must not contain whitespace".into(),
            });
        }
        check_range("port", self.port, 1, 65535)
    }
}

/* ---- Tests ---- */
