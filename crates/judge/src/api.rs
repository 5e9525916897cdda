//! REST API client for the execution service HTTP endpoints.
//!
//! Wraps submission creation, submission status, the language catalog,
//! and the bundled-files download using [`reqwest`]. Protocol logic
//! depends only on the [`ExecutionApi`] trait so it can be exercised
//! without a network.

use std::time::Duration;

use async_trait::async_trait;
use codepad_core::codec;
use codepad_core::job::{JobResult, JobStatus};
use codepad_core::language::{Flavor, Language};
use codepad_core::types::LanguageId;
use serde::{Deserialize, Deserializer, Serialize};

/// Header carrying the region that accepted a submission.
pub const REGION_HEADER: &str = "X-Judge0-Region";

/* --------------------------------------------------------------------------
   Wire types
   -------------------------------------------------------------------------- */

/// JSON body of `POST /submissions`.
///
/// Built by the submitter from a [`JobRequest`](codepad_core::job::JobRequest);
/// `source_code` and `stdin` are already encoded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionBody {
    pub source_code: String,
    pub language_id: LanguageId,
    pub stdin: String,
    pub compiler_options: String,
    pub command_line_arguments: String,
    pub redirect_stderr_to_stdout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_files: Option<String>,
}

/// Response body of `POST /submissions`.
#[derive(Debug, Deserialize)]
struct CreatedSubmission {
    token: String,
}

/// What a successful submission yields: the token and the routing hint
/// read from the [`REGION_HEADER`] response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub token: String,
    pub region: Option<String>,
}

/// Response body of `GET /submissions/{token}`. Text fields are encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDetails {
    pub status: JobStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    /// CPU seconds as sent, normally a decimal string such as `"0.100"`.
    #[serde(default, deserialize_with = "seconds_as_text")]
    pub time: Option<String>,
    /// Peak memory in kilobytes.
    #[serde(default)]
    pub memory: Option<u64>,
}

impl SubmissionDetails {
    /// Decode the payload fields into a [`JobResult`].
    pub fn into_result(self) -> JobResult {
        JobResult {
            status: self.status,
            stdout: codec::decode_optional(self.stdout.as_deref()),
            compile_output: codec::decode_optional(self.compile_output.as_deref()),
            time: self.time,
            memory: self.memory,
        }
    }
}

fn seconds_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Seconds>::deserialize(deserializer)? {
        Some(Seconds::Number(n)) => Some(n.to_string()),
        Some(Seconds::Text(text)) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        None => None,
    })
}

/* --------------------------------------------------------------------------
   Errors
   -------------------------------------------------------------------------- */

/// Errors from the execution service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum JudgeApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Execution service error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/* --------------------------------------------------------------------------
   Trait
   -------------------------------------------------------------------------- */

/// The execution service operations used by the client.
#[async_trait]
pub trait ExecutionApi: Send + Sync {
    /// `POST /submissions?base64_encoded=true&wait=false`.
    async fn create_submission(
        &self,
        flavor: Flavor,
        body: &SubmissionBody,
    ) -> Result<SubmissionReceipt, JudgeApiError>;

    /// `GET /submissions/{token}?base64_encoded=true`, echoing the region.
    async fn get_submission(
        &self,
        flavor: Flavor,
        token: &str,
        region: Option<&str>,
    ) -> Result<SubmissionDetails, JudgeApiError>;

    /// `GET /languages`.
    async fn list_languages(&self, flavor: Flavor) -> Result<Vec<Language>, JudgeApiError>;

    /// `GET /languages/{id}`.
    async fn get_language(
        &self,
        flavor: Flavor,
        language_id: LanguageId,
    ) -> Result<Language, JudgeApiError>;

    /// Download the base64 zip attached to bundled-dependency languages.
    async fn fetch_bundled_files(&self) -> Result<String, JudgeApiError>;
}

/* --------------------------------------------------------------------------
   reqwest implementation
   -------------------------------------------------------------------------- */

/// Base URLs of the service instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL of the standard instance, e.g. `https://ce.judge0.com`.
    pub ce_url: String,
    /// Base URL of the extra-compilers instance.
    pub extra_ce_url: String,
    /// Full URL of the bundled-files payload.
    pub bundled_files_url: String,
}

impl Endpoints {
    pub fn base_url(&self, flavor: Flavor) -> &str {
        match flavor {
            Flavor::Ce => &self.ce_url,
            Flavor::ExtraCe => &self.extra_ce_url,
        }
    }
}

/// HTTP client for the execution service.
pub struct JudgeApi {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl JudgeApi {
    /// Create a client with a per-request timeout.
    pub fn new(endpoints: Endpoints, request_timeout: Duration) -> Result<Self, JudgeApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, endpoints })
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn url(&self, flavor: Flavor, path: &str) -> String {
        format!(
            "{}{}",
            self.endpoints.base_url(flavor).trim_end_matches('/'),
            path
        )
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`JudgeApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, JudgeApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JudgeApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, JudgeApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ExecutionApi for JudgeApi {
    async fn create_submission(
        &self,
        flavor: Flavor,
        body: &SubmissionBody,
    ) -> Result<SubmissionReceipt, JudgeApiError> {
        let response = self
            .client
            .post(self.url(flavor, "/submissions"))
            .query(&[("base64_encoded", "true"), ("wait", "false")])
            .json(body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let region = response
            .headers()
            .get(REGION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let created: CreatedSubmission = response.json().await?;

        Ok(SubmissionReceipt {
            token: created.token,
            region,
        })
    }

    async fn get_submission(
        &self,
        flavor: Flavor,
        token: &str,
        region: Option<&str>,
    ) -> Result<SubmissionDetails, JudgeApiError> {
        let mut request = self
            .client
            .get(self.url(flavor, &format!("/submissions/{token}")))
            .query(&[("base64_encoded", "true")]);
        if let Some(region) = region {
            request = request.header(REGION_HEADER, region);
        }

        let response = request.send().await?;
        Self::parse_response(response).await
    }

    async fn list_languages(&self, flavor: Flavor) -> Result<Vec<Language>, JudgeApiError> {
        let response = self
            .client
            .get(self.url(flavor, "/languages"))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn get_language(
        &self,
        flavor: Flavor,
        language_id: LanguageId,
    ) -> Result<Language, JudgeApiError> {
        let response = self
            .client
            .get(self.url(flavor, &format!("/languages/{language_id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn fetch_bundled_files(&self) -> Result<String, JudgeApiError> {
        let response = self
            .client
            .get(&self.endpoints.bundled_files_url)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.text().await?.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_keep_time_text_as_sent() {
        let from_string: SubmissionDetails = serde_json::from_str(
            r#"{"status": {"id": 3, "description": "Accepted"}, "time": "0.100", "memory": 3264}"#,
        )
        .unwrap();
        assert_eq!(from_string.time.as_deref(), Some("0.100"));
        assert_eq!(from_string.memory, Some(3264));

        let from_number: SubmissionDetails = serde_json::from_str(
            r#"{"status": {"id": 3, "description": "Accepted"}, "time": 1.5}"#,
        )
        .unwrap();
        assert_eq!(from_number.time.as_deref(), Some("1.5"));
    }

    #[test]
    fn details_tolerate_nulls_and_missing_fields() {
        let details: SubmissionDetails = serde_json::from_str(
            r#"{"status": {"id": 1, "description": "In Queue"}, "stdout": null, "time": null, "memory": null}"#,
        )
        .unwrap();
        assert!(details.stdout.is_none());
        assert!(details.compile_output.is_none());
        assert!(details.time.is_none());
        assert!(details.memory.is_none());
    }

    #[test]
    fn into_result_decodes_payloads() {
        let details = SubmissionDetails {
            status: JobStatus::new(3, "Accepted"),
            stdout: Some("MQ==\n".into()),
            compile_output: None,
            time: Some("0.010".into()),
            memory: None,
        };
        let result = details.into_result();
        assert_eq!(result.stdout, "1");
        assert_eq!(result.compile_output, "");
        assert_eq!(result.status.id, 3);
    }

    #[test]
    fn body_omits_absent_additional_files() {
        let body = SubmissionBody {
            source_code: "cHJpbnQoMSk=".into(),
            language_id: 71,
            stdin: String::new(),
            compiler_options: String::new(),
            command_line_arguments: String::new(),
            redirect_stderr_to_stdout: true,
            additional_files: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("additional_files").is_none());
        assert_eq!(json["language_id"], 71);
        assert_eq!(json["redirect_stderr_to_stdout"], true);
    }

    #[test]
    fn endpoints_pick_base_url_by_flavor() {
        let endpoints = Endpoints {
            ce_url: "http://ce".into(),
            extra_ce_url: "http://extra".into(),
            bundled_files_url: "http://ce/data.txt".into(),
        };
        assert_eq!(endpoints.base_url(Flavor::Ce), "http://ce");
        assert_eq!(endpoints.base_url(Flavor::ExtraCe), "http://extra");
    }
}
