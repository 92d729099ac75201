use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ChatMessage, CompletionClient, CompletionRequest};
use crate::config::Credential;
use crate::error::ChatError;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
}

/// A failed attempt, tagged with whether sending it again could succeed.
struct AttemptError {
    error: ChatError,
    retryable: bool,
}

impl AttemptError {
    fn retryable(error: ChatError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn fatal(error: ChatError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

impl OpenAIClient {
    pub fn new(
        credential: &Credential,
        base_url: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::configuration(format!("failed to build http client: {e}")))?;
        Ok(Self {
            api_key: credential.expose().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            max_retries,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn send_once(&self, request: &CompletionRequest<'_>) -> Result<ChatMessage, AttemptError> {
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(|e| {
                let error = if e.is_timeout() {
                    ChatError::transport(format!("request timed out: {e}"))
                } else {
                    ChatError::transport(format!("failed to call completion service: {e}"))
                };
                // Connect failures and timeouts may clear up; a request the
                // client could not even build will not.
                if e.is_builder() {
                    AttemptError::fatal(error)
                } else {
                    AttemptError::retryable(error)
                }
            })?;

        let status = resp.status();
        let body = resp.text().map_err(|e| {
            AttemptError::retryable(ChatError::transport(format!(
                "failed to read response body: {e}"
            )))
        })?;

        if !status.is_success() {
            let error = classify_status(status, &body);
            return Err(if is_retryable_status(status) {
                AttemptError::retryable(error)
            } else {
                AttemptError::fatal(error)
            });
        }
        parse_completion(&body).map_err(AttemptError::fatal)
    }
}

#[derive(Deserialize)]
struct OaiResponse {
    #[serde(default)]
    choices: Vec<OaiChoice>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: Option<OaiMessage>,
}

#[derive(Deserialize)]
struct OaiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OaiErrorBody {
    error: OaiErrorDetail,
}

#[derive(Deserialize)]
struct OaiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Timeouts, rate limits and server-side failures. Other 4xx answers
/// will be refused again.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Maps a non-2xx answer onto an error category. Auth failures and unknown
/// models are configuration problems, everything else is transport.
fn classify_status(status: StatusCode, body: &str) -> ChatError {
    let (detail, code) = match serde_json::from_str::<OaiErrorBody>(body) {
        Ok(b) => (b.error.message, b.error.code),
        Err(_) => (body.chars().take(200).collect(), None),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ChatError::configuration(format!(
            "completion service rejected the API key ({status}): {detail}"
        )),
        _ if status == StatusCode::NOT_FOUND || code.as_deref() == Some("model_not_found") => {
            ChatError::configuration(format!("unsupported model ({status}): {detail}"))
        }
        _ => ChatError::transport(format!("completion service returned {status}: {detail}")),
    }
}

/// Takes the first candidate of a successful response.
fn parse_completion(body: &str) -> Result<ChatMessage, ChatError> {
    let resp: OaiResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::malformed(format!("unparseable response body: {e}")))?;

    let content = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ChatError::malformed("response contained no choices"))?
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| ChatError::malformed("first choice has no message content"))?;

    if content.trim().is_empty() {
        return Err(ChatError::malformed("first choice has empty content"));
    }
    Ok(ChatMessage::assistant(content))
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt)
}

impl CompletionClient for OpenAIClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<ChatMessage, ChatError> {
        request.validate()?;

        let mut attempt = 0;
        loop {
            debug!(
                model = request.model,
                messages = request.messages.len(),
                attempt,
                "sending completion request"
            );
            match self.send_once(request) {
                Ok(reply) => return Ok(reply),
                Err(failed) if failed.retryable && attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_base_delay, attempt);
                    warn!(error = %failed.error, ?delay, attempt, "completion request failed, retrying");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(failed) => return Err(failed.error),
            }
        }
    }
}
