//! Model backend clients.
//!
//! # Architecture
//!
//! The orchestration loop talks to the backend only through [`ModelGateway`].
//! One call sends one conversation turn and returns one normalized
//! [`ModelTurn`]: optional text plus zero or more tool calls.
//!
//! - [`gemini`] - Google Gemini client (GenerateContent API, non-streaming)
//! - [`wire`] - typed Gemini response structures
//!
//! # Turn input
//!
//! Every request carries exactly one of:
//!
//! | Input | Sent as |
//! |-------|---------|
//! | `Fresh` | optional `inlineData` image part, then the prompt text |
//! | `Continuation` | the task, the model's `functionCall` parts, our `functionResponse` parts |
//!
//! Both forms prepend a short context block built from the most recent
//! transcript messages; the full history is never sent.
//!
//! # Error Handling
//!
//! Failures are returned as [`GatewayError`]. The gateway never retries; the
//! caller decides what a failed turn means.

pub mod gemini;
pub mod wire;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use arkaios_types::{ApiKey, ImageAttachment, Message, ModelTurn, ToolCall, ToolDefinition, ToolResult};

pub use arkaios_types;
pub use gemini::GeminiGateway;
pub use wire::FinishReason;

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
/// Number of trailing transcript messages injected as context.
pub const DEFAULT_CONTEXT_MESSAGES: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Build an HTTP client for one backend.
///
/// Plain `http` is only permitted when the configured base URL uses it
/// (local proxies, test servers).
pub(crate) fn build_http_client(base_url: &str) -> Result<reqwest::Client, reqwest::Error> {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(concat!("arkaios/", env!("CARGO_PKG_VERSION"))),
    );

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(base_url.starts_with("https://"))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
        .build()
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

// ============================================================================
// Configuration
// ============================================================================

/// Credentials, model selection and request tuning for the Gemini backend.
///
/// ```rust
/// use arkaios_providers::ApiConfig;
/// use arkaios_types::ApiKey;
///
/// let config = ApiConfig::new(ApiKey::new("test"), "gemini-2.5-flash")
///     .with_temperature(0.2)
///     .with_context_messages(5);
/// # let _ = config;
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    api_key: ApiKey,
    model: String,
    temperature: f64,
    max_output_tokens: u32,
    system_prompt: Option<String>,
    context_messages: usize,
    base_url: String,
    request_timeout: Duration,
}

impl ApiConfig {
    #[must_use]
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            system_prompt: None,
            context_messages: DEFAULT_CONTEXT_MESSAGES,
            base_url: GEMINI_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn with_context_messages(mut self, count: usize) -> Self {
        self.context_messages = count;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    #[must_use]
    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    #[must_use]
    pub fn context_messages(&self) -> usize {
        self.context_messages
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

// ============================================================================
// Gateway contract
// ============================================================================

/// New user input: a prompt, an image, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshInput {
    prompt: String,
    image: Option<ImageAttachment>,
}

impl FreshInput {
    /// Returns `None` when there is neither prompt text nor an image.
    #[must_use]
    pub fn new(prompt: impl Into<String>, image: Option<ImageAttachment>) -> Option<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() && image.is_none() {
            return None;
        }
        Some(Self { prompt, image })
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }
}

/// One executed tool call paired with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExchange {
    pub call: ToolCall,
    pub result: ToolResult,
}

/// Results of a tool batch, sent back so the model can continue.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolContinuation {
    task: String,
    exchanges: Vec<ToolExchange>,
}

impl ToolContinuation {
    #[must_use]
    pub fn new(task: impl Into<String>, exchanges: Vec<ToolExchange>) -> Self {
        Self {
            task: task.into(),
            exchanges,
        }
    }

    /// Pair calls with their results positionally.
    ///
    /// Returns `None` unless every call has exactly one result with a
    /// matching id.
    #[must_use]
    pub fn pair(
        task: impl Into<String>,
        calls: Vec<ToolCall>,
        results: Vec<ToolResult>,
    ) -> Option<Self> {
        if calls.len() != results.len()
            || calls
                .iter()
                .zip(&results)
                .any(|(call, result)| call.id != result.tool_call_id)
        {
            return None;
        }
        let exchanges = calls
            .into_iter()
            .zip(results)
            .map(|(call, result)| ToolExchange { call, result })
            .collect();
        Some(Self::new(task, exchanges))
    }

    /// The user task the chain is working on.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    #[must_use]
    pub fn exchanges(&self) -> &[ToolExchange] {
        &self.exchanges
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    Fresh(FreshInput),
    Continuation(ToolContinuation),
}

/// One backend call.
///
/// `history` holds the transcript entries that precede `input`; only its
/// tail is sent as context.
#[derive(Debug, Clone, Copy)]
pub struct GatewayRequest<'a> {
    pub history: &'a [Message],
    pub input: &'a TurnInput,
    pub tools: &'a [ToolDefinition],
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("API error: {message}")]
    Api { message: String },
    #[error("response blocked: {reason}")]
    Blocked { reason: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Gateway future type alias.
pub type GatewayFut<'a> = Pin<Box<dyn Future<Output = Result<ModelTurn, GatewayError>> + Send + 'a>>;

/// Sends one conversation turn to a model backend.
pub trait ModelGateway: Send + Sync {
    fn send<'a>(&'a self, request: GatewayRequest<'a>) -> GatewayFut<'a>;
}
