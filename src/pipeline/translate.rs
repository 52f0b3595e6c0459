//! Translator interface and its backends.
//!
//! The orchestrator only sees `Arc<dyn Translator>`: one string in, one string
//! out. Three backends ship with the crate:
//!
//! * [`LlmTranslator`]: any chat model edgequake-llm can reach.
//! * [`GoogleTranslator`]: Google Cloud Translation v2 over REST.
//! * [`PassthroughTranslator`]: returns the input; used for dry runs.
//!
//! ## Retry Strategy
//!
//! Rate limits (HTTP 429 / 503) are transient under concurrent load. Both
//! network backends retry with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`); with 500 ms base and 3 retries the
//! wait sequence is 500 ms → 1 s → 2 s. Translating the same text twice is
//! harmless, so every call is safe to retry.
//!
//! The per-call deadline lives in [`translate_with_timeout`], applied by the
//! orchestrator around whichever backend is configured.

use crate::config::{ReflowConfig, TranslatorKind};
use crate::error::ReflowError;
use crate::prompts::translation_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Environment variable holding the Google Cloud Translation API key.
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_TRANSLATE_API_KEY";

const GOOGLE_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// Why a single translation call failed. Always recoverable for the page.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("request failed after {attempts} attempt(s): {detail}")]
    Failed { attempts: u32, detail: String },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Translate one paragraph of text.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &str;

    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// Text that is returned unchanged without calling any backend: blank text,
/// pure numbers (ignoring `.`, `,` and spaces) and anything shorter than two
/// non-space characters.
pub fn should_skip(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '.' | ',') && !c.is_whitespace())
        .collect();
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    trimmed.chars().filter(|c| !c.is_whitespace()).count() < 2
}

/// Call `translator` with a deadline. A timeout is reported like any other
/// translator failure.
pub async fn translate_with_timeout(
    translator: &dyn Translator,
    text: &str,
    secs: u64,
) -> Result<String, TranslateError> {
    match timeout(Duration::from_secs(secs), translator.translate(text)).await {
        Ok(result) => result,
        Err(_) => Err(TranslateError::Timeout { secs }),
    }
}

async fn with_retries<T, F, Fut>(
    backend: &str,
    max_retries: u32,
    retry_backoff_ms: u64,
    mut call: F,
) -> Result<T, TranslateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_err: Option<String> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                backend, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("{}: attempt {} failed: {}", backend, attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    Err(TranslateError::Failed {
        attempts: max_retries + 1,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

// ── LLM ───────────────────────────────────────────────────────────────────

/// Translator backed by an edgequake-llm chat provider.
///
/// The request is a system message (the translation prompt) followed by one
/// user message holding the paragraph.
pub struct LlmTranslator {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ReflowConfig) -> Self {
        let system_prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| translation_prompt(&config.target_lang));
        Self {
            provider,
            system_prompt,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    fn name(&self) -> &str {
        "llm"
    }

    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(text),
        ];

        let (messages, provider, options) = (&messages, &self.provider, &self.options);
        let response = with_retries("llm", self.max_retries, self.retry_backoff_ms, move || async move {
            provider
                .chat(messages, Some(options))
                .await
                .map_err(|e| e.to_string())
        })
        .await?;

        debug!(
            "llm: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        let translated = clean_llm_output(&response.content);
        if translated.is_empty() {
            return Err(TranslateError::InvalidResponse(
                "model returned an empty translation".to_string(),
            ));
        }
        Ok(translated)
    }
}

/// Build `CompletionOptions` from the reflow config.
fn build_options(config: &ReflowConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Trim the reply and strip a surrounding code fence some models add anyway.
fn clean_llm_output(content: &str) -> String {
    let trimmed = content.trim();
    if let Some(inner) = trimmed.strip_prefix("```") {
        let inner = inner.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        if let Some(body) = inner.trim_end().strip_suffix("```") {
            return body.trim().to_string();
        }
    }
    trimmed.to_string()
}

// ── Google ────────────────────────────────────────────────────────────────

/// Google Cloud Translation v2 (`POST /language/translate/v2`).
pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    source_lang: String,
    target_lang: String,
    max_retries: u32,
    retry_backoff_ms: u64,
}

#[derive(Serialize)]
struct GoogleRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct GoogleResponse {
    data: GoogleData,
}

#[derive(Deserialize)]
struct GoogleData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTranslation {
    translated_text: String,
}

impl GoogleTranslator {
    pub fn new(api_key: impl Into<String>, config: &ReflowConfig) -> Result<Self, ReflowError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ReflowError::TranslatorNotConfigured {
                translator: "google".to_string(),
                hint: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: GOOGLE_ENDPOINT.to_string(),
            api_key: api_key.into(),
            source_lang: google_lang_code(&config.source_lang),
            target_lang: google_lang_code(&config.target_lang),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    /// Read the API key from [`GOOGLE_API_KEY_ENV`].
    pub fn from_env(config: &ReflowConfig) -> Result<Self, ReflowError> {
        match std::env::var(GOOGLE_API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key, config),
            _ => Err(ReflowError::TranslatorNotConfigured {
                translator: "google".to_string(),
                hint: format!("Set {GOOGLE_API_KEY_ENV} to a Cloud Translation API key."),
            }),
        }
    }

    /// Point the client at another endpoint (proxies, local test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn request(&self, text: &str) -> Result<String, String> {
        let body = GoogleRequest {
            q: text,
            source: &self.source_lang,
            target: &self.target_lang,
            format: "text",
        };
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let parsed: GoogleResponse = response.json().await.map_err(|e| e.to_string())?;
        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| "response contained no translations".to_string())
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn name(&self) -> &str {
        "google"
    }

    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        with_retries("google", self.max_retries, self.retry_backoff_ms, move || {
            self.request(text)
        })
        .await
    }
}

/// Map short codes to the variants Cloud Translation expects.
fn google_lang_code(code: &str) -> String {
    match code.to_ascii_lowercase().as_str() {
        "zh" | "zh-hans" => "zh-CN".to_string(),
        "zh-hant" => "zh-TW".to_string(),
        _ => code.to_string(),
    }
}

// ── Passthrough ───────────────────────────────────────────────────────────

/// Returns every text unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    fn name(&self) -> &str {
        "none"
    }

    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

// ── Resolution ────────────────────────────────────────────────────────────

/// Resolve the translator, from most-specific to least-specific.
///
/// 1. **Pre-built translator** (`config.translator`), used as-is.
/// 2. **Configured kind** (`config.translator_kind`). For [`TranslatorKind::Llm`]
///    the provider is found by [`resolve_provider`].
pub fn resolve_translator(config: &ReflowConfig) -> Result<Arc<dyn Translator>, ReflowError> {
    if let Some(ref translator) = config.translator {
        return Ok(Arc::clone(translator));
    }

    match config.translator_kind {
        TranslatorKind::None => Ok(Arc::new(PassthroughTranslator)),
        TranslatorKind::Google => Ok(Arc::new(GoogleTranslator::from_env(config)?)),
        TranslatorKind::Llm => {
            let provider = resolve_provider(config)?;
            Ok(Arc::new(LlmTranslator::new(provider, config)))
        }
    }
}

/// Resolve the LLM provider.
///
/// 1. **Named provider + model** (`config.provider_name`).
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`), both set.
/// 3. **OpenAI** when `OPENAI_API_KEY` is set.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ReflowConfig) -> Result<Arc<dyn LLMProvider>, ReflowError> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReflowError::TranslatorNotConfigured {
            translator: "llm".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --translator none.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ReflowError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ReflowError::TranslatorNotConfigured {
            translator: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn skip_rule() {
        assert!(should_skip(""));
        assert!(should_skip("   \n"));
        assert!(should_skip("42"));
        assert!(should_skip("3.14"));
        assert!(should_skip("1,000,000"));
        assert!(should_skip("12 34"));
        assert!(should_skip("a"));
        assert!(should_skip(" x "));
        assert!(!should_skip("ok"));
        assert!(!should_skip("Figure 3"));
        assert!(!should_skip("中文"));
        assert!(should_skip("."), "single char is below the length floor");
    }

    #[test]
    fn strips_code_fences() {
        assert_eq!(clean_llm_output("  你好  "), "你好");
        assert_eq!(clean_llm_output("```text\n你好\n```"), "你好");
        assert_eq!(clean_llm_output("```\nA\nB\n```\n"), "A\nB");
    }

    #[test]
    fn google_codes() {
        assert_eq!(google_lang_code("zh"), "zh-CN");
        assert_eq!(google_lang_code("ja"), "ja");
    }

    /// Serve one HTTP request on a local port; returns the base URL and the
    /// raw request once it has been answered.
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/translate", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8(raw).unwrap()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn google_posts_query_and_reads_translation() {
        let (url, server) =
            serve_once(r#"{"data":{"translations":[{"translatedText":"你好"}]}}"#).await;
        let config = ReflowConfig::builder()
            .target_lang("zh")
            .max_retries(0)
            .build()
            .unwrap();
        let google = GoogleTranslator::new("test-key", &config)
            .unwrap()
            .with_endpoint(url);

        assert_eq!(google.translate("hello").await.unwrap(), "你好");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /translate?key=test-key "), "got: {request}");
        assert!(request.contains(r#""q":"hello""#), "got: {request}");
        assert!(request.contains(r#""target":"zh-CN""#), "got: {request}");
        assert!(request.contains(r#""format":"text""#), "got: {request}");
    }

    #[tokio::test]
    async fn google_empty_translation_list_fails() {
        let (url, server) = serve_once(r#"{"data":{"translations":[]}}"#).await;
        let config = ReflowConfig::builder().max_retries(0).build().unwrap();
        let google = GoogleTranslator::new("k", &config)
            .unwrap()
            .with_endpoint(url);

        let err = google.translate("hello").await.unwrap_err();
        assert!(err.to_string().contains("no translations"), "got: {err}");
        server.await.unwrap();
    }

    #[test]
    fn build_options_defaults() {
        let config = ReflowConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.3));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn prebuilt_translator_wins() {
        let config = ReflowConfig::builder()
            .translator_kind(TranslatorKind::Google)
            .translator(Arc::new(PassthroughTranslator))
            .build()
            .unwrap();
        let t = resolve_translator(&config).unwrap();
        assert_eq!(t.name(), "none");
    }

    #[test]
    fn none_kind_is_passthrough() {
        let config = ReflowConfig::builder()
            .translator_kind(TranslatorKind::None)
            .build()
            .unwrap();
        assert_eq!(resolve_translator(&config).unwrap().name(), "none");
    }

    #[tokio::test]
    async fn passthrough_returns_input() {
        let out = PassthroughTranslator.translate("Hello").await.unwrap();
        assert_eq!(out, "Hello");
    }

    struct Slow;

    #[async_trait]
    impl Translator for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn translate(&self, text: &str) -> Result<String, TranslateError> {
            sleep(Duration::from_secs(3600)).await;
            Ok(text.to_string())
        }
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let err = translate_with_timeout(&Slow, "Hello", 1).await.unwrap_err();
        assert_eq!(err, TranslateError::Timeout { secs: 1 });
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let out = with_retries("test", 3, 10, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("HTTP 429".to_string())
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_exhausted_reports_last_error() {
        let err = with_retries("test", 2, 10, || async { Err::<(), _>("HTTP 503".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TranslateError::Failed {
                attempts: 3,
                detail: "HTTP 503".to_string()
            }
        );
    }
}
