use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

/// The generator's answer for one chunk. `Empty` marks a failed or blank answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Empty,
}

impl Fragment {
    pub fn from_answer(answer: &str) -> Self {
        let code = strip_code_fence(answer);
        if code.trim().is_empty() {
            Fragment::Empty
        } else {
            Fragment::Text(code)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Fragment::Text(text) => text,
            Fragment::Empty => "",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Fragment::Empty)
    }
}

/// Concatenate fragments in chunk order, each terminated by a newline.
pub fn combine(fragments: &[Fragment]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        out.push_str(fragment.as_str());
        out.push('\n');
    }
    out
}

/// Drop a surrounding Markdown code fence such as ```` ```ruby ````.
fn strip_code_fence(answer: &str) -> String {
    let trimmed = answer.trim();
    if !trimmed.starts_with("```") {
        return answer.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }
    lines.join("\n")
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned error status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Response has no answer field")]
    MissingAnswer,
}

impl GenerateError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerateError::Server { status, .. } => *status == 429 || *status >= 500,
            GenerateError::Request(e) => e.is_timeout(),
            GenerateError::MissingAnswer => false,
        }
    }
}

/// Anything that turns one chunk document into generated code.
pub trait Generate: Send + Sync + 'static {
    fn generate(&self, chunk: &str) -> impl Future<Output = Result<String, GenerateError>> + Send;
}

/// Client for a prompt-flow scoring endpoint answering `{"answer": "..."}`.
pub struct PromptFlowClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    html_string: &'a str,
    chat_history: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct PromptResponse {
    answer: Option<String>,
}

impl PromptFlowClient {
    pub fn new(http: Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

impl Generate for PromptFlowClient {
    async fn generate(&self, chunk: &str) -> Result<String, GenerateError> {
        let req = PromptRequest {
            html_string: chunk,
            chat_history: vec![serde_json::json!({})],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerateError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let res: PromptResponse = response.json().await?;
        res.answer.ok_or(GenerateError::MissingAnswer)
    }
}

/// Generate every chunk concurrently and return the fragments in chunk order.
/// Failures become [`Fragment::Empty`]; they never abort the run.
pub async fn generate_all<G: Generate>(
    generator: Arc<G>,
    chunks: Vec<String>,
    concurrency: usize,
) -> Vec<Fragment> {
    let total = chunks.len();
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} chunks ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let (tx, mut rx) = mpsc::channel::<(usize, Fragment)>(concurrency * 2);

    for (index, chunk) in chunks.into_iter().enumerate() {
        let generator = Arc::clone(&generator);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let fragment = match generate_with_retry(generator.as_ref(), index, &chunk).await {
                Ok(answer) => Fragment::from_answer(&answer),
                Err(e) => {
                    warn!("Chunk {} failed, using empty fragment: {}", index + 1, e);
                    Fragment::Empty
                }
            };
            let _ = tx.send((index, fragment)).await;
        });
    }

    drop(tx);

    // Slots keep chunk order no matter which task finishes first.
    let mut fragments = vec![Fragment::Empty; total];
    while let Some((index, fragment)) = rx.recv().await {
        fragments[index] = fragment;
        pb.inc(1);
    }

    pb.finish_and_clear();
    let empty = fragments.iter().filter(|f| f.is_empty()).count();
    info!("Generated {} fragments ({} empty)", total, empty);

    fragments
}

async fn generate_with_retry<G: Generate>(
    generator: &G,
    index: usize,
    chunk: &str,
) -> Result<String, GenerateError> {
    let mut attempt = 0;
    loop {
        match generator.generate(chunk).await {
            Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    "Chunk {} failed (attempt {}/{}): {}, backing off {:.1}s",
                    index + 1,
                    attempt + 1,
                    MAX_RETRIES,
                    e,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers with the chunk text wrapped in a fenced class, slower for earlier chunks.
    struct Echo;

    impl Generate for Echo {
        async fn generate(&self, chunk: &str) -> Result<String, GenerateError> {
            let delay = 30u64.saturating_sub(chunk.len() as u64 * 3);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if chunk.contains("fail") {
                return Err(GenerateError::MissingAnswer);
            }
            Ok(format!("```ruby\nclass P\n  link(:{chunk})\nend\n```"))
        }
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fence("```ruby\nclass A\nend\n```"), "class A\nend");
        assert_eq!(strip_code_fence("  ```\nx\n```  \n"), "x");
        assert_eq!(strip_code_fence("```ruby\nclass A"), "class A");
        assert_eq!(strip_code_fence("class A\nend"), "class A\nend");
    }

    #[test]
    fn fragment_from_answer() {
        assert_eq!(Fragment::from_answer(""), Fragment::Empty);
        assert_eq!(Fragment::from_answer("```ruby\n```"), Fragment::Empty);
        assert_eq!(
            Fragment::from_answer("class A\nend"),
            Fragment::Text("class A\nend".into())
        );
    }

    #[test]
    fn combine_keeps_empty_slots() {
        let fragments = vec![
            Fragment::Text("a".into()),
            Fragment::Empty,
            Fragment::Text("b".into()),
        ];
        assert_eq!(combine(&fragments), "a\n\nb\n");
        assert_eq!(combine(&[]), "");
    }

    #[test]
    fn retryable_errors() {
        let server = |status| GenerateError::Server {
            status,
            body: String::new(),
        };
        assert!(server(429).is_retryable());
        assert!(server(503).is_retryable());
        assert!(!server(401).is_retryable());
        assert!(!GenerateError::MissingAnswer.is_retryable());
    }

    #[tokio::test]
    async fn fragments_come_back_in_chunk_order() {
        let chunks: Vec<String> = ["a", "bb", "fail", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let fragments = generate_all(Arc::new(Echo), chunks, 3).await;

        assert_eq!(fragments.len(), 5);
        assert_eq!(fragments[0].as_str(), "class P\n  link(:a)\nend");
        assert_eq!(fragments[1].as_str(), "class P\n  link(:bb)\nend");
        assert!(fragments[2].is_empty());
        assert_eq!(fragments[4].as_str(), "class P\n  link(:eeeee)\nend");
    }

    #[tokio::test]
    async fn no_chunks() {
        let fragments = generate_all(Arc::new(Echo), Vec::new(), 0).await;
        assert!(fragments.is_empty());
    }
}
