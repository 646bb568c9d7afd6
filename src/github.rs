//! GitHub REST 轻量客户端
//!
//! 只覆盖开 PR 与建仓两个操作，bearer token 鉴权，30 秒超时，
//! 非 2xx 响应带状态码与响应体抛错，外层套与 LLM 调用一致的重试策略。

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::reliability::{is_rate_limit_message, RetryClass, RetryPolicy};

const GITHUB_API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug, Clone)]
pub enum GitHubError {
    #[error("GITHUB_TOKEN is not set")]
    MissingToken,
    #[error("github request failed: {0}")]
    Transport(String),
    #[error("github api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected github response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        GitHubError::Transport(err.to_string())
    }
}

impl RetryClass for GitHubError {
    fn is_rate_limited(&self) -> bool {
        match self {
            GitHubError::Api { status, body } => *status == 429 || is_rate_limit_message(body),
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct PullResponse {
    html_url: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    html_url: String,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Result<Self, GitHubError> {
        Self::with_base_url(token, GITHUB_API_BASE)
    }

    /// 测试用：指向本地 mock 服务
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GitHubError> {
        let token = token.into();
        if token.is_empty() {
            return Err(GitHubError::MissingToken);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            token,
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post_expecting_201(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<String, GitHubError> {
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "forge")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() != 201 {
            return Err(GitHubError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// 在 owner/repo 上从 head 向 base 开一个 PR，返回 html_url
    pub async fn create_pull_request(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<String, GitHubError> {
        let url = format!("{}/repos/{}/pulls", self.base_url, repo);
        let payload = json!({
            "title": title,
            "body": body,
            "head": head,
            "base": base,
        });
        let text = self
            .retry
            .run(|| self.post_expecting_201(&url, &payload))
            .await?;
        let parsed: PullResponse = serde_json::from_str(&text)
            .map_err(|e| GitHubError::MalformedResponse(e.to_string()))?;
        Ok(parsed.html_url)
    }

    /// 在当前 token 对应账号下建仓，返回 html_url
    pub async fn create_repository(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> Result<String, GitHubError> {
        let url = format!("{}/user/repos", self.base_url);
        let payload = json!({
            "name": name,
            "description": description,
            "private": private,
            "auto_init": true,
        });
        let text = self
            .retry
            .run(|| self.post_expecting_201(&url, &payload))
            .await?;
        let parsed: RepoResponse = serde_json::from_str(&text)
            .map_err(|e| GitHubError::MalformedResponse(e.to_string()))?;
        Ok(parsed.html_url)
    }
}
