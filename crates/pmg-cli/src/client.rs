//! Async HTTP client for the pmg-server operator endpoints.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Response};
use serde::Deserialize;

/// Connection settings for a running pmg-server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// A downloaded archive and the name the server suggested for it.
pub struct Download {
  pub filename: Option<String>,
  pub sha256:   Option<String>,
  pub bytes:    Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct Restored {
  pub format_version: String,
  pub app_version:    String,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    // No overall timeout: a backup or restore runs as long as the database
    // tools do.
    let client = Client::builder()
      .connect_timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/admin{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req.basic_auth(&self.config.username, Some(&self.config.password))
  }

  /// `GET /admin/backup`
  pub async fn backup(&self) -> Result<Download> {
    let resp = self
      .auth(self.client.get(self.url("/backup")))
      .send()
      .await
      .context("GET /admin/backup failed")?;
    let resp = check(resp, "GET /admin/backup").await?;

    let header = |name: &'static str| {
      resp
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    };
    let filename = header("content-disposition")
      .as_deref()
      .and_then(filename_from_disposition);
    let sha256 = header("x-backup-sha256");

    let bytes = resp.bytes().await.context("reading backup body")?.to_vec();
    Ok(Download { filename, sha256, bytes })
  }

  /// `POST /admin/restore` with the archive as the raw body.
  pub async fn restore(&self, archive: Vec<u8>) -> Result<Restored> {
    let resp = self
      .auth(self.client.post(self.url("/restore")))
      .header(reqwest::header::CONTENT_TYPE, "application/gzip")
      .body(archive)
      .send()
      .await
      .context("POST /admin/restore failed")?;
    let resp = check(resp, "POST /admin/restore").await?;
    resp.json().await.context("deserialising restore result")
  }
}

/// Turn a non-success response into an error carrying the server's message.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let text = resp.text().await.unwrap_or_default();
  let message = serde_json::from_str::<ErrorBody>(&text)
    .map(|b| b.error)
    .unwrap_or(text);
  Err(anyhow!("{what} → {status}: {message}"))
}

/// `attachment; filename="x.tar.gz"` → `x.tar.gz`. Path separators are
/// rejected so the name cannot escape the working directory.
pub fn filename_from_disposition(value: &str) -> Option<String> {
  let name = value
    .split(';')
    .map(str::trim)
    .find_map(|part| part.strip_prefix("filename="))?
    .trim_matches('"');
  (!name.is_empty() && !name.contains(['/', '\\']) && name != "..").then(|| name.to_owned())
}
