use std::{
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use pmg_backup::{Backups, tool::MigrationRunner, validate_backup_archive};
use pmg_core::store::{MemoryVersionStore, get_stored_version};
use rand_core::OsRng;
use tempfile::TempDir;
use tower::ServiceExt as _;

use super::*;
use crate::handlers::backup::DIGEST_HEADER;

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeTool {
  restores: Mutex<usize>,
}

impl DatabaseTool for FakeTool {
  fn engine(&self) -> &str { "postgresql" }

  async fn dump<'a>(&'a self, target: &'a Path) -> pmg_backup::Result<()> {
    let script = "-- PostgreSQL database dump\n".repeat(40);
    tokio::fs::write(target, script).await?;
    Ok(())
  }

  async fn restore<'a>(&'a self, _source: &'a Path) -> pmg_backup::Result<()> {
    *self.restores.lock().unwrap() += 1;
    Ok(())
  }
}

struct Fixed(Option<&'static str>);

impl VersionProbe for Fixed {
  fn current_version(&self) -> Option<String> { self.0.map(str::to_owned) }
}

struct Harness {
  state: AppState<FakeTool, MemoryVersionStore>,
  media: PathBuf,
  _dir:  TempDir,
}

const USER: &str = "operator";
const PASSWORD: &str = "secret";

fn harness(current: Option<&'static str>, stored: Option<&str>) -> Harness {
  let dir = tempfile::tempdir().unwrap();
  let media = dir.path().join("media");
  std::fs::create_dir_all(&media).unwrap();
  std::fs::write(media.join("logo.png"), b"logo").unwrap();

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(PASSWORD.as_bytes(), &salt)
    .unwrap()
    .to_string();

  let store = Arc::new(MemoryVersionStore::new(stored));
  let probe: Arc<dyn VersionProbe> = Arc::new(Fixed(current));
  let backups = Backups::new(
    FakeTool::default(),
    store.clone(),
    probe.clone(),
    MigrationRunner::disabled(),
    &media,
  );

  let state = AppState {
    backups:          Arc::new(backups),
    gate:             Arc::new(CompatibilityGate::new(store.clone(), probe.clone())),
    store,
    probe,
    auth:             Arc::new(AuthConfig { username: USER.into(), password_hash: hash }),
    max_upload_bytes: 16 * 1024 * 1024,
  };
  Harness { state, media, _dir: dir }
}

fn basic() -> String { format!("Basic {}", B64.encode(format!("{USER}:{PASSWORD}"))) }

async fn send(
  h: &Harness,
  method: &str,
  uri: &str,
  auth: bool,
  body: Vec<u8>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if auth {
    builder = builder.header(header::AUTHORIZATION, basic());
  }
  let req = builder.body(Body::from(body)).unwrap();
  router(h.state.clone()).oneshot(req).await.unwrap()
}

async fn body_bytes(resp: Response) -> Vec<u8> {
  axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap()
    .to_vec()
}

async fn body_json(resp: Response) -> serde_json::Value {
  serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

// ─── Gate ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn healthz_passes_open_gate() {
  let h = harness(Some("5.0.0"), Some("5.0.0"));
  let resp = send(&h, "GET", "/healthz", false, vec![]).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body_bytes(resp).await, b"ok");
}

#[tokio::test]
async fn downgrade_blocks_every_route() {
  let h = harness(Some("4.9.0"), Some("5.0.0"));

  for (method, uri) in [
    ("GET", "/healthz"),
    ("GET", "/admin/backup"),
    ("POST", "/admin/restore"),
    ("GET", "/no/such/page"),
  ] {
    let resp = send(&h, method, uri, true, vec![]).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE, "{method} {uri}");
    assert_eq!(
      resp.headers()[header::CONTENT_TYPE],
      "text/html; charset=utf-8"
    );
    let page = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(page.contains("4.9.0") && page.contains("5.0.0"), "{page}");
  }
  assert_eq!(*h.state.backups.tool().restores.lock().unwrap(), 0);
}

#[tokio::test]
async fn unknown_route_is_404_when_open() {
  let h = harness(Some("5.0.0"), None);
  let resp = send(&h, "GET", "/no/such/page", false, vec![]).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn operator_routes_require_credentials() {
  let h = harness(Some("5.0.0"), None);
  for (method, uri) in [
    ("GET", "/admin/backup"),
    ("POST", "/admin/restore"),
    ("GET", "/admin/version"),
  ] {
    let resp = send(&h, method, uri, false, vec![]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}

// ─── Backup / restore ────────────────────────────────────────────────────────

#[tokio::test]
async fn backup_download_is_a_valid_archive() {
  let h = harness(Some("5.0.0"), None);
  let resp = send(&h, "GET", "/admin/backup", true, vec![]).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/gzip");

  let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_owned();
  assert!(disposition.starts_with("attachment; filename=\"pmg-portal-backup-"), "{disposition}");
  assert!(disposition.ends_with(".tar.gz\""), "{disposition}");
  let digest = resp.headers()[DIGEST_HEADER].to_str().unwrap().to_owned();

  let bytes = body_bytes(resp).await;
  assert_eq!(pmg_backup::archive::archive_digest(&bytes), digest);

  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("download.tar.gz");
  std::fs::write(&path, &bytes).unwrap();
  let manifest = validate_backup_archive(&path).unwrap();
  assert_eq!(manifest.app_version, "5.0.0");
}

#[tokio::test]
async fn invalid_upload_returns_validator_message() {
  let h = harness(Some("5.0.0"), None);
  let resp = send(&h, "POST", "/admin/restore", true, b"not an archive".to_vec()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let json = body_json(resp).await;
  let msg = json["error"].as_str().unwrap();
  assert!(msg.starts_with("Not a valid .tar.gz archive"), "{msg}");
  assert_eq!(*h.state.backups.tool().restores.lock().unwrap(), 0);
}

#[tokio::test]
async fn oversized_upload_is_refused_before_validation() {
  let mut h = harness(Some("5.0.0"), None);
  h.state.max_upload_bytes = 64;

  let resp = send(&h, "POST", "/admin/restore", true, vec![0u8; 65]).await;
  assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
  let json = body_json(resp).await;
  assert!(json["error"].as_str().unwrap().contains("64-byte limit"), "{json}");
  assert_eq!(*h.state.backups.tool().restores.lock().unwrap(), 0);
}

#[tokio::test]
async fn upload_at_the_limit_reaches_validation() {
  let mut h = harness(Some("5.0.0"), None);
  h.state.max_upload_bytes = 64;

  let resp = send(&h, "POST", "/admin/restore", true, vec![0u8; 64]).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let json = body_json(resp).await;
  assert!(json["error"].as_str().unwrap().starts_with("Not a valid .tar.gz archive"), "{json}");
}

#[tokio::test]
async fn downloaded_backup_restores() {
  let h = harness(Some("5.0.0"), Some("4.0.0"));
  let archive = body_bytes(send(&h, "GET", "/admin/backup", true, vec![]).await).await;

  std::fs::remove_file(h.media.join("logo.png")).unwrap();
  std::fs::write(h.media.join("added-later.png"), b"new").unwrap();

  let resp = send(&h, "POST", "/admin/restore", true, archive).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let json = body_json(resp).await;
  assert_eq!(json["status"], "restored");
  assert_eq!(json["format_version"], "1");
  assert_eq!(json["app_version"], "5.0.0");

  assert_eq!(*h.state.backups.tool().restores.lock().unwrap(), 1);
  assert!(h.media.join("logo.png").is_file());
  assert!(!h.media.join("added-later.png").exists());
  assert_eq!(get_stored_version(h.state.store.as_ref()).await.as_deref(), Some("5.0.0"));
}

#[tokio::test]
async fn version_report_reads_fresh_values() {
  let h = harness(Some("5.0.0"), Some("4.0.0"));
  // The gate caches its verdict on the first request.
  send(&h, "GET", "/healthz", false, vec![]).await;
  h.state.store.replace(Some("6.0.0"));

  let resp = send(&h, "GET", "/admin/version", true, vec![]).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let json = body_json(resp).await;
  assert_eq!(json["current"], "5.0.0");
  assert_eq!(json["stored"], "6.0.0");
  assert_eq!(json["compatible"], false);
  assert!(json["message"].as_str().unwrap().contains("6.0.0"));
}
