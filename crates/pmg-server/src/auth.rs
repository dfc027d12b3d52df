//! HTTP Basic-auth extractor for the operator endpoints.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};

use crate::{AppState, error::Error};

/// The single operator account allowed to back up and restore.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl AuthConfig {
  /// True only for the operator's name and a password matching the hash. An
  /// empty or malformed hash matches nothing.
  pub fn accepts(&self, username: &str, password: &str) -> bool {
    if username != self.username {
      return false;
    }
    let Ok(hash) = PasswordHash::new(&self.password_hash) else {
      return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &hash).is_ok()
  }
}

/// Username and password from an `Authorization: Basic …` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let encoded = headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Basic ")?;
  let decoded = String::from_utf8(B64.decode(encoded).ok()?).ok()?;
  let (username, password) = decoded.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// Present in a handler's arguments means the request came from the operator.
pub struct Operator;

impl<T, S> FromRequestParts<AppState<T, S>> for Operator
where
  T: Send + Sync,
  S: Send + Sync,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<T, S>,
  ) -> Result<Self, Self::Rejection> {
    match basic_credentials(&parts.headers) {
      Some((username, password)) if state.auth.accepts(&username, &password) => Ok(Operator),
      Some((username, _)) => {
        tracing::warn!(path = %parts.uri.path(), %username, "rejected operator credentials");
        Err(Error::Unauthorized)
      }
      None => Err(Error::Unauthorized),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(password: &str) -> AuthConfig {
    use argon2::{PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "operator".to_string(), password_hash: hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, value.parse().unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn credentials_are_decoded() {
    assert_eq!(
      basic_credentials(&headers(&basic("operator", "pa:ss"))),
      Some(("operator".to_owned(), "pa:ss".to_owned()))
    );
  }

  #[test]
  fn malformed_headers_carry_no_credentials() {
    assert_eq!(basic_credentials(&HeaderMap::new()), None);
    assert_eq!(basic_credentials(&headers("Basic !!!not-base64!!!")), None);
    assert_eq!(basic_credentials(&headers("Bearer abc")), None);
    assert_eq!(basic_credentials(&headers(&format!("Basic {}", B64.encode("no-colon")))), None);
  }

  #[test]
  fn operator_password_is_accepted() {
    let cfg = config("secret");
    assert!(cfg.accepts("operator", "secret"));
    assert!(!cfg.accepts("operator", "wrong"));
    assert!(!cfg.accepts("admin", "secret"));
  }

  #[test]
  fn empty_hash_rejects_everyone() {
    let cfg = AuthConfig { username: "operator".into(), password_hash: String::new() };
    assert!(!cfg.accepts("operator", ""));
  }
}
