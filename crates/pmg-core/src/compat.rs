//! Downgrade detection: is the running code at least as new as the version
//! the database last saw?

use std::cmp::Ordering;

use serde::Serialize;

use crate::version::compare;

/// Outcome of a compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compatibility {
  pub ok:      bool,
  pub current: Option<String>,
  pub stored:  Option<String>,
  /// Operator-facing explanation; present only when `ok` is false.
  pub message: Option<String>,
}

impl Compatibility {
  /// The result used when the check itself could not run.
  pub fn assumed_ok() -> Self {
    Self { ok: true, current: None, stored: None, message: None }
  }
}

/// Compare the running version with the stored one.
///
/// Upgrades, equal versions and fresh installs (nothing stored) are
/// compatible. A stored version newer than the running code is a downgrade.
pub fn check(current: Option<String>, stored: Option<String>) -> Compatibility {
  if compare(current.as_deref(), stored.as_deref()) != Ordering::Less {
    return Compatibility { ok: true, current, stored, message: None };
  }

  let message = format!(
    "Version downgrade detected. Database was last used with version {stored:?}, \
     but current code is {current:?}. To downgrade safely, run the schema \
     migrations backwards to match this version, or restore a backup taken \
     with this version, then restart the service.",
    stored = stored.as_deref().unwrap_or_default(),
    current = current.as_deref().unwrap_or_default(),
  );
  Compatibility { ok: false, current, stored, message: Some(message) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn downgrade_names_both_versions() {
    let c = check(Some("4.9.0".into()), Some("5.0.0".into()));
    assert!(!c.ok);
    let msg = c.message.unwrap();
    assert!(msg.contains("4.9.0"), "{msg}");
    assert!(msg.contains("5.0.0"), "{msg}");
  }

  #[test]
  fn fresh_install_is_ok() {
    let c = check(Some("1.0.0".into()), None);
    assert!(c.ok);
    assert!(c.message.is_none());
  }

  #[test]
  fn upgrade_and_equal_are_ok() {
    assert!(check(Some("5.1.0".into()), Some("5.0.0".into())).ok);
    assert!(check(Some("5.0.0".into()), Some("5.0.0".into())).ok);
  }

  #[test]
  fn unknown_running_version_with_stored_version_blocks() {
    let c = check(None, Some("1.0.0".into()));
    assert!(!c.ok);
  }
}
