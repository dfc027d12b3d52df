//! Discovery of the running code's version.

use std::{
  fs,
  path::{Path, PathBuf},
};

/// Where the deployed tree keeps its version descriptor when it lives at
/// the conventional install location.
pub const INSTALL_VERSION_FILE: &str = "/opt/pmg-portal/VERSION";

/// Anything that can tell which application version is running.
pub trait VersionProbe: Send + Sync {
  /// The running version, or `None` when it cannot be determined. Never
  /// fails.
  fn current_version(&self) -> Option<String>;
}

/// Reads the version from the first usable file in an ordered candidate list.
#[derive(Debug, Clone)]
pub struct FileVersionProbe {
  candidates: Vec<PathBuf>,
}

impl FileVersionProbe {
  pub fn new(candidates: Vec<PathBuf>) -> Self { Self { candidates } }

  /// The deployment search order relative to the application directory:
  /// the parent directory first, then the directory itself, then the
  /// install location.
  pub fn default_candidates(base_dir: &Path) -> Vec<PathBuf> {
    let parent = base_dir.parent().unwrap_or(base_dir);
    vec![
      parent.join("VERSION"),
      base_dir.join("VERSION"),
      PathBuf::from(INSTALL_VERSION_FILE),
    ]
  }

  pub fn candidates(&self) -> &[PathBuf] { &self.candidates }
}

impl VersionProbe for FileVersionProbe {
  /// Missing files, permission errors, non-UTF-8 content and empty files are
  /// all skipped in favour of the next candidate.
  fn current_version(&self) -> Option<String> {
    self.candidates.iter().find_map(|path| {
      let raw = fs::read_to_string(path).ok()?;
      let trimmed = raw.trim();
      (!trimmed.is_empty()).then(|| trimmed.to_owned())
    })
  }
}

/// Used when no version source is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVersionProbe;

impl VersionProbe for NullVersionProbe {
  fn current_version(&self) -> Option<String> { None }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn first_existing_non_empty_file_wins() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    let empty = dir.path().join("empty");
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    fs::write(&empty, "  \n").unwrap();
    fs::write(&first, "4.8.0-beta.2\n").unwrap();
    fs::write(&second, "9.9.9").unwrap();

    let probe = FileVersionProbe::new(vec![missing, empty, first, second]);
    assert_eq!(probe.current_version().as_deref(), Some("4.8.0-beta.2"));
  }

  #[test]
  fn undecodable_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let binary = dir.path().join("binary");
    let good = dir.path().join("good");
    fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();
    fs::write(&good, "1.0.0").unwrap();

    let probe = FileVersionProbe::new(vec![binary, good]);
    assert_eq!(probe.current_version().as_deref(), Some("1.0.0"));
  }

  #[test]
  fn directory_candidate_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let probe = FileVersionProbe::new(vec![dir.path().to_path_buf()]);
    assert_eq!(probe.current_version(), None);
  }

  #[test]
  fn no_candidates_yields_none() {
    assert_eq!(FileVersionProbe::new(vec![]).current_version(), None);
    assert_eq!(NullVersionProbe.current_version(), None);
  }

  #[test]
  fn default_candidates_start_with_parent() {
    let c = FileVersionProbe::default_candidates(Path::new("/srv/portal/src"));
    assert_eq!(c[0], PathBuf::from("/srv/portal/VERSION"));
    assert_eq!(c[1], PathBuf::from("/srv/portal/src/VERSION"));
    assert_eq!(c[2], PathBuf::from(INSTALL_VERSION_FILE));
  }
}
