//! Upload checking: decide whether a file is a restorable backup without
//! restoring it.
//!
//! Safe on untrusted input. Nothing is extracted or executed; the only data
//! read into memory is the manifest, capped at [`MAX_MANIFEST_BYTES`], and
//! the dump contributes nothing but its header size.

use std::{
  fs::File,
  io::{BufReader, Read},
  path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use pmg_core::manifest::{DATABASE_FILENAME, MANIFEST_FILENAME, Manifest};
use thiserror::Error;

/// Smallest plausible dump. Even an empty database dumps a header of SET
/// statements well above this; anything smaller is a failed capture.
pub const MIN_DUMP_BYTES: u64 = 256;

pub const MAX_MANIFEST_BYTES: u64 = 64 * 1024;

/// Why an upload is not a restorable backup. The messages are shown to
/// operators verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidArchive {
  #[error("Could not open the uploaded file: {0}")]
  Unreadable(String),

  #[error("Not a valid .tar.gz archive: {0}")]
  NotTarGz(String),

  #[error("Not a PMG Portal backup: the archive contains neither manifest.json nor database.sql.")]
  NotABackup,

  #[error("Backup is incomplete: manifest.json is missing.")]
  MissingManifest,

  #[error("Backup is incomplete: database.sql is missing.")]
  MissingDump,

  #[error("Backup is corrupted: the archive contains more than one {0}.")]
  DuplicateEntry(&'static str),

  #[error("Backup is corrupted: manifest.json is not a regular file.")]
  ManifestNotFile,

  #[error("Backup is corrupted: manifest.json could not be read: {0}")]
  ManifestUnreadable(String),

  #[error("Backup is corrupted: manifest.json is larger than 64 KiB.")]
  ManifestTooLarge,

  #[error("Backup is corrupted: manifest.json is not valid JSON: {0}")]
  ManifestMalformed(String),

  #[error("Backup manifest has no format version.")]
  MissingFormatVersion,

  #[error(
    "Unsupported backup format version {found:?}. Supported versions: {}.",
    .supported.join(", ")
  )]
  UnsupportedFormat {
    found:     String,
    supported: Vec<String>,
  },

  #[error("This backup is for a different database engine ({found:?}); only {expected:?} is supported.")]
  EngineMismatch { found: String, expected: String },

  #[error("Backup is corrupted: database.sql is not a regular file.")]
  DumpNotFile,

  #[error("Backup is corrupted: database.sql is only {size} bytes (minimum {min}); the dump looks truncated.")]
  DumpTooSmall { size: u64, min: u64 },
}

impl From<pmg_core::Error> for InvalidArchive {
  fn from(e: pmg_core::Error) -> Self {
    use pmg_core::Error as Core;
    match e {
      Core::MissingFormatVersion => Self::MissingFormatVersion,
      Core::UnsupportedFormatVersion { found, supported } => {
        Self::UnsupportedFormat { found, supported }
      }
      Core::EngineMismatch { found, expected } => Self::EngineMismatch { found, expected },
      other => Self::ManifestMalformed(other.to_string()),
    }
  }
}

/// What one pass over the archive saw of the two entries that matter.
#[derive(Default)]
struct Listing {
  manifest: Option<EntryInfo<Result<Vec<u8>, InvalidArchive>>>,
  dump:     Option<EntryInfo<u64>>,
}

struct EntryInfo<T> {
  is_file: bool,
  data:    T,
}

/// Check that `path` holds a restorable backup, returning its manifest.
///
/// Checks run in order and stop at the first failure: the container is a
/// gzip tar, both required entries are present, the manifest is a readable
/// JSON file, its format version and engine are supported, and the dump is
/// a regular file of plausible size.
pub fn validate_backup_archive(path: &Path) -> Result<Manifest, InvalidArchive> {
  let listing = list(path)?;

  let (manifest, dump) = match (listing.manifest, listing.dump) {
    (None, None) => return Err(InvalidArchive::NotABackup),
    (None, Some(_)) => return Err(InvalidArchive::MissingManifest),
    (Some(_), None) => return Err(InvalidArchive::MissingDump),
    (Some(manifest), Some(dump)) => (manifest, dump),
  };

  if !manifest.is_file {
    return Err(InvalidArchive::ManifestNotFile);
  }
  let bytes = manifest.data?;
  let manifest = Manifest::from_slice(&bytes)?;
  if manifest.version.is_empty() {
    return Err(InvalidArchive::MissingFormatVersion);
  }
  manifest.check_restorable()?;

  if !dump.is_file {
    return Err(InvalidArchive::DumpNotFile);
  }
  if dump.data <= MIN_DUMP_BYTES {
    return Err(InvalidArchive::DumpTooSmall { size: dump.data, min: MIN_DUMP_BYTES });
  }

  Ok(manifest)
}

/// Walk every entry header once, keeping the manifest bytes and the dump
/// size. Entry bodies other than the manifest are skipped unread. Either
/// entry appearing twice fails the walk.
fn list(path: &Path) -> Result<Listing, InvalidArchive> {
  let file = File::open(path).map_err(|e| InvalidArchive::Unreadable(e.to_string()))?;
  let len = file
    .metadata()
    .map_err(|e| InvalidArchive::Unreadable(e.to_string()))?
    .len();
  if len == 0 {
    return Err(InvalidArchive::NotTarGz("the file is empty".to_owned()));
  }

  let not_tar = |e: std::io::Error| InvalidArchive::NotTarGz(e.to_string());
  let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
  let mut listing = Listing::default();
  let mut seen_any = false;

  for entry in archive.entries().map_err(not_tar)? {
    let mut entry = entry.map_err(not_tar)?;
    seen_any = true;

    let name = entry_name(&entry.path().map_err(not_tar)?);
    let is_file = entry.header().entry_type().is_file();

    // Extraction lets a later member overwrite an earlier one, so a second
    // copy would be restored without ever being checked here.
    if name == MANIFEST_FILENAME {
      if listing.manifest.is_some() {
        return Err(InvalidArchive::DuplicateEntry(MANIFEST_FILENAME));
      }
      let data = if is_file { read_manifest(&mut entry) } else { Ok(Vec::new()) };
      listing.manifest = Some(EntryInfo { is_file, data });
    } else if name == DATABASE_FILENAME {
      if listing.dump.is_some() {
        return Err(InvalidArchive::DuplicateEntry(DATABASE_FILENAME));
      }
      listing.dump = Some(EntryInfo { is_file, data: entry.size() });
    }
  }

  if !seen_any {
    return Err(InvalidArchive::NotTarGz("the archive has no entries".to_owned()));
  }
  Ok(listing)
}

fn read_manifest(entry: &mut impl Read) -> Result<Vec<u8>, InvalidArchive> {
  let mut bytes = Vec::new();
  entry
    .take(MAX_MANIFEST_BYTES + 1)
    .read_to_end(&mut bytes)
    .map_err(|e| InvalidArchive::ManifestUnreadable(e.to_string()))?;
  if bytes.len() as u64 > MAX_MANIFEST_BYTES {
    return Err(InvalidArchive::ManifestTooLarge);
  }
  Ok(bytes)
}

/// Archive member name with any leading `./` and trailing `/` removed.
fn entry_name(path: &Path) -> String {
  let normalised: PathBuf = path
    .components()
    .filter(|c| !matches!(c, std::path::Component::CurDir))
    .collect();
  normalised.to_string_lossy().into_owned()
}
