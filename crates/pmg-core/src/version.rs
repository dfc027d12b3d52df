//! Application version parsing and ordering.
//!
//! Versions look like `MAJOR.MINOR.PATCH[-suffix]`, e.g. `4.8.0-beta.2`. The
//! numeric part orders first; the suffix only breaks ties. An absent suffix
//! is the empty string and therefore sorts before any prerelease suffix, so
//! `1.0.0 > 1.0.0-beta.1`: a final release is newer than its prereleases.

use std::cmp::Ordering;

/// One numeric component of any size, held as its decimal digits with
/// leading zeros removed. Zero is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number(String);

impl Number {
  /// Parses an optionally `+`-signed run of ASCII digits.
  pub fn parse(segment: &str) -> Option<Self> {
    let digits = segment.strip_prefix('+').unwrap_or(segment);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
      return None;
    }
    Some(Self(digits.trim_start_matches('0').to_owned()))
  }

  pub fn digits(&self) -> &str { if self.0.is_empty() { "0" } else { &self.0 } }
}

impl Ord for Number {
  /// More digits is larger; equal lengths compare digit by digit.
  fn cmp(&self, other: &Self) -> Ordering {
    self.0.len().cmp(&other.0.len()).then_with(|| self.0.cmp(&other.0))
  }
}

impl PartialOrd for Number {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl From<u64> for Number {
  fn from(n: u64) -> Self {
    Self(if n == 0 { String::new() } else { n.to_string() })
  }
}

/// A version string split into its numeric components and suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
  /// Leading dot-separated integers; parsing stops at the first segment
  /// that is not a number.
  pub numbers: Vec<Number>,
  /// Everything from the first `-` onwards (including the dash), or empty.
  pub suffix:  String,
}

/// Split `raw` into `(numbers, suffix)`.
///
/// `"4.8.0-beta.2"` → `([4, 8, 0], "-beta.2")`.
pub fn parse(raw: &str) -> ParsedVersion {
  let raw = raw.trim();
  let (head, suffix) = match raw.split_once('-') {
    Some((head, rest)) => (head, format!("-{rest}")),
    None => (raw, String::new()),
  };

  let numbers = head
    .split('.')
    .map_while(|segment| Number::parse(segment.trim()))
    .collect();

  ParsedVersion { numbers, suffix }
}

/// Order `current` relative to `stored`.
///
/// `None` is older than every concrete version, including the empty string;
/// two `None`s are equal. Numeric components compare lexicographically (a
/// shorter tuple that is a prefix of a longer one is older), then suffixes
/// compare as plain strings.
pub fn compare(current: Option<&str>, stored: Option<&str>) -> Ordering {
  match (current, stored) {
    (None, None) => Ordering::Equal,
    (None, Some(_)) => Ordering::Less,
    (Some(_), None) => Ordering::Greater,
    (Some(current), Some(stored)) => {
      let current = parse(current);
      let stored = parse(stored);
      current
        .numbers
        .cmp(&stored.numbers)
        .then_with(|| current.suffix.cmp(&stored.suffix))
    }
  }
}
