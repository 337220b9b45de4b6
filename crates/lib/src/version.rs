//! Ordered-tuple version comparison and toolchain version ranges.
//!
//! Versions are dot-separated numeric components of any length. Missing
//! trailing components count as zero, so `8.4` equals `8.4.0`. This is not
//! semantic versioning: there are no pre-release or build tags.
//!
//! The boolean helpers (`gte`, `lt`, `eq`, ...) fail closed: if either side
//! does not parse they return `false` instead of erroring, so compatibility
//! rules skip an optional feature rather than abort on something like
//! `nightly`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::VersionReq;
use thiserror::Error;

/// Errors that can occur while parsing versions or ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
  #[error("empty version string")]
  Empty,

  #[error("invalid version component '{component}' in '{version}'")]
  InvalidComponent { version: String, component: String },

  #[error("invalid version range '{range}': {message}")]
  InvalidRange { range: String, message: String },
}

/// A parsed numeric version.
#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
  /// Parse a dot-separated numeric version.
  pub fn parse(input: &str) -> Result<Self, VersionError> {
    let input = input.trim();
    if input.is_empty() {
      return Err(VersionError::Empty);
    }

    let components = input
      .split('.')
      .map(|component| {
        component.parse::<u64>().map_err(|_| VersionError::InvalidComponent {
          version: input.to_string(),
          component: component.to_string(),
        })
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self(components))
  }

  /// Numeric components as written.
  pub fn components(&self) -> &[u64] {
    &self.0
  }

  /// Convert to a semver version for range matching.
  ///
  /// Short versions are padded with zeros, components past the third are
  /// dropped (`2.6.1.3` matches as `2.6.1`).
  pub fn to_semver(&self) -> semver::Version {
    let part = |i: usize| self.0.get(i).copied().unwrap_or(0);
    semver::Version::new(part(0), part(1), part(2))
  }
}

impl FromStr for Version {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    let len = self.0.len().max(other.0.len());
    (0..len)
      .map(|i| {
        let a = self.0.get(i).copied().unwrap_or(0);
        let b = other.0.get(i).copied().unwrap_or(0);
        a.cmp(&b)
      })
      .find(|ord| ord.is_ne())
      .unwrap_or(Ordering::Equal)
  }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Version {}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
    write!(f, "{}", parts.join("."))
  }
}

/// Three-way comparison of two version strings.
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
  Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

fn holds(a: &str, b: &str, pred: impl FnOnce(Ordering) -> bool) -> bool {
  compare(a, b).map(pred).unwrap_or(false)
}

/// `a >= b`, false if either side is malformed.
pub fn gte(a: &str, b: &str) -> bool {
  holds(a, b, Ordering::is_ge)
}

/// `a > b`, false if either side is malformed.
pub fn gt(a: &str, b: &str) -> bool {
  holds(a, b, Ordering::is_gt)
}

/// `a < b`, false if either side is malformed.
pub fn lt(a: &str, b: &str) -> bool {
  holds(a, b, Ordering::is_lt)
}

/// `a <= b`, false if either side is malformed.
pub fn lte(a: &str, b: &str) -> bool {
  holds(a, b, Ordering::is_le)
}

/// `a == b` after zero padding, false if either side is malformed.
pub fn eq(a: &str, b: &str) -> bool {
  holds(a, b, Ordering::is_eq)
}

/// A set of acceptable versions in node-style range syntax.
///
/// Supported forms:
/// - `*` or empty: any version
/// - comparators separated by spaces or commas: `>=8.0 <9.6`
/// - operators detached from their version: `>= 8.0`
/// - hyphen ranges: `8.6 - 9.2` (inclusive)
/// - alternatives: `8.10.7 || >=9.4`
///
/// A bare version (`8.10`) means exactly that version prefix, as in npm.
#[derive(Debug, Clone)]
pub struct VersionRange {
  raw: String,
  alternatives: Vec<VersionReq>,
}

impl VersionRange {
  /// Parse a range string.
  pub fn parse(input: &str) -> Result<Self, VersionError> {
    let invalid = |message: String| VersionError::InvalidRange {
      range: input.to_string(),
      message,
    };

    let alternatives = input
      .split("||")
      .map(|alt| {
        let normalized = normalize_alternative(alt).map_err(&invalid)?;
        VersionReq::parse(&normalized).map_err(|e| invalid(e.to_string()))
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      raw: input.trim().to_string(),
      alternatives,
    })
  }

  /// The range as written by the user.
  pub fn as_str(&self) -> &str {
    &self.raw
  }

  /// Whether `version` lies in the range. Unparseable versions never match.
  pub fn matches(&self, version: &str) -> bool {
    let Ok(version) = Version::parse(version) else {
      return false;
    };
    let version = version.to_semver();
    self.alternatives.iter().any(|req| req.matches(&version))
  }
}

impl FromStr for VersionRange {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for VersionRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.raw)
  }
}

/// Rewrite one `||` alternative into the comma-separated syntax of `VersionReq`.
fn normalize_alternative(alt: &str) -> Result<String, String> {
  let mut tokens: Vec<String> = Vec::new();
  let mut pending_op: Option<String> = None;

  for token in alt.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
    if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
      if pending_op.is_some() {
        return Err(format!("operator '{token}' follows another operator"));
      }
      pending_op = Some(token.to_string());
      continue;
    }
    match pending_op.take() {
      Some(op) => tokens.push(format!("{op}{token}")),
      None => tokens.push(token.to_string()),
    }
  }

  if let Some(op) = pending_op {
    return Err(format!("operator '{op}' is missing a version"));
  }

  if tokens.is_empty() {
    return Ok("*".to_string());
  }

  // Hyphen range: `A - B`
  if tokens.len() == 3 && tokens[1] == "-" {
    return Ok(format!(">={}, <={}", tokens[0], tokens[2]));
  }
  if tokens.iter().any(|t| t == "-") {
    return Err("malformed hyphen range".to_string());
  }

  let comparators: Vec<String> = tokens
    .into_iter()
    .map(|t| {
      let bare = t.starts_with(|c: char| c.is_ascii_digit());
      let wildcard = t.contains(['*', 'x', 'X']);
      if bare && !wildcard { format!("={t}") } else { t }
    })
    .collect();

  Ok(comparators.join(", "))
}

#[cfg(test)]
mod tests {
  use super::*;

  mod compare {
    use super::*;

    #[test]
    fn trailing_zeros_are_equal() {
      assert!(eq("8.4", "8.4.0"));
      assert!(eq("8.4.0.0", "8.4"));
      assert_eq!(compare("8.4", "8.4.0").unwrap(), Ordering::Equal);
    }

    #[test]
    fn truncated_version_below_patch_release() {
      assert!(lt("8.4", "8.4.3"));
      assert!(gte("8.4.3", "8.4"));
      assert!(!gte("8.4", "8.4.3"));
    }

    #[test]
    fn components_compare_numerically() {
      assert!(gt("8.10.7", "8.8.4"));
      assert!(gte("9.10.1", "9.2"));
      assert!(lte("2.6.1.3", "2.6.2"));
    }

    #[test]
    fn malformed_versions_fail_closed() {
      assert!(!gte("nightly", "2.5.3"));
      assert!(!lt("nightly", "2.5.3"));
      assert!(!eq("2.6.x", "2.6.0"));
      assert!(!gte("2.6.4", ""));
    }

    #[test]
    fn parse_rejects_empty() {
      assert_eq!(Version::parse("  "), Err(VersionError::Empty));
    }

    #[test]
    fn display_keeps_written_components() {
      assert_eq!(Version::parse("2.6.4.3").unwrap().to_string(), "2.6.4.3");
    }
  }

  mod range {
    use super::*;

    #[test]
    fn star_matches_everything() {
      let range = VersionRange::parse("*").unwrap();
      assert!(range.matches("8.0.2"));
      assert!(range.matches("9.10.1"));
    }

    #[test]
    fn space_separated_comparators() {
      let range = VersionRange::parse(">=8.6 <9.6").unwrap();
      assert!(range.matches("8.10.7"));
      assert!(range.matches("9.4.8"));
      assert!(!range.matches("9.6.3"));
      assert!(!range.matches("8.4.4"));
    }

    #[test]
    fn detached_operator() {
      let range = VersionRange::parse(">= 9.2").unwrap();
      assert!(range.matches("9.4.7"));
      assert!(!range.matches("9.0.2"));
    }

    #[test]
    fn hyphen_range_is_inclusive() {
      let range = VersionRange::parse("8.6.5 - 9.2.8").unwrap();
      assert!(range.matches("8.6.5"));
      assert!(range.matches("9.2.8"));
      assert!(!range.matches("9.4.7"));
    }

    #[test]
    fn alternatives() {
      let range = VersionRange::parse("8.10.7 || >=9.4").unwrap();
      assert!(range.matches("8.10.7"));
      assert!(range.matches("9.6.3"));
      assert!(!range.matches("9.2.8"));
    }

    #[test]
    fn bare_minor_version_matches_its_patches() {
      let range = VersionRange::parse("9.4").unwrap();
      assert!(range.matches("9.4.8"));
      assert!(!range.matches("9.6.1"));
    }

    #[test]
    fn rejects_garbage() {
      assert!(VersionRange::parse(">=abc").is_err());
      assert!(VersionRange::parse(">=").is_err());
      assert!(VersionRange::parse("1 - 2 - 3").is_err());
    }

    #[test]
    fn malformed_candidate_never_matches() {
      let range = VersionRange::parse("*").unwrap();
      assert!(!range.matches("head"));
    }
  }
}
