//! Sources of raw option values.
//!
//! Every source is adapted to the single `Inputs` capability at the boundary,
//! so the resolver never cares whether a value came from the command line,
//! the environment, or a closure.

use std::collections::BTreeMap;

/// Looks up the raw value of a declared option or flag.
pub trait Inputs {
  /// Return the raw value for `name`, or `None` if the source has no value.
  fn lookup(&self, name: &str) -> Option<String>;
}

impl<T: Inputs + ?Sized> Inputs for &T {
  fn lookup(&self, name: &str) -> Option<String> {
    (**self).lookup(name)
  }
}

/// Explicit key/value pairs, e.g. from `--input name=value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapInputs {
  values: BTreeMap<String, String>,
}

impl MapInputs {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a raw value.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.values.insert(name.into(), value.into());
    self
  }

  /// Add a boolean flag, stored as `"true"` or `"false"`.
  pub fn with_flag(self, name: impl Into<String>, value: bool) -> Self {
    self.with(name, value.to_string())
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
    self.values.insert(name.into(), value.into());
  }

  /// Parse a `name=value` pair. The value may be empty; the name may not.
  pub fn parse_pair(pair: &str) -> Result<(String, String), String> {
    let (name, value) = pair
      .split_once('=')
      .ok_or_else(|| format!("expected NAME=VALUE, got '{pair}'"))?;
    let name = name.trim();
    if name.is_empty() {
      return Err(format!("empty input name in '{pair}'"));
    }
    Ok((name.to_string(), value.to_string()))
  }
}

impl Inputs for MapInputs {
  fn lookup(&self, name: &str) -> Option<String> {
    self.values.get(name).cloned()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapInputs {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }
}

/// Environment variables in the CI runner convention: `INPUT_<NAME>`, with
/// the name upper-cased and spaces replaced by underscores. Dashes are kept,
/// so `agda-version` reads `INPUT_AGDA-VERSION`.
#[derive(Debug, Clone)]
pub struct EnvInputs {
  prefix: String,
}

impl EnvInputs {
  pub fn new() -> Self {
    Self::with_prefix("INPUT_")
  }

  pub fn with_prefix(prefix: impl Into<String>) -> Self {
    Self { prefix: prefix.into() }
  }

  /// Environment variable consulted for `name`.
  pub fn var_name(&self, name: &str) -> String {
    format!("{}{}", self.prefix, name.replace(' ', "_").to_uppercase())
  }
}

impl Default for EnvInputs {
  fn default() -> Self {
    Self::new()
  }
}

impl Inputs for EnvInputs {
  fn lookup(&self, name: &str) -> Option<String> {
    std::env::var(self.var_name(name)).ok()
  }
}

/// A closure acting as an input source.
pub struct FnInputs<F>(pub F);

impl<F> Inputs for FnInputs<F>
where
  F: Fn(&str) -> Option<String>,
{
  fn lookup(&self, name: &str) -> Option<String> {
    (self.0)(name)
  }
}

/// Several sources in priority order; the first one with a value wins.
#[derive(Default)]
pub struct Chain<'a> {
  sources: Vec<Box<dyn Inputs + 'a>>,
}

impl<'a> Chain<'a> {
  pub fn new() -> Self {
    Self { sources: Vec::new() }
  }

  /// Append a lower-priority source.
  pub fn then(mut self, source: impl Inputs + 'a) -> Self {
    self.sources.push(Box::new(source));
    self
  }
}

impl Inputs for Chain<'_> {
  fn lookup(&self, name: &str) -> Option<String> {
    self.sources.iter().find_map(|source| source.lookup(name))
  }
}
