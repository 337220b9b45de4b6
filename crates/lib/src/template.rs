//! Distribution name templates.
//!
//! Names are rendered from a small subset of mustache over a fixed set of
//! fields. Templates are parsed once when options are resolved, so a typo in
//! a field name fails before any long-running work starts.
//!
//! # Syntax
//!
//! - `{{{field}}}` / `{{&field}}` - field value, verbatim
//! - `{{field}}` - field value, HTML-escaped
//! - `{{#field}}...{{/field}}` - rendered only if the field has a value
//! - `{{^field}}...{{/field}}` - rendered only if the field has no value
//! - `{{!comment}}` - ignored
//!
//! Rendered names become file and artifact names, so templates should use
//! the triple-brace form.
//!
//! # Example
//!
//! ```
//! use agdist_lib::template::{Field, Fields, Template};
//!
//! struct Agda;
//! impl Fields for Agda {
//!   fn field(&self, field: Field) -> Option<&str> {
//!     match field {
//!       Field::Agda => Some("2.6.4"),
//!       _ => None,
//!     }
//!   }
//! }
//!
//! let template = Template::parse("agda-{{{agda}}}{{#icu}}-icu{{{icu}}}{{/icu}}").unwrap();
//! assert_eq!(template.render(&Agda), "agda-2.6.4");
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::consts::DEFAULT_BDIST_TEMPLATE;
use crate::context::Context;
use crate::options::BuildOptions;

/// Fields a template may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
  Agda,
  Ghc,
  Cabal,
  Stack,
  Icu,
  Upx,
  Arch,
  Platform,
  Release,
}

impl Field {
  pub const ALL: [Field; 9] = [
    Field::Agda,
    Field::Ghc,
    Field::Cabal,
    Field::Stack,
    Field::Icu,
    Field::Upx,
    Field::Arch,
    Field::Platform,
    Field::Release,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Field::Agda => "agda",
      Field::Ghc => "ghc",
      Field::Cabal => "cabal",
      Field::Stack => "stack",
      Field::Icu => "icu",
      Field::Upx => "upx",
      Field::Arch => "arch",
      Field::Platform => "platform",
      Field::Release => "release",
    }
  }
}

impl FromStr for Field {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Field::ALL.into_iter().find(|f| f.as_str() == s).ok_or(())
  }
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Errors that can occur while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed tag at position {0}")]
  Unclosed(usize),

  #[error("empty tag at position {0}")]
  EmptyTag(usize),

  #[error("unknown field '{name}' at position {position}")]
  UnknownField { name: String, position: usize },

  #[error("section '{0}' is never closed")]
  UnclosedSection(Field),

  #[error("closing tag '{name}' at position {position} has no open section")]
  UnexpectedClose { name: String, position: usize },

  #[error("section '{expected}' closed by '{found}' at position {position}")]
  MismatchedClose {
    expected: Field,
    found: String,
    position: usize,
  },
}

/// Provides field values during rendering.
pub trait Fields {
  /// Value of `field`, or `None` if it has no value.
  fn field(&self, field: Field) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
  Text(String),
  Var { field: Field, escape: bool },
  Section { field: Field, inverted: bool, children: Vec<Node> },
}

enum Tag<'a> {
  Var { name: &'a str, escape: bool },
  Open { name: &'a str, inverted: bool },
  Close(&'a str),
  Comment,
}

fn classify(inner: &str) -> Tag<'_> {
  match inner.chars().next() {
    Some('#') => Tag::Open {
      name: inner[1..].trim(),
      inverted: false,
    },
    Some('^') => Tag::Open {
      name: inner[1..].trim(),
      inverted: true,
    },
    Some('/') => Tag::Close(inner[1..].trim()),
    Some('!') => Tag::Comment,
    Some('&') => Tag::Var {
      name: inner[1..].trim(),
      escape: false,
    },
    _ => Tag::Var {
      name: inner.trim(),
      escape: true,
    },
  }
}

fn lookup_field(name: &str, position: usize) -> Result<Field, TemplateError> {
  if name.is_empty() {
    return Err(TemplateError::EmptyTag(position));
  }
  name.parse().map_err(|_| TemplateError::UnknownField {
    name: name.to_string(),
    position,
  })
}

/// An open section while parsing.
struct Frame {
  field: Field,
  inverted: bool,
  parent: Vec<Node>,
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
  nodes: Vec<Node>,
}

impl Template {
  /// Parse a template, validating every field name.
  pub fn parse(input: &str) -> Result<Self, TemplateError> {
    let mut nodes: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut rest = input;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
      if start > 0 {
        nodes.push(Node::Text(rest[..start].to_string()));
      }
      let position = offset + start;
      let after = &rest[start + 2..];

      let (tag, consumed) = match after.strip_prefix('{') {
        Some(inner) => {
          let end = inner.find("}}}").ok_or(TemplateError::Unclosed(position))?;
          let tag = Tag::Var {
            name: inner[..end].trim(),
            escape: false,
          };
          (tag, 3 + end + 3)
        }
        None => {
          let end = after.find("}}").ok_or(TemplateError::Unclosed(position))?;
          (classify(&after[..end]), 2 + end + 2)
        }
      };

      match tag {
        Tag::Var { name, escape } => {
          let field = lookup_field(name, position)?;
          nodes.push(Node::Var { field, escape });
        }
        Tag::Open { name, inverted } => {
          let field = lookup_field(name, position)?;
          stack.push(Frame {
            field,
            inverted,
            parent: std::mem::take(&mut nodes),
          });
        }
        Tag::Close(name) => {
          let frame = stack.pop().ok_or_else(|| TemplateError::UnexpectedClose {
            name: name.to_string(),
            position,
          })?;
          if name != frame.field.as_str() {
            return Err(TemplateError::MismatchedClose {
              expected: frame.field,
              found: name.to_string(),
              position,
            });
          }
          let children = std::mem::replace(&mut nodes, frame.parent);
          nodes.push(Node::Section {
            field: frame.field,
            inverted: frame.inverted,
            children,
          });
        }
        Tag::Comment => {}
      }

      rest = &rest[start + consumed..];
      offset = position + consumed;
    }

    if let Some(frame) = stack.pop() {
      return Err(TemplateError::UnclosedSection(frame.field));
    }

    if !rest.is_empty() {
      nodes.push(Node::Text(rest.to_string()));
    }

    Ok(Self { nodes })
  }

  /// Render the template. Fields without a value render as empty text.
  pub fn render(&self, fields: &impl Fields) -> String {
    let mut out = String::new();
    render_nodes(&self.nodes, fields, &mut out);
    out
  }
}

fn is_truthy(value: Option<&str>) -> bool {
  value.is_some_and(|v| !v.is_empty() && v != "false")
}

fn render_nodes(nodes: &[Node], fields: &impl Fields, out: &mut String) {
  for node in nodes {
    match node {
      Node::Text(text) => out.push_str(text),
      Node::Var { field, escape } => {
        let value = fields.field(*field).unwrap_or_default();
        if *escape {
          out.push_str(&html_escape(value));
        } else {
          out.push_str(value);
        }
      }
      Node::Section {
        field,
        inverted,
        children,
      } => {
        if is_truthy(fields.field(*field)) != *inverted {
          render_nodes(children, fields, out);
        }
      }
    }
  }
}

/// Escape the characters mustache escapes in double-brace tags.
fn html_escape(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  for c in value.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      '/' => out.push_str("&#x2F;"),
      '`' => out.push_str("&#x60;"),
      '=' => out.push_str("&#x3D;"),
      c => out.push(c),
    }
  }
  out
}

/// Field values of a resolved build on the current platform.
pub struct NameFields<'a> {
  pub options: &'a BuildOptions,
  pub context: &'a Context,
}

impl Fields for NameFields<'_> {
  fn field(&self, field: Field) -> Option<&str> {
    let options = self.options;
    match field {
      Field::Agda => Some(&options.agda),
      Field::Ghc => Some(&options.ghc),
      Field::Cabal => (!options.flags.enable_stack).then_some(options.cabal.as_str()),
      Field::Stack => options.flags.enable_stack.then_some(options.stack.as_str()),
      Field::Icu => options.icu.as_deref(),
      Field::Upx => options.upx.as_deref(),
      Field::Arch => Some(self.context.platform.arch.as_str()),
      Field::Platform => Some(self.context.platform.os.as_str()),
      Field::Release => Some(&self.context.release),
    }
  }
}

/// Render a distribution name.
///
/// The probe and the publish step both name distributions through this
/// function so that lookup keys and published names agree.
pub fn render_name(template: &str, options: &BuildOptions, context: &Context) -> Result<String, TemplateError> {
  let template = Template::parse(template)?;
  Ok(template.render(&NameFields { options, context }))
}

/// Name of the distribution built from `options`, using `bdist-name` or the
/// default template.
pub fn distribution_name(options: &BuildOptions, context: &Context) -> Result<String, TemplateError> {
  let template = if options.bdist_name.is_empty() {
    DEFAULT_BDIST_TEMPLATE
  } else {
    options.bdist_name.as_str()
  };
  render_name(template, options, context)
}
