//! agdist-lib: Core types and logic for agdist
//!
//! This crate decides which optional build features are safe for a given
//! combination of Agda version, GHC toolchain and operating system, names the
//! resulting binary distribution, and runs the packaging pipeline:
//! - `options`: merge raw inputs with declared defaults into `BuildOptions`
//! - `compat`: per-feature compatibility rules over the resolved options
//! - `template`: render distribution names from mustache-style templates
//! - `dist`: probe, download, build, package, verify and publish

pub mod build;
pub mod compat;
pub mod consts;
pub mod context;
pub mod dist;
pub mod exec;
pub mod index;
pub mod options;
pub mod platform;
pub mod template;
pub mod util;
pub mod version;
