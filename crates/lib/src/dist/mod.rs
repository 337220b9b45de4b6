//! The binary distribution pipeline.
//!
//! ```text
//! probe -> download ─────────────────────────────────────────────┐
//!   └──> prepare -> build -> package -> bundle? -> compress? -> verify -> publish?
//! ```
//!
//! Download, ICU setup, UPX detection, bundling, compression and inspection
//! are optional: their failures are logged and the pipeline falls back.
//! Configuration errors, build errors and failed verification abort the run.

pub mod fetch;
pub mod package;
pub mod pipeline;
pub mod publish;
pub mod tools;
pub mod verify;

pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use pipeline::{Outcome, Pipeline, PipelineError, Probe, Source, WorkDirs};
pub use publish::{ArtifactStore, LocalStore, StoreError, UploadOptions, UploadResult};
pub use tools::{IcuInstall, PlatformTools, Toolbox};
