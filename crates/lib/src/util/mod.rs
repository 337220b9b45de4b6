//! Shared utilities.
//!
//! File hashing, directory copying and test helpers.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
