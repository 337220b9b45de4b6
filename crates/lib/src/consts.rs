use std::time::Duration;

/// Application name used for data and cache directories.
pub const APP_NAME: &str = "agdist";

/// Package name of the compiler being distributed.
pub const PACKAGE_NAME: &str = "agda";

/// Hackage package name, used as the prefix of `PackageInfoCache` keys.
pub const HACKAGE_PACKAGE_NAME: &str = "Agda";

/// Distribution name template used when `bdist-name` is left empty.
///
/// Also the template rendered by the probe, so it must produce the same
/// string as `PackageIndex::key`.
pub const DEFAULT_BDIST_TEMPLATE: &str = "agda-{{{agda}}}-{{{arch}}}-{{{platform}}}";

/// Target version tag that cannot be built reproducibly.
pub const NIGHTLY: &str = "nightly";

/// Requested version meaning "newest known version".
pub const LATEST: &str = "latest";

/// Requested toolchain version meaning "newest compatible version in range".
pub const RECOMMENDED: &str = "recommended";

/// Executables produced by a build, without platform suffix.
pub const EXECUTABLES: &[&str] = &["agda", "agda-mode"];

/// Directory name of the static data shipped with a distribution.
pub const DATA_DIR_NAME: &str = "data";

/// Environment variable pointing Agda at its data directory.
pub const DATA_DIR_ENV: &str = "Agda_datadir";

/// Age after which the package info cache is reported as stale.
pub const PACKAGE_INFO_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);
