//! Well-known file and directory names.

/// The human-edited package specification in a project or package root.
pub const SPEC_FILE: &str = "package.yaml";

/// The generated lock file next to the spec.
pub const LOCK_FILE: &str = "package.lock";

/// Directory inside a project root where packages are downloaded.
pub const PROJECT_PACKAGES_DIR: &str = ".packages";

/// Directory inside a registry where descriptions are stored.
pub const DESCRIPTION_DIR: &str = "packages";

/// File name of a single package description inside a registry.
pub const DESCRIPTION_FILE: &str = "desc.yaml";
