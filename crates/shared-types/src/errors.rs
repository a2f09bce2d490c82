//! # Error Types
//!
//! Errors for the shared value types.

use thiserror::Error;

/// A toolchain version string did not follow
/// `<target>-<compiler>-<major>.<minor>[.<patch>]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolchainParseError {
    /// Fewer than three dash-separated components.
    #[error("toolchain version '{0}' is missing target, compiler or version")]
    MissingComponent(String),

    /// The trailing version component is not `major.minor[.patch]`.
    #[error("toolchain version '{0}' has a malformed version number")]
    BadVersionNumber(String),
}
