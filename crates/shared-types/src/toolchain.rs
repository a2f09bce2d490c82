//! # Toolchain Versions
//!
//! A toolchain is identified by a version string of the form
//! `<target>-<compiler>-<major>.<minor>[.<patch>]`, for example
//! `x86_64-linux-gnu-gcc-4.6.3`. The target may itself contain dashes.
//!
//! ## Compatibility
//!
//! | Requested vs available                          | Result                    |
//! |-------------------------------------------------|---------------------------|
//! | identical strings                               | compatible                |
//! | same target, compiler, major and minor          | compatible (patch ignored)|
//! | same target, compiler, major; newer local minor | compatible + `-Wno-error` |
//! | anything else                                   | incompatible              |
//!
//! Newer minor releases mostly add warnings, which break builds that run
//! with `-Werror`. The shim parameter keeps those builds working.

use crate::errors::ToolchainParseError;
use std::fmt;
use std::str::FromStr;

/// Extra compiler parameter appended when a newer minor release executes a
/// job built for an older one.
pub const NEWER_MINOR_SHIM: &str = "-Wno-error";

/// Parsed form of a toolchain version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolchainVersion {
    /// Target triple, e.g. `x86_64-linux-gnu`.
    pub target: String,
    /// Compiler family, e.g. `gcc`.
    pub compiler: String,
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

impl FromStr for ToolchainVersion {
    type Err = ToolchainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let missing = || ToolchainParseError::MissingComponent(s.to_string());
        let (rest, number) = s.rsplit_once('-').ok_or_else(missing)?;
        let (target, compiler) = rest.rsplit_once('-').ok_or_else(missing)?;
        if target.is_empty() || compiler.is_empty() {
            return Err(missing());
        }

        let bad = || ToolchainParseError::BadVersionNumber(s.to_string());
        let mut parts = number.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let patch = match parts.next() {
            Some(p) => Some(p.parse().map_err(|_| bad())?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(bad());
        }

        Ok(Self {
            target: target.to_string(),
            compiler: compiler.to_string(),
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}.{}", self.target, self.compiler, self.major, self.minor)?;
        if let Some(patch) = self.patch {
            write!(f, ".{}", patch)?;
        }
        Ok(())
    }
}

/// Outcome of a successful compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compatibility {
    /// Parameters to append to the compiler invocation.
    pub extra_params: Vec<String>,
}

/// Decide whether a job built for `requested` may run on `available`.
pub fn check_compatibility(requested: &str, available: &str) -> Option<Compatibility> {
    if requested == available {
        return Some(Compatibility::default());
    }
    let requested: ToolchainVersion = requested.parse().ok()?;
    let available: ToolchainVersion = available.parse().ok()?;
    if requested.target != available.target
        || requested.compiler != available.compiler
        || requested.major != available.major
    {
        return None;
    }
    match available.minor.cmp(&requested.minor) {
        std::cmp::Ordering::Equal => Some(Compatibility::default()),
        std::cmp::Ordering::Greater => Some(Compatibility {
            extra_params: vec![NEWER_MINOR_SHIM.to_string()],
        }),
        std::cmp::Ordering::Less => None,
    }
}

/// Shorthand for `check_compatibility(..).is_some()`.
pub fn is_compatible(requested: &str, available: &str) -> bool {
    check_compatibility(requested, available).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_dashed_target() {
        let v: ToolchainVersion = "x86_64-linux-gnu-gcc-4.6.3".parse().unwrap();
        assert_eq!(v.target, "x86_64-linux-gnu");
        assert_eq!(v.compiler, "gcc");
        assert_eq!((v.major, v.minor, v.patch), (4, 6, Some(3)));
        assert_eq!(v.to_string(), "x86_64-linux-gnu-gcc-4.6.3");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "gcc".parse::<ToolchainVersion>(),
            Err(ToolchainParseError::MissingComponent(_))
        ));
        assert!(matches!(
            "x86_64-gcc-four".parse::<ToolchainVersion>(),
            Err(ToolchainParseError::BadVersionNumber(_))
        ));
        assert!(matches!(
            "x86_64-gcc-4.6.1.2".parse::<ToolchainVersion>(),
            Err(ToolchainParseError::BadVersionNumber(_))
        ));
    }

    #[test]
    fn test_exact_match_is_compatible() {
        assert_eq!(
            check_compatibility("x86_64-gcc-4.6", "x86_64-gcc-4.6"),
            Some(Compatibility::default())
        );
        // Unparsable but identical strings still match.
        assert!(is_compatible("custom", "custom"));
    }

    #[test]
    fn test_patch_level_is_ignored() {
        assert_eq!(
            check_compatibility("x86_64-gcc-4.6.1", "x86_64-gcc-4.6.3"),
            Some(Compatibility::default())
        );
        assert!(is_compatible("x86_64-gcc-4.6", "x86_64-gcc-4.6.2"));
    }

    #[test]
    fn test_newer_minor_gets_shim() {
        let compat = check_compatibility("x86_64-gcc-4.5", "x86_64-gcc-4.6").unwrap();
        assert_eq!(compat.extra_params, vec![NEWER_MINOR_SHIM.to_string()]);
    }

    #[test]
    fn test_incompatible_versions() {
        assert!(!is_compatible("x86_64-gcc-4.6", "x86_64-gcc-4.5"));
        assert!(!is_compatible("x86_64-gcc-4.6", "x86_64-gcc-5.6"));
        assert!(!is_compatible("x86_64-gcc-4.6", "i686-gcc-4.6"));
        assert!(!is_compatible("x86_64-gcc-4.6", "x86_64-clang-4.6"));
        assert!(!is_compatible("custom", "x86_64-gcc-4.6"));
    }
}
