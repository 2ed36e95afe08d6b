//! Release version derivation.
//!
//! A version is `<base>.<YYMMDD>.<seconds>`: the nearest git tag without its
//! prefix, the local date, and either a caller-supplied number or the seconds
//! elapsed since local midnight. It is computed once per run.

use crate::defaults;
use crate::invocation::Invocation;
use crate::metadata::{check_value, MetadataError};
use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

/// A version token safe to place unquoted inside a linker flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VersionString(String);

impl VersionString {
    #[cfg(test)]
    pub fn new(value: &str) -> Result<Self, MetadataError> {
        let value = value.trim();
        check_value("version", value, false)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the base version comes from.
pub trait TagSource {
    /// Nearest reachable tag, or `None` when there is none or the lookup failed.
    fn describe(&self) -> Option<String>;
}

/// `git describe --tags` in `dir`, or the current directory.
#[derive(Debug, Default)]
pub struct GitDescribe {
    pub dir: Option<PathBuf>,
}

impl GitDescribe {
    fn invocation(&self) -> Invocation {
        Invocation::new(defaults::GIT)
            .args(["describe", "--tags"])
            .current_dir(self.dir.as_deref())
    }
}

impl TagSource for GitDescribe {
    fn describe(&self) -> Option<String> {
        let output = match self
            .invocation()
            .to_command()
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "git describe could not run");
                return None;
            }
        };
        if !output.status.success() {
            debug!(status = %output.status, "git describe found no tag");
            return None;
        }
        let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!tag.is_empty()).then_some(tag)
    }
}

/// Strip the non-numeric prefix from a tag (`v2.3.1` -> `2.3.1`).
///
/// Returns `None` if nothing usable is left.
pub fn base_from_tag(tag: &str) -> Option<&str> {
    let base = tag.trim().trim_start_matches(|c: char| !c.is_ascii_digit());
    if base.is_empty() || check_value("version", base, false).is_err() {
        return None;
    }
    Some(base)
}

/// Accept a seconds override made only of ASCII digits, kept as typed
/// (`007` stays `007`).
pub fn parse_seconds(value: &str) -> Result<String, String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err("seconds must be a non-negative whole number".to_string());
    }
    Ok(value.to_string())
}

/// Resolve the version for this run from the tags of `dir` and the local
/// clock.
pub fn resolve(explicit_seconds: Option<&str>, dir: Option<&Path>) -> VersionString {
    let tags = GitDescribe {
        dir: dir.map(Path::to_path_buf),
    };
    resolve_with(&tags, explicit_seconds, Local::now().naive_local())
}

/// Resolve the version from an explicit tag source and timestamp.
///
/// Never fails: a missing or unusable tag falls back to
/// [`defaults::FALLBACK_BASE_VERSION`].
pub fn resolve_with(
    tags: &dyn TagSource,
    explicit_seconds: Option<&str>,
    now: NaiveDateTime,
) -> VersionString {
    let tag = tags.describe();
    let base = tag.as_deref().and_then(base_from_tag).unwrap_or_else(|| {
        debug!(?tag, "using fallback base version");
        defaults::FALLBACK_BASE_VERSION
    });

    let seconds = match explicit_seconds {
        Some(seconds) => seconds.to_string(),
        None => now.num_seconds_from_midnight().to_string(),
    };

    VersionString(format!("{base}.{}.{seconds}", now.format("%y%m%d")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Fixed(Option<&'static str>);

    impl TagSource for Fixed {
        fn describe(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_tag_and_clock() {
        let v = resolve_with(&Fixed(Some("v1.4.0")), None, at(2024, 1, 15, 8, 30, 0));
        assert_eq!(v.as_str(), "1.4.0.240115.30600");
    }

    #[test]
    fn test_explicit_seconds_used_verbatim() {
        let v = resolve_with(&Fixed(Some("v2.3.1")), Some("42"), at(2024, 1, 15, 23, 59, 59));
        assert_eq!(v.as_str(), "2.3.1.240115.42");
    }

    #[test]
    fn test_explicit_seconds_keep_leading_zeros() {
        let v = resolve_with(&Fixed(Some("v2.3.1")), Some("007"), at(2024, 1, 15, 8, 30, 0));
        assert_eq!(v.as_str(), "2.3.1.240115.007");
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("007"), Ok("007".to_string()));
        assert_eq!(parse_seconds("0"), Ok("0".to_string()));
        assert!(parse_seconds("").is_err());
        assert!(parse_seconds("+5").is_err());
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("4 2").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn test_git_describe_runs_in_dir() {
        let tags = GitDescribe {
            dir: Some(PathBuf::from("a/b")),
        };
        let invocation = tags.invocation();
        assert_eq!(invocation.get_program(), "git");
        assert!(invocation.has_arg("describe") && invocation.has_arg("--tags"));
        assert_eq!(invocation.get_current_dir(), Some(Path::new("a/b")));

        assert_eq!(GitDescribe::default().invocation().get_current_dir(), None);
    }

    #[test]
    fn test_missing_tag_falls_back() {
        let v = resolve_with(&Fixed(None), Some("0"), at(2025, 12, 3, 10, 0, 0));
        assert_eq!(v.as_str(), "1.0.0.251203.0");
    }

    #[test]
    fn test_empty_tag_falls_back() {
        let v = resolve_with(&Fixed(Some("   ")), Some("7"), at(2024, 1, 15, 0, 0, 0));
        assert_eq!(v.as_str(), "1.0.0.240115.7");
    }

    #[test]
    fn test_midnight_is_zero() {
        let v = resolve_with(&Fixed(Some("3.0.0")), None, at(2024, 2, 29, 0, 0, 0));
        assert_eq!(v.as_str(), "3.0.0.240229.0");
    }

    #[test]
    fn test_base_from_tag() {
        assert_eq!(base_from_tag("v2.3.1"), Some("2.3.1"));
        assert_eq!(base_from_tag("2.3.1"), Some("2.3.1"));
        assert_eq!(base_from_tag("release-1.2\n"), Some("1.2"));
        assert_eq!(base_from_tag("v1.4.0-3-gdeadbee"), Some("1.4.0-3-gdeadbee"));
        assert_eq!(base_from_tag("latest"), None);
        assert_eq!(base_from_tag("v1 2"), None);
    }

    #[test]
    fn test_unusable_tag_falls_back() {
        let v = resolve_with(&Fixed(Some("nightly")), Some("5"), at(2024, 1, 15, 0, 0, 0));
        assert_eq!(v.as_str(), "1.0.0.240115.5");
    }

    #[test]
    fn test_version_string_rejects_whitespace_and_quotes() {
        assert!(VersionString::new(" 1.0.0.240115.0\n").is_ok());
        assert!(VersionString::new("1.0 .0").is_err());
        assert!(VersionString::new("1.0'0").is_err());
        assert!(VersionString::new("").is_err());
    }
}
