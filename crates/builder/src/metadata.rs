//! Build metadata embedded into the binary at link time.

use crate::defaults;
use crate::invocation::Invocation;
use crate::process::ProcessRunner;
use crate::version::VersionString;
use chrono::{DateTime, Local};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// A metadata value that cannot be placed inside a linker flag.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("{field} is empty")]
    Empty { field: &'static str },
    #[error("{field} contains unsafe character {ch:?}: {value}")]
    UnsafeCharacter {
        field: &'static str,
        ch: char,
        value: String,
    },
}

/// Reject values that would break out of a quoted `-X` assignment.
///
/// Spaces are only acceptable where the value is quoted in the flag string.
pub fn check_value(
    field: &'static str,
    value: &str,
    allow_spaces: bool,
) -> Result<(), MetadataError> {
    if value.is_empty() {
        return Err(MetadataError::Empty { field });
    }
    let unsafe_char = value.chars().find(|&c| {
        matches!(c, '\'' | '"' | '\\' | '`')
            || c.is_control()
            || (!allow_spaces && c.is_whitespace())
    });
    match unsafe_char {
        Some(ch) => Err(MetadataError::UnsafeCharacter {
            field,
            ch,
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}

/// The four values injected as `main.*` string constants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildMetadata {
    pub version: VersionString,
    pub go_version: String,
    pub build_date: String,
    pub platform: String,
}

impl BuildMetadata {
    /// Query the toolchain and host once and capture the build time.
    ///
    /// Host tools run from `work_dir` like the build itself, so a
    /// directory-local toolchain answers for its own version.
    pub fn gather(
        runner: &mut dyn ProcessRunner,
        go: &str,
        work_dir: Option<&Path>,
        version: &VersionString,
    ) -> Self {
        Self {
            version: version.clone(),
            go_version: go_version(runner, go, work_dir),
            build_date: build_timestamp(&Local::now()),
            platform: platform_descriptor(runner, work_dir),
        }
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        check_value("version", self.version.as_str(), false)?;
        check_value("go version", &self.go_version, true)?;
        check_value("build date", &self.build_date, true)?;
        check_value("platform", &self.platform, true)
    }
}

/// `go version go1.21.5 linux/amd64` -> `go1.21.5 linux/amd64`.
pub fn normalize_go_version(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix("go version ").unwrap_or(raw).to_string()
}

fn go_version(runner: &mut dyn ProcessRunner, go: &str, work_dir: Option<&Path>) -> String {
    let invocation = Invocation::new(go).arg("version").current_dir(work_dir);
    match runner.capture(&invocation) {
        Ok(finished) if finished.success() => {
            let version = normalize_go_version(&finished.stdout);
            if !version.is_empty() {
                return version;
            }
        }
        Ok(finished) => warn!(status = %finished.describe(), "{go} version failed"),
        Err(e) => warn!(error = %e, "could not run {go} version"),
    }
    "unknown".to_string()
}

/// `ctime`-style timestamp, e.g. `Mon Jan 15 08:30:00 2024`.
pub fn build_timestamp(now: &DateTime<Local>) -> String {
    now.format("%a %b %e %H:%M:%S %Y").to_string()
}

/// `<platform>(<hostname>)`, e.g. `Linux-6.1.0-x86_64(buildbox)`.
pub fn platform_descriptor(runner: &mut dyn ProcessRunner, work_dir: Option<&Path>) -> String {
    format!("{}({})", host_platform(runner, work_dir), host_name())
}

fn host_platform(runner: &mut dyn ProcessRunner, work_dir: Option<&Path>) -> String {
    let uname = Invocation::new(defaults::UNAME)
        .arg("-srm")
        .current_dir(work_dir);
    if let Ok(finished) = runner.capture(&uname) {
        let joined = finished.stdout.split_whitespace().collect::<Vec<_>>().join("-");
        if finished.success() && !joined.is_empty() {
            return joined;
        }
    }
    debug!("uname unavailable, describing host from compile-time constants");
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Finished;
    use chrono::TimeZone;
    use std::io;

    /// Answers `go version` and `uname`, remembering what it was asked.
    #[derive(Default)]
    struct Canned {
        captured: Vec<Invocation>,
    }

    impl ProcessRunner for Canned {
        fn run(&mut self, _: &Invocation) -> io::Result<Finished> {
            Ok(Finished::exited(0))
        }

        fn capture(&mut self, invocation: &Invocation) -> io::Result<Finished> {
            self.captured.push(invocation.clone());
            match invocation.get_program().to_str() {
                Some("go") => Ok(Finished::with_stdout("go version go1.21.5 linux/amd64\n")),
                Some("uname") => Ok(Finished::with_stdout("Linux 6.1.0 x86_64\n")),
                _ => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        }
    }

    fn version() -> VersionString {
        VersionString::new("1.4.0.240115.30600").unwrap()
    }

    #[test]
    fn test_normalize_go_version() {
        assert_eq!(
            normalize_go_version("go version go1.21.5 linux/amd64\n"),
            "go1.21.5 linux/amd64"
        );
        assert_eq!(normalize_go_version("devel +abc"), "devel +abc");
    }

    #[test]
    fn test_build_timestamp_is_ctime_style() {
        let t = Local.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        assert_eq!(build_timestamp(&t), "Mon Jan 15 08:30:00 2024");

        let t = Local.with_ymd_and_hms(2024, 1, 5, 8, 30, 0).unwrap();
        assert_eq!(build_timestamp(&t), "Fri Jan  5 08:30:00 2024");
    }

    #[test]
    fn test_gather_uses_toolchain_and_host() {
        let meta = BuildMetadata::gather(&mut Canned::default(), "go", None, &version());

        assert_eq!(meta.go_version, "go1.21.5 linux/amd64");
        assert!(meta.platform.starts_with("Linux-6.1.0-x86_64("));
        assert!(meta.platform.ends_with(')'));
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_gather_runs_host_tools_in_work_dir() {
        let mut runner = Canned::default();
        BuildMetadata::gather(&mut runner, "go", Some(Path::new("a/b")), &version());

        let programs: Vec<_> = runner.captured.iter().map(Invocation::get_program).collect();
        assert_eq!(programs, ["go", "uname"]);
        assert!(runner.captured[1].has_arg("-srm"));
        for invocation in &runner.captured {
            assert_eq!(invocation.get_current_dir(), Some(Path::new("a/b")));
        }
    }

    #[test]
    fn test_gather_survives_missing_compiler() {
        let meta = BuildMetadata::gather(&mut Canned::default(), "go-missing", None, &version());
        assert_eq!(meta.go_version, "unknown");
    }

    #[test]
    fn test_check_value_rejects_quotes_and_control() {
        assert!(check_value("platform", "Linux(box)", true).is_ok());
        assert_eq!(
            check_value("platform", "it's", true),
            Err(MetadataError::UnsafeCharacter {
                field: "platform",
                ch: '\'',
                value: "it's".to_string(),
            })
        );
        assert!(check_value("build date", "a\nb", true).is_err());
        assert!(check_value("build date", "a\"b", true).is_err());
        assert_eq!(
            check_value("go version", "", true),
            Err(MetadataError::Empty { field: "go version" })
        );
    }

    #[test]
    fn test_check_value_spaces_only_when_allowed() {
        assert!(check_value("build date", "Mon Jan 15", true).is_ok());
        assert!(check_value("version", "1.0 0", false).is_err());
    }

    #[test]
    fn test_validate_flags_unsafe_platform() {
        let mut meta = BuildMetadata::gather(&mut Canned::default(), "go", None, &version());
        meta.platform = "host'; rm -rf /".to_string();
        assert!(matches!(
            meta.validate(),
            Err(MetadataError::UnsafeCharacter { field: "platform", .. })
        ));
    }
}
