//! Build targets and where their artifacts land.

use crate::defaults;
use anyhow::{bail, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output directory class. Every (OS, arch) pair maps to exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDir {
    WindowsX86,
    WindowsOther,
    OtherOs,
}

impl OutputDir {
    pub fn for_target(goos: &str, goarch: &str) -> Self {
        match (goos, goarch) {
            ("windows", "386") => Self::WindowsX86,
            ("windows", _) => Self::WindowsOther,
            _ => Self::OtherOs,
        }
    }

    pub fn path(self) -> &'static Path {
        Path::new(match self {
            Self::WindowsX86 => defaults::DIST_WINDOWS_X86,
            Self::WindowsOther => defaults::DIST_WINDOWS,
            Self::OtherOs => defaults::DIST_LINUX,
        })
    }
}

/// One binary to build: Go's `GOOS`/`GOARCH`, the file name, and whether the
/// console window is suppressed on Windows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    pub goos: String,
    pub goarch: String,
    pub output_name: String,
    pub gui: bool,
}

impl BuildTarget {
    pub fn new(goos: &str, goarch: &str, output_name: &str) -> Self {
        Self {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
            output_name: output_name.to_string(),
            gui: false,
        }
    }

    #[must_use]
    pub fn gui(mut self, gui: bool) -> Self {
        self.gui = gui;
        self
    }

    pub fn is_windows(&self) -> bool {
        self.goos == "windows"
    }

    pub fn is_linux(&self) -> bool {
        self.goos == "linux"
    }

    pub fn output_dir(&self) -> OutputDir {
        OutputDir::for_target(&self.goos, &self.goarch)
    }

    /// `<output dir>/<output name>`, relative to the builder's working directory.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir().path().join(&self.output_name)
    }
}

/// Platforms the command line can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    LinuxAmd64,
    Windows386,
    WindowsAmd64,
}

impl Platform {
    /// Keywords checked, in order, as substrings of the selector.
    const KEYWORDS: &'static [(&'static str, Platform)] = &[
        ("linux", Platform::LinuxAmd64),
        ("win32", Platform::Windows386),
        ("windows", Platform::WindowsAmd64),
    ];

    pub fn from_selector(selector: &str) -> Result<Self> {
        let selector = selector.to_ascii_lowercase();
        if let Some((_, platform)) = Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| selector.contains(keyword))
        {
            return Ok(*platform);
        }
        let known: Vec<_> = Self::KEYWORDS.iter().map(|(k, _)| *k).collect();
        bail!(
            "Unknown platform selector '{selector}' (expected one containing: {})",
            known.join(", ")
        );
    }

    pub fn goos(self) -> &'static str {
        match self {
            Self::LinuxAmd64 => "linux",
            Self::Windows386 | Self::WindowsAmd64 => "windows",
        }
    }

    pub fn goarch(self) -> &'static str {
        match self {
            Self::Windows386 => "386",
            Self::LinuxAmd64 | Self::WindowsAmd64 => "amd64",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LinuxAmd64 => "linux x64",
            Self::Windows386 => "windows x86",
            Self::WindowsAmd64 => "windows x64",
        }
    }

    pub fn target(self, output_name: &str) -> BuildTarget {
        BuildTarget::new(self.goos(), self.goarch(), output_name)
    }
}

/// clap value parser for `--name`: a bare file name.
pub fn parse_output_name(name: &str) -> Result<String, String> {
    if name.is_empty() || name == "." || name == ".." {
        return Err("output name must be a file name".to_string());
    }
    if name.contains(['/', '\\']) {
        return Err("output name must not contain path separators".to_string());
    }
    Ok(name.to_string())
}
