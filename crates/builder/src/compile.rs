//! `go build` invocation builder.
//!
//! Builder pattern mirroring the QEMU command builder: set what differs,
//! then [`GoBuild::build`] validates the metadata and produces the
//! [`Invocation`].

use crate::defaults;
use crate::invocation::Invocation;
use crate::metadata::{BuildMetadata, MetadataError};
use crate::target::BuildTarget;
use std::path::{Path, PathBuf};

/// Cross-compilation of the program for one target.
#[derive(Clone, Debug)]
pub struct GoBuild<'a> {
    target: &'a BuildTarget,
    metadata: &'a BuildMetadata,
    compiler: String,
    tags: String,
    entry: String,
    output: PathBuf,
    work_dir: Option<PathBuf>,
}

impl<'a> GoBuild<'a> {
    pub fn new(target: &'a BuildTarget, metadata: &'a BuildMetadata) -> Self {
        Self {
            target,
            metadata,
            compiler: defaults::GO.to_string(),
            tags: defaults::BUILD_TAGS.to_string(),
            entry: defaults::ENTRY.to_string(),
            output: target.output_path(),
            work_dir: None,
        }
    }

    #[must_use]
    pub fn compiler(mut self, program: &str) -> Self {
        self.compiler = program.to_string();
        self
    }

    #[must_use]
    pub fn entry(mut self, entry: &str) -> Self {
        self.entry = entry.to_string();
        self
    }

    /// Write the binary here instead of the target's default output path.
    /// Relative paths are taken from the work dir.
    #[must_use]
    pub fn output(mut self, path: &Path) -> Self {
        self.output = path.to_path_buf();
        self
    }

    #[must_use]
    pub fn work_dir(mut self, dir: Option<&Path>) -> Self {
        self.work_dir = dir.map(Path::to_path_buf);
        self
    }

    /// Whether the console window is suppressed. Only meaningful on Windows.
    pub fn suppresses_console(&self) -> bool {
        self.target.gui && self.target.is_windows()
    }

    /// The `-ldflags` value: strip symbols, optionally hide the console, and
    /// inject the metadata as `main.*` strings.
    pub fn ldflags(&self) -> String {
        let m = self.metadata;
        let mut flags = vec!["-s".to_string(), "-w".to_string()];
        if self.suppresses_console() {
            flags.push("-H windowsgui".to_string());
        }
        flags.push(format!("-X main.version={}", m.version));
        flags.push(format!("-X 'main.buildDate={}'", m.build_date));
        flags.push(format!("-X 'main.goVersion={}'", m.go_version));
        flags.push(format!("-X 'main.platform={}'", m.platform));
        flags.join(" ")
    }

    pub fn build(self) -> Result<Invocation, MetadataError> {
        self.metadata.validate()?;

        Ok(Invocation::new(&self.compiler)
            .env("GOOS", &self.target.goos)
            .env("GOARCH", &self.target.goarch)
            .args([
                "build".to_string(),
                format!("-tags={}", self.tags),
                format!("-ldflags={}", self.ldflags()),
            ])
            .arg("-o")
            .arg(&self.output)
            .arg(&self.entry)
            .current_dir(self.work_dir.as_deref()))
    }
}
