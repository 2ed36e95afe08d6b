//! Build, pack and deploy, in that order.
//!
//! Each external step is classified where it is called:
//! - build: any failure is fatal and stops the run
//! - pack, deploy: failures are recorded and the run continues

use crate::compile::GoBuild;
use crate::defaults;
use crate::invocation::Invocation;
use crate::metadata::BuildMetadata;
use crate::process::{Finished, ProcessRunner};
use crate::target::BuildTarget;
use crate::version::VersionString;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where the orchestrator is in a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ProbingToolchain,
    ResolvingPath,
    Building,
    Failed,
    Built,
    Packing,
    Deploying,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Build,
    Pack,
    Deploy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    NonFatal(String),
    Fatal(String),
}

impl StepOutcome {
    /// Classify a finished (or unstartable) process.
    fn classify(what: &str, result: io::Result<Finished>, fatal: bool) -> Self {
        let detail = match result {
            Ok(finished) if finished.success() => return Self::Success,
            Ok(finished) => format!("{what} failed ({})", finished.describe()),
            Err(e) => format!("failed to run {what}: {e}"),
        };
        if fatal {
            Self::Fatal(detail)
        } else {
            Self::NonFatal(detail)
        }
    }
}

/// External programs and inputs for a run.
#[derive(Clone, Debug)]
pub struct Tools {
    pub go: String,
    pub upx: String,
    pub scp: String,
    pub entry: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            go: defaults::GO.to_string(),
            upx: defaults::UPX.to_string(),
            scp: defaults::SCP.to_string(),
            entry: defaults::ENTRY.to_string(),
        }
    }
}

/// Everything the driver needs to know for one run.
#[derive(Clone, Debug)]
pub struct ReleasePlan {
    pub target: BuildTarget,
    pub compress: bool,
    /// `host:path` to copy Linux artifacts to, `None` to skip deployment.
    pub deploy_to: Option<String>,
}

/// What happened during a run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub version: VersionString,
    pub target: BuildTarget,
    pub artifact: PathBuf,
    pub steps: Vec<(Step, StepOutcome)>,
}

impl RunReport {
    #[cfg(test)]
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, o)| o)
    }

    /// Details of every recorded non-fatal failure.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|(_, o)| match o {
            StepOutcome::NonFatal(detail) => Some(detail.as_str()),
            StepOutcome::Success | StepOutcome::Fatal(_) => None,
        })
    }
}

pub struct Orchestrator<R: ProcessRunner> {
    runner: R,
    tools: Tools,
    work_dir: Option<PathBuf>,
    stage: Stage,
}

impl<R: ProcessRunner> Orchestrator<R> {
    pub fn new(runner: R, tools: Tools) -> Self {
        Self {
            runner,
            tools,
            work_dir: None,
            stage: Stage::Idle,
        }
    }

    /// Run every tool from `dir`; output paths are resolved against it.
    #[must_use]
    pub fn in_dir(mut self, dir: Option<&Path>) -> Self {
        self.work_dir = dir.map(Path::to_path_buf);
        self
    }

    #[cfg(test)]
    fn stage(&self) -> Stage {
        self.stage
    }

    #[cfg(test)]
    fn runner(&self) -> &R {
        &self.runner
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "stage");
        self.stage = stage;
    }

    /// Build one target and optionally pack it.
    ///
    /// Returns an error, without packing, if the compiler cannot be run or
    /// exits non-zero.
    pub fn build(
        &mut self,
        target: &BuildTarget,
        compress: bool,
        version: &VersionString,
    ) -> Result<RunReport> {
        self.enter(Stage::ProbingToolchain);
        let metadata = BuildMetadata::gather(
            &mut self.runner,
            &self.tools.go,
            self.work_dir.as_deref(),
            version,
        );
        debug!(?metadata, "toolchain metadata");

        self.enter(Stage::ResolvingPath);
        // Tools run inside the work dir and get the output path relative to
        // it; the report carries the same file as seen from here.
        let output = target.output_path();
        let artifact = match &self.work_dir {
            Some(dir) => dir.join(&output),
            None => output.clone(),
        };
        info!(dir = ?target.output_dir(), path = %artifact.display(), "output resolved");

        self.enter(Stage::Building);
        let outcome = self.compile(target, &metadata, &output);
        if let StepOutcome::Fatal(detail) = &outcome {
            self.enter(Stage::Failed);
            error!("{detail}");
            return Err(anyhow!(
                "Build failed for {}/{}: {detail}",
                target.goos,
                target.goarch
            ));
        }
        self.enter(Stage::Built);
        println!("  Built: {}", artifact.display());

        let mut report = RunReport {
            version: version.clone(),
            target: target.clone(),
            artifact,
            steps: vec![(Step::Build, outcome)],
        };

        if compress {
            self.enter(Stage::Packing);
            let outcome = self.pack(&output);
            report.steps.push((Step::Pack, outcome));
        }

        Ok(report)
    }

    fn compile(
        &mut self,
        target: &BuildTarget,
        metadata: &BuildMetadata,
        output: &Path,
    ) -> StepOutcome {
        let invocation = match GoBuild::new(target, metadata)
            .compiler(&self.tools.go)
            .entry(&self.tools.entry)
            .output(output)
            .work_dir(self.work_dir.as_deref())
            .build()
        {
            Ok(invocation) => invocation,
            Err(e) => return StepOutcome::Fatal(format!("refusing to build: {e}")),
        };

        let result = self.runner.run(&invocation);
        StepOutcome::classify(&self.tools.go, result, true)
    }

    fn pack(&mut self, output: &Path) -> StepOutcome {
        println!("  Packing {}...", output.display());
        let invocation = Invocation::new(&self.tools.upx)
            .arg(output)
            .current_dir(self.work_dir.as_deref());
        let outcome = StepOutcome::classify(&self.tools.upx, self.runner.run(&invocation), false);
        if let StepOutcome::NonFatal(detail) = &outcome {
            warn!("{detail}; keeping the unpacked binary");
        }
        outcome
    }

    /// Copy `output` (relative to the work dir) to `destination`
    /// (`host:path`). Never fatal.
    pub fn deploy(&mut self, output: &Path, destination: &str) -> StepOutcome {
        self.enter(Stage::Deploying);
        println!("  Deploying to {destination}...");
        let invocation = Invocation::new(&self.tools.scp)
            .arg("-r")
            .arg(output)
            .arg(destination)
            .current_dir(self.work_dir.as_deref());
        let outcome = StepOutcome::classify(&self.tools.scp, self.runner.run(&invocation), false);
        if let StepOutcome::NonFatal(detail) = &outcome {
            warn!("{detail}; the local artifact is unaffected");
        }
        outcome
    }

    /// Full run: build, optional pack, and deployment of Linux artifacts.
    pub fn release(&mut self, plan: &ReleasePlan, version: &VersionString) -> Result<RunReport> {
        let mut report = self.build(&plan.target, plan.compress, version)?;

        match &plan.deploy_to {
            Some(destination) if plan.target.is_linux() => {
                let outcome = self.deploy(&plan.target.output_path(), destination);
                report.steps.push((Step::Deploy, outcome));
            }
            Some(_) => debug!(goos = %plan.target.goos, "only linux artifacts are deployed"),
            None => debug!("deployment disabled"),
        }

        self.enter(Stage::Done);
        Ok(report)
    }
}
