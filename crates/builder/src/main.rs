//! # luwak-builder
//!
//! Build, pack and ship `luwakctl`.
//!
//! ## Usage
//!
//! ```bash
//! luwak-builder                    # linux x64, packed, deployed
//! luwak-builder 0                  # same, with seconds-of-day forced to 0
//! luwak-builder 0 win32 --gui      # windows x86, no console window
//! luwak-builder --dry-run          # print what would run
//! ```
//!
//! ## Versioning
//!
//! `<git tag>.<YYMMDD>.<seconds since midnight>`, e.g. `1.4.0.240115.30600`.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod compile;
mod defaults;
mod invocation;
mod metadata;
mod pipeline;
mod process;
mod target;
mod version;

use pipeline::{Orchestrator, ReleasePlan, RunReport, Tools};
use process::{DryRun, ProcessRunner, SystemRunner};
use target::Platform;
use version::VersionString;

#[derive(Parser)]
#[command(name = "luwak-builder", about = "Release builder for luwakctl", version)]
struct Cli {
    /// Seconds-of-day component of the version, used as typed (default: now).
    #[arg(value_parser = version::parse_seconds)]
    seconds: Option<String>,

    /// Platform selector, matched by substring: linux, win32, windows.
    #[arg(default_value = defaults::PLATFORM)]
    platform: String,

    /// Output binary name.
    #[arg(long, default_value = defaults::OUTPUT_NAME, value_parser = target::parse_output_name)]
    name: String,

    /// Suppress the console window (Windows targets only).
    #[arg(long)]
    gui: bool,

    /// Skip packing the binary with upx.
    #[arg(long)]
    no_compress: bool,

    /// Remote destination for Linux artifacts.
    #[arg(long, value_name = "HOST:PATH", default_value = defaults::DEPLOY_DESTINATION)]
    deploy_to: String,

    /// Do not copy the artifact to the remote host.
    #[arg(long)]
    no_deploy: bool,

    /// Program entry source file.
    #[arg(long, default_value = defaults::ENTRY)]
    entry: String,

    /// Go toolchain to invoke.
    #[arg(long, default_value = defaults::GO)]
    go: String,

    /// Executable packer to invoke.
    #[arg(long, default_value = defaults::UPX)]
    upx: String,

    /// Remote copy program to invoke.
    #[arg(long, default_value = defaults::SCP)]
    scp: String,

    /// Run git and every tool from this directory; output paths are relative to it.
    #[arg(short = 'C', long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Print the commands instead of running them.
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if cli.verbose { "debug" } else { "info" })
        }))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let platform = Platform::from_selector(&cli.platform)?;
    let version = version::resolve(cli.seconds.as_deref(), cli.directory.as_deref());
    tracing::info!(%version, platform = platform.label(), "starting release build");

    let plan = ReleasePlan {
        target: platform.target(&cli.name).gui(cli.gui),
        compress: !cli.no_compress,
        deploy_to: (!cli.no_deploy).then(|| cli.deploy_to.clone()),
    };
    let tools = Tools {
        go: cli.go.clone(),
        upx: cli.upx.clone(),
        scp: cli.scp.clone(),
        entry: cli.entry.clone(),
    };

    println!("=== Building {} {version} ===\n", platform.label());

    let report = if cli.dry_run {
        release(DryRun::default(), tools, &cli, &plan, &version)?
    } else {
        release(SystemRunner, tools, &cli, &plan, &version)?
    };

    println!("\n=== Build complete ===");
    for warning in report.warnings() {
        println!("  Warning: {warning}");
    }
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn release<R: ProcessRunner>(
    runner: R,
    tools: Tools,
    cli: &Cli,
    plan: &ReleasePlan,
    version: &VersionString,
) -> Result<RunReport> {
    Orchestrator::new(runner, tools)
        .in_dir(cli.directory.as_deref())
        .release(plan, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["luwak-builder"]).unwrap();
        assert_eq!(cli.seconds, None);
        assert_eq!(cli.platform, "linux");
        assert_eq!(cli.name, "luwakctl");
        assert!(!cli.no_compress);
        assert!(!cli.no_deploy);
        assert_eq!(cli.deploy_to, defaults::DEPLOY_DESTINATION);
    }

    #[test]
    fn test_positionals() {
        let cli = Cli::try_parse_from(["luwak-builder", "42", "win32", "--gui"]).unwrap();
        assert_eq!(cli.seconds.as_deref(), Some("42"));
        assert_eq!(cli.platform, "win32");
        assert!(cli.gui);
    }

    #[test]
    fn test_rejects_non_numeric_seconds() {
        assert!(Cli::try_parse_from(["luwak-builder", "soon"]).is_err());
        assert!(Cli::try_parse_from(["luwak-builder", "+5"]).is_err());
    }

    #[test]
    fn test_seconds_keep_leading_zeros() {
        let cli = Cli::try_parse_from(["luwak-builder", "007"]).unwrap();
        assert_eq!(cli.seconds.as_deref(), Some("007"));
    }

    #[test]
    fn test_rejects_path_as_name() {
        assert!(Cli::try_parse_from(["luwak-builder", "--name", "../x"]).is_err());
    }
}
