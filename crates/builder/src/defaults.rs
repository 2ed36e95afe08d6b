//! Fixed values used when the command line does not say otherwise.
//!
//! The output directories are relative to the directory the builder runs in
//! and are not configurable per run.

/// Base version used when no tag is reachable from HEAD.
pub const FALLBACK_BASE_VERSION: &str = "1.0.0";

/// Output directory for 32-bit Windows builds.
pub const DIST_WINDOWS_X86: &str = "../dist_x86";
/// Output directory for every other Windows build.
pub const DIST_WINDOWS: &str = "../dist_win";
/// Output directory for non-Windows builds.
pub const DIST_LINUX: &str = "../../luwak/dist_linux";

pub const OUTPUT_NAME: &str = "luwakctl";
pub const ENTRY: &str = "main.go";
pub const PLATFORM: &str = "linux";

/// Build tag that switches the program to its faster JSON code path.
pub const BUILD_TAGS: &str = "jsoniter";

/// Where Linux artifacts are shipped after a successful build.
pub const DEPLOY_DESTINATION: &str = "wlstl:/home/shares/archiving/v5release/luwak_linux";

pub const GIT: &str = "git";
pub const GO: &str = "go";
pub const UPX: &str = "upx";
pub const SCP: &str = "scp";
pub const UNAME: &str = "uname";
