use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Set by packagers building from a source tarball without git metadata.
const VERSION_OVERRIDE: &str = "MODPM_BUILD_VERSION";

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed={}", VERSION_OVERRIDE);

    let version = std::env::var(VERSION_OVERRIDE)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_version)
        .unwrap_or_else(|| format!("0.0.0-unknown-{}", timestamp()));

    println!("cargo:rustc-env=MODPM_VERSION={}", version);
}

/// `git describe` without the tag's `v` prefix; dirty trees get a build
/// timestamp appended.
fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    let version = described.strip_prefix('v').unwrap_or(described);

    match version {
        "" => None,
        v if v.ends_with("-dirty") => Some(format!("{}-{}", v, timestamp())),
        v => Some(v.to_string()),
    }
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
