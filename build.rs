//! Embeds a human-readable version string for `--version` output.
//!
//! Uses `git describe --tags --always --dirty` when a git checkout is
//! available, and falls back to a build-timestamp pseudo-version otherwise.

use std::process::Command;

use chrono::Utc;

fn main() {
    ["src", "build.rs", "Cargo.toml"]
        .iter()
        .for_each(|path| println!("cargo:rerun-if-changed={path}"));

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

/// Executes a git command and returns the trimmed stdout as a String.
fn git_command(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn build_info() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let described = git_command(&["describe", "--tags", "--always", "--dirty"])
        .unwrap_or_else(|| format!("unreleased-{}", Utc::now().format("%Y%m%d%H%M%S")));
    format!("{version} ({described})")
}
