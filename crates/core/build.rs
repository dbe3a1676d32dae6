//! Bakes the generation identifier into the crate at build time.
//!
//! Uses `OFFCACHE_BUILD_VERSION` when the deploy pipeline provides one, then
//! the short git commit SHA, then a UTC timestamp.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=OFFCACHE_BUILD_VERSION");
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    let version = std::env::var("OFFCACHE_BUILD_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_short_sha)
        .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d%H%M%S").to_string());

    println!("cargo:rustc-env=OFFCACHE_BUILD_VERSION={version}");
}

fn git_short_sha() -> Option<String> {
    let output = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8(output.stdout).ok()?;
    let sha = sha.trim();
    if sha.is_empty() { None } else { Some(sha.to_string()) }
}
