// Version metadata for `fuelaudit --version`.

use std::env;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Short hash of HEAD, marked `-dirty` when tracked files have local edits.
fn git_commit() -> Option<String> {
    let hash = git(&["rev-parse", "--short=7", "HEAD"])?;
    match git(&["status", "--porcelain", "--untracked-files=no"]) {
        Some(_) => Some(format!("{hash}-dirty")),
        None => Some(hash),
    }
}

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/heads");
    println!("cargo:rerun-if-env-changed=FUELAUDIT_COMMIT");

    // Source tarballs carry no .git; packagers pass the commit in instead.
    let commit = env::var("FUELAUDIT_COMMIT")
        .ok()
        .filter(|c| !c.trim().is_empty())
        .or_else(git_commit)
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=GIT_COMMIT_HASH={commit}");

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=TARGET={target}");
}
