use std::path::PathBuf;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn main() {
    println!("cargo::rerun-if-env-changed=PROJECTHUB_COMMIT");

    // Outside a checkout nothing is emitted and the binary reports "unknown".
    if let Some(git_dir) = git(&["rev-parse", "--absolute-git-dir"]) {
        let git_dir = PathBuf::from(git_dir);
        println!("cargo::rerun-if-changed={}", git_dir.join("HEAD").display());
        println!("cargo::rerun-if-changed={}", git_dir.join("refs/heads").display());
    }

    let commit = std::env::var("PROJECTHUB_COMMIT")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| git(&["rev-parse", "--short=12", "HEAD"]));

    if let Some(commit) = commit {
        println!("cargo::rustc-env=PROJECTHUB_COMMIT={}", commit.trim());
    }
}
