//! `GitCli` against a local bare repository.
//!
//! Skipped when `git` is not installed.

use std::fs;
use std::path::Path;
use std::process::Command;

use gitdm_core::{pages, Profile, MAX_PAGE_BYTES};
use gitdm_sync::{
    pipeline::{run, Flow, SyncSettings, NO_CALLBACK_MARKER},
    write_pages, AffiliationService, GitCli, RemoteSpec, Repository, ServiceError, SingleFlight,
};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Seed", "-c", "user.email=seed@example.com"])
        .args(args)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}

/// Bare remote at `<root>/remote/org/gitdm.git` with one seed commit and an
/// unmerged change published as `refs/pull/7/head`.
fn seed_remote(root: &Path) -> RemoteSpec {
    let bare = root.join("remote/org/gitdm.git");
    fs::create_dir_all(&bare).expect("mkdir bare");
    git(&bare, &["init", "--quiet", "--bare"]);

    let seed = root.join("seed");
    git(root, &["clone", "--quiet", bare.to_str().expect("utf8"), "seed"]);
    fs::write(seed.join("profiles1.yaml"), "P:\n- U: B\n- U: A\n").expect("write");
    fs::write(seed.join("README.md"), "affiliations\n").expect("write");
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "--quiet", "-m", "seed"]);
    git(&seed, &["push", "--quiet", "origin", "HEAD"]);

    git(&seed, &["checkout", "--quiet", "-b", "feature"]);
    fs::write(seed.join("profiles2.yaml"), "P:\n- U: C\n").expect("write");
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "--quiet", "-m", "add C"]);
    git(&seed, &["push", "--quiet", "origin", "HEAD:refs/pull/7/head"]);

    RemoteSpec::new(
        root.join("remote").to_string_lossy(),
        "org/gitdm.git",
        "bot",
        "token",
    )
}

#[test]
fn checkout_commit_push_roundtrip() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let root = TempDir::new().expect("root");
    let remote = seed_remote(root.path());
    let cli = GitCli::new(root.path().join("work/gitdm"), remote);

    cli.fresh_checkout().expect("checkout");
    assert_eq!(cli.last_commit_message().expect("log"), "seed");
    assert!(cli.status().expect("status").is_clean());

    let mut profiles = pages::read_profiles_at(cli.workdir()).expect("read");
    gitdm_core::canonicalize_all(&mut profiles);
    write_pages(cli.workdir(), &profiles, MAX_PAGE_BYTES).expect("write");

    let status = cli.status().expect("status");
    assert_eq!(status.changed, vec!["profiles1.yaml".to_string()]);

    cli.ensure_identity("gitdm bot", "bot@example.com").expect("identity");
    cli.stage().expect("stage");
    cli.commit(&format!("bot normalize {NO_CALLBACK_MARKER}")).expect("commit");
    cli.push().expect("push");

    cli.fresh_checkout().expect("second checkout");
    assert!(cli.last_commit_message().expect("log").contains(NO_CALLBACK_MARKER));
    let names: Vec<_> = pages::read_profiles_at(cli.workdir())
        .expect("read")
        .into_iter()
        .filter_map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["A", "B"]);

    cli.discard().expect("discard");
    assert!(!cli.workdir().exists());
}

#[test]
fn fetches_and_checks_out_unmerged_change() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let root = TempDir::new().expect("root");
    let remote = seed_remote(root.path());
    let cli = GitCli::new(root.path().join("gitdm"), remote);

    cli.fresh_checkout().expect("checkout");
    cli.fetch_ref(7).expect("fetch");
    cli.checkout_ref(7).expect("checkout ref");
    assert_eq!(pages::read_pages_at(cli.workdir()).expect("read").len(), 2);

    let err = cli.fetch_ref(8).unwrap_err();
    assert!(err.to_string().contains("pull/8/head"), "got: {err}");
}

struct NoService;

impl AffiliationService for NoService {
    fn fetch_all(&self) -> Result<Vec<Profile>, ServiceError> {
        Ok(vec![Profile::named("A"), Profile::named("B")])
    }

    fn bulk_update(&self, _: &gitdm_core::BulkUpdate) -> Result<String, ServiceError> {
        Ok(String::new())
    }
}

#[test]
fn publish_flow_against_real_git() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let root = TempDir::new().expect("root");
    let remote = seed_remote(root.path());
    let cli = GitCli::new(root.path().join("gitdm"), remote);
    let gate = SingleFlight::new();
    let settings = SyncSettings::new("gitdm bot", "bot@example.com", "bot");

    let outcome = run(&gate, Flow::PublishFromService, &cli, &NoService, &settings).expect("run");
    assert!(outcome.committed);
    assert!(!cli.workdir().exists(), "working copy must be discarded");

    let again = run(&gate, Flow::PublishFromService, &cli, &NoService, &settings).expect("again");
    assert!(!again.committed);
}
