use std::path::Path;
use std::process::{Command, Output};

fn gsai(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gsai"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "gsai failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

/// A small repo plus a config pointing the cache at a private directory.
fn fixture() -> (tempfile::TempDir, tempfile::TempDir) {
    let repo = tempfile::tempdir().unwrap();
    std::fs::write(repo.path().join("a.py"), "def foo():\n    pass\n").unwrap();
    std::fs::write(repo.path().join("b.py"), "def bar():\n    return foo()\n").unwrap();
    std::fs::write(repo.path().join("c.py"), "bar()\n").unwrap();

    let cache = tempfile::tempdir().unwrap();
    let config = format!(
        "[cache]\nstrategy = \"simple\"\ndir = {:?}\n",
        cache.path().display().to_string()
    );
    std::fs::write(repo.path().join(".gsai.toml"), config).unwrap();
    (repo, cache)
}

#[test]
fn map_prints_ranked_tree() {
    let (repo, _cache) = fixture();
    let out = stdout(&gsai(&["map", "--no-cache"], repo.path()));

    assert_eq!(
        out,
        "├── a.py\n│   └── def foo()\n├── b.py\n│   └── def bar()\n└── c.py\n"
    );
}

#[test]
fn tiny_budget_prints_only_top_file() {
    let (repo, _cache) = fixture();
    let out = stdout(&gsai(&["map", "--no-cache", "--max-tokens", "1"], repo.path()));
    assert_eq!(out, "└── a.py\n");
}

#[test]
fn focus_flag_changes_top_file() {
    let (repo, _cache) = fixture();
    let out = stdout(&gsai(
        &["map", "--no-cache", "--max-tokens", "1", "--focus", "c.py"],
        repo.path(),
    ));
    assert_eq!(out, "└── c.py\n");
}

#[test]
fn map_populates_cache_and_clear_empties_it() {
    let (repo, cache) = fixture();

    let first = stdout(&gsai(&["map"], repo.path()));
    let second = stdout(&gsai(&["map"], repo.path()));
    assert_eq!(first, second);

    let info = stdout(&gsai(&["cache", "info"], repo.path()));
    assert!(info.contains("Entries:   1"), "{info}");
    assert!(info.contains("Strategy:  simple"), "{info}");

    let cleared = stdout(&gsai(&["cache", "clear"], repo.path()));
    assert!(cleared.contains("Removed 1"), "{cleared}");
    let remaining = std::fs::read_dir(cache.path()).unwrap().count();
    assert_eq!(remaining, 0);
}

#[test]
fn zero_budget_is_refused() {
    let (repo, _cache) = fixture();
    let output = gsai(&["map", "--no-cache", "--max-tokens", "0"], repo.path());
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn out_of_range_config_is_refused() {
    let (repo, _cache) = fixture();
    std::fs::write(repo.path().join("bad.toml"), "[repomap]\ndamping = 1.5\n").unwrap();
    let output = gsai(&["--config", "bad.toml", "map", "--no-cache"], repo.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("damping"));
}

#[test]
fn bad_path_fails() {
    let (repo, _cache) = fixture();
    let output = gsai(&["map", "--path", "does-not-exist"], repo.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid working directory"));
}

#[test]
fn verbose_logs_go_to_stderr() {
    let (repo, _cache) = fixture();
    let output = gsai(&["map", "--verbose"], repo.path());
    let out = stdout(&output);
    assert!(out.starts_with("├── a.py"));
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
}
