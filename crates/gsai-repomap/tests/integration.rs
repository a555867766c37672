//! Integration tests: walk → parse → rank → render → cache on temp repos.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use gsai_core::{CacheStrategy, GsaiError, RepoMapConfig};
use gsai_repomap::cache::CacheManager;
use gsai_repomap::focus::FocusSet;
use gsai_repomap::graph::{IdentWeights, RepoGraph};
use gsai_repomap::parser::{
    extract_tags, ParseOutcome, ParserRegistry, Tag, TagKind, TagParser,
};
use gsai_repomap::rank::{rank, RankConfig, RankScores};
use gsai_repomap::walker::{walk_repo, Language};
use gsai_repomap::{MapRequest, RepoMapper};

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

/// a.py defines foo, b.py calls foo and defines bar, c.py calls bar.
fn abc_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "def foo():\n    pass\n");
    write(dir.path(), "b.py", "def bar():\n    return foo()\n");
    write(dir.path(), "c.py", "bar()\n");
    dir
}

fn mixed_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "src/config.rs",
        "pub struct Settings {\n    pub port: u16,\n}\n\npub fn load_settings() -> Settings {\n    Settings { port: 80 }\n}\n",
    );
    write(
        dir.path(),
        "src/main.rs",
        "fn main() {\n    let s = load_settings();\n    serve(s);\n}\n",
    );
    write(
        dir.path(),
        "src/server.rs",
        "pub fn serve(settings: Settings) {\n    listen(settings.port);\n}\n\nfn listen(port: u16) {}\n",
    );
    write(
        dir.path(),
        "web/client.ts",
        "export function fetchStatus(url: string): Promise<string> {\n  return fetch(url).then(r => r.text());\n}\n",
    );
    write(
        dir.path(),
        "web/app.ts",
        "const status = fetchStatus('/health');\n",
    );
    write(
        dir.path(),
        "tools/report.py",
        "class Report:\n    def render(self):\n        return load_settings()\n",
    );
    dir
}

fn uncached(config: RepoMapConfig) -> RepoMapper {
    RepoMapper::new(config, CacheManager::disabled())
}

fn scores_for(root: &Path, focus: &BTreeSet<String>) -> RankScores {
    let files = walk_repo(root).unwrap();
    let tags = extract_tags(&ParserRegistry::with_defaults(), &files);
    let graph = RepoGraph::build(&tags, &IdentWeights::default());
    rank(&graph, focus, &RankConfig::default())
}

fn signature_lines(map: &str) -> usize {
    map.lines()
        .filter(|l| l.starts_with('\u{2502}') || l.starts_with(' '))
        .count()
}

#[test]
fn abc_scenario_ranks_and_renders() {
    let repo = abc_repo();

    let scores = scores_for(repo.path(), &BTreeSet::new());
    assert!((scores.file("a.py") - 0.4744).abs() < 1e-3);
    assert!((scores.file("b.py") - 0.3412).abs() < 1e-3);
    assert!((scores.file("c.py") - 0.1844).abs() < 1e-3);
    let order: Vec<&str> = scores.ranked_files().iter().map(|(p, _)| *p).collect();
    assert_eq!(order, vec!["a.py", "b.py", "c.py"]);

    let map = uncached(RepoMapConfig::default())
        .generate_map(&MapRequest::new(repo.path()).with_budget(4096))
        .unwrap();
    let expected = "\
├── a.py
│   └── def foo()
├── b.py
│   └── def bar()
└── c.py
";
    assert_eq!(map, expected);
}

#[test]
fn one_token_budget_names_only_the_top_file() {
    let repo = abc_repo();
    let map = uncached(RepoMapConfig::default())
        .generate_map(&MapRequest::new(repo.path()).with_budget(1))
        .unwrap();

    assert_eq!(map, "└── a.py\n");
    assert_eq!(signature_lines(&map), 0);
}

#[test]
fn zero_budget_is_a_config_error() {
    let repo = abc_repo();
    let err = uncached(RepoMapConfig::default())
        .generate_map(&MapRequest::new(repo.path()).with_budget(0))
        .unwrap_err();
    assert!(matches!(err, GsaiError::Config(_)), "{err}");
}

#[test]
fn project_files_are_listed_with_the_ranked_source() {
    let repo = abc_repo();
    write(repo.path(), "pyproject.toml", "[project]\nname = \"abc\"\n");
    write(repo.path(), "docs/README.md", "# not at the root\n");

    let map = uncached(RepoMapConfig::default())
        .generate_map(&MapRequest::new(repo.path()).with_budget(4096))
        .unwrap();
    let expected = "\
├── a.py
│   └── def foo()
├── b.py
│   └── def bar()
├── c.py
└── pyproject.toml
";
    assert_eq!(map, expected);
}

#[test]
fn output_is_deterministic() {
    let repo = mixed_repo();
    let mapper = uncached(RepoMapConfig::default());
    let request = MapRequest::new(repo.path()).with_budget(2048);

    let first = mapper.generate_map(&request).unwrap();
    let second = mapper.generate_map(&request).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);

    // A fresh mapper (fresh parser pool) agrees too.
    let third = uncached(RepoMapConfig::default())
        .generate_map(&request)
        .unwrap();
    assert_eq!(first, third);
}

#[test]
fn mixed_languages_show_up() {
    let repo = mixed_repo();
    let map = uncached(RepoMapConfig::default())
        .generate_map(&MapRequest::new(repo.path()).with_budget(4096))
        .unwrap();

    assert!(map.contains("src/config.rs"), "{map}");
    assert!(map.contains("pub fn load_settings() -> Settings"), "{map}");
    assert!(map.contains("function fetchStatus(url: string)"), "{map}");
    assert!(map.contains("class Report"), "{map}");
}

#[test]
fn budget_is_monotonic() {
    let repo = mixed_repo();
    let mapper = uncached(RepoMapConfig::default());

    let mut previous = (0, 0);
    for budget in (1..200).step_by(7) {
        let map = mapper
            .generate_map(&MapRequest::new(repo.path()).with_budget(budget))
            .unwrap();
        let files = map.lines().count() - signature_lines(&map);
        let now = (files, signature_lines(&map));
        assert!(
            now.0 >= previous.0 && now.1 >= previous.1,
            "budget {budget}: {now:?} < {previous:?}"
        );
        previous = now;
    }
    assert!(previous.1 > 0);
}

#[test]
fn focus_file_gains_rank() {
    let repo = abc_repo();
    let base = scores_for(repo.path(), &BTreeSet::new());
    let focus: BTreeSet<String> = ["c.py".to_string()].into();
    let focused = scores_for(repo.path(), &focus);

    assert!(focused.file("c.py") > base.file("c.py"));
}

#[test]
fn focus_changes_what_a_tight_budget_shows() {
    let repo = abc_repo();
    let mapper = uncached(RepoMapConfig::default());

    let plain = mapper
        .generate_map(&MapRequest::new(repo.path()).with_budget(1))
        .unwrap();
    let focused = mapper
        .generate_map(
            &MapRequest::new(repo.path())
                .with_focus([repo.path().join("c.py")])
                .with_budget(1),
        )
        .unwrap();

    assert_eq!(plain, "└── a.py\n");
    assert_eq!(focused, "└── c.py\n");
}

#[test]
fn mentioned_identifiers_pull_their_definers_up() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "x.py", "def alpha():\n    pass\n");
    write(dir.path(), "y.py", "def beta():\n    pass\n");
    write(dir.path(), "z.py", "alpha()\nbeta()\n");

    let mapper = uncached(RepoMapConfig::default());
    let plain = mapper
        .generate_map(&MapRequest::new(dir.path()).with_budget(1))
        .unwrap();
    let mentioned = mapper
        .generate_map(
            &MapRequest::new(dir.path())
                .with_idents(["beta"])
                .with_budget(1),
        )
        .unwrap();

    assert_eq!(plain, "└── x.py\n");
    assert_eq!(mentioned, "└── y.py\n");
}

#[test]
fn unparseable_files_degrade_gracefully() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.py", "def fine():\n    pass\n");
    write(dir.path(), "bad.py", "def broken(:\n    ???\n");

    let map = uncached(RepoMapConfig::default())
        .generate_map(&MapRequest::new(dir.path()).with_budget(1024))
        .unwrap();
    assert!(map.contains("good.py"));
    assert!(map.contains("def fine()"));
    assert!(!map.contains("broken"));
}

#[test]
fn empty_repository_gives_empty_map() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "# nothing to parse\n");

    let map = uncached(RepoMapConfig::default())
        .generate_map(&MapRequest::new(dir.path()))
        .unwrap();
    assert_eq!(map, "");
}

#[test]
fn invalid_root_is_the_only_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = uncached(RepoMapConfig::default())
        .generate_map(&MapRequest::new(dir.path().join("missing")))
        .unwrap_err();
    assert!(matches!(err, GsaiError::InvalidWorkingDirectory(_)));
}

#[test]
fn cache_round_trip_builds_once() {
    let repo = mixed_repo();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = CacheManager::new(cache_dir.path(), 3600, 1 << 20, CacheStrategy::Simple);
    let mapper = RepoMapper::new(RepoMapConfig::default(), cache.clone());
    let focus = FocusSet::default();
    let builds = Cell::new(0);

    let build = || {
        builds.set(builds.get() + 1);
        mapper.build_map(repo.path(), &focus, 1024)
    };
    let first = cache.get_or_build(repo.path(), &focus, 1024, build).unwrap();

    let build = || {
        builds.set(builds.get() + 1);
        mapper.build_map(repo.path(), &focus, 1024)
    };
    let second = cache.get_or_build(repo.path(), &focus, 1024, build).unwrap();

    assert_eq!(builds.get(), 1);
    assert_eq!(first, second);
    assert_eq!(
        first,
        uncached(RepoMapConfig::default())
            .generate_map(&MapRequest::new(repo.path()).with_budget(1024))
            .unwrap()
    );
    assert_eq!(cache.stats().unwrap().entries, 1);
}

#[test]
fn git_commit_invalidates_cached_map() {
    let repo_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let repo = git2::Repository::init(repo_dir.path()).unwrap();
    write(repo_dir.path(), "a.py", "def foo():\n    pass\n");
    commit_all(&repo, "initial");

    let cache = CacheManager::new(cache_dir.path(), 3600, 1 << 20, CacheStrategy::Git);
    let mapper = RepoMapper::new(RepoMapConfig::default(), cache);
    let request = MapRequest::new(repo_dir.path()).with_budget(1024);

    let before = mapper.generate_map(&request).unwrap();
    assert!(before.contains("a.py"));
    assert_eq!(mapper.cache().stats().unwrap().entries, 1);

    write(repo_dir.path(), "b.py", "def bar():\n    return foo()\n");
    commit_all(&repo, "add b");

    let after = mapper.generate_map(&request).unwrap();
    assert!(after.contains("b.py"), "{after}");
    assert_eq!(mapper.cache().stats().unwrap().entries, 2);
}

#[test]
fn custom_parser_can_be_registered() {
    struct EveryLineDefines;

    impl TagParser for EveryLineDefines {
        fn parse(&self, file_path: &str, content: &str) -> Result<ParseOutcome, GsaiError> {
            let tags = content
                .lines()
                .enumerate()
                .filter(|(_, l)| !l.trim().is_empty())
                .map(|(i, l)| Tag {
                    file_path: file_path.to_string(),
                    symbol_name: l.trim().to_string(),
                    kind: TagKind::Definition,
                    line: i as u32 + 1,
                    signature_context: Some(format!("line {}", i + 1)),
                })
                .collect();
            Ok(ParseOutcome::Parsed(tags))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "notes.py", "first\nsecond\n");

    let mut registry = ParserRegistry::with_defaults();
    registry.register(Language::Python, Box::new(EveryLineDefines));
    let map = uncached(RepoMapConfig::default())
        .with_registry(registry)
        .generate_map(&MapRequest::new(dir.path()).with_budget(1024))
        .unwrap();

    assert_eq!(map, "└── notes.py\n    ├── line 1\n    └── line 2\n");
}

fn commit_all(repo: &git2::Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}
