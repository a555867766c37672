use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing_subscriber::EnvFilter;

use gsai_core::GsaiConfig;
use gsai_repomap::cache::CacheManager;
use gsai_repomap::{MapRequest, RepoMapper};

const CONFIG_FILE: &str = ".gsai.toml";

#[derive(Parser)]
#[command(
    name = "gsai",
    version,
    about = "Ranked, token-budgeted repository maps for LLM prompts",
    long_about = "Builds a compact map of a repository's most relevant files and signatures,\n\
                   ranked by how the code references itself and cut to a token budget.\n\
                   Maps are cached on disk and reused until the repository changes.\n\n\
                   Examples:\n  \
                     gsai map                               Map the current directory\n  \
                     gsai map --focus src/lib.rs            Rank around a file\n  \
                     gsai map --max-tokens 2048 --ident Foo Bigger map, boost an identifier\n  \
                     gsai cache info                        Show cache location and size\n  \
                     gsai init                              Write a default .gsai.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .gsai.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a ranked map of the repository
    #[command(long_about = "Generate a ranked map of the repository.\n\n\
        Uses tree-sitter to find definitions and references, ranks files with\n\
        personalized PageRank, and keeps the best signatures that fit the budget.\n\n\
        Examples:\n  gsai map --path .\n  gsai map --max-tokens 2048 --focus src/main.rs")]
    Map {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Token budget, at least 1 (default: repomap.map_tokens from config, else 1024)
        #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        max_tokens: Option<usize>,

        /// Focus files (boost ranking around these files)
        #[arg(long)]
        focus: Vec<PathBuf>,

        /// Identifiers mentioned in the request (boost their definitions)
        #[arg(long)]
        ident: Vec<String>,

        /// Skip the on-disk cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Inspect or clear the repo map cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Create a default .gsai.toml in the current directory
    Init,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache directory, entry count and size
    Info,
    /// Delete all cached maps
    Clear,
}

const DEFAULT_CONFIG: &str = r#"# gsai configuration

[repomap]
# map_tokens = 1024
# max_symbols_per_file = 8
# max_files = 10000
# max_line_chars = 100
# damping = 0.85
# max_iterations = 100
# focus_weight = 100.0
# focus_referencer_weight = 50.0
# important_files = ["README.md", "Cargo.toml", "package.json"]

[cache]
# enabled = true
# strategy = "auto"   # auto | git | simple | full
# ttl_days = 30
# max_size_mb = 1024
# dir = "/path/to/cache"
"#;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<GsaiConfig> {
    match path {
        Some(path) => GsaiConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("loading {}", path.display())),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                GsaiConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err(format!("loading {CONFIG_FILE}"))
            } else {
                Ok(GsaiConfig::default())
            }
        }
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        None => {
            Cli::command().print_help().into_diagnostic()?;
        }
        Some(Command::Map {
            ref path,
            max_tokens,
            ref focus,
            ref ident,
            no_cache,
        }) => {
            if no_cache {
                config.cache.enabled = false;
            }
            let cache = if config.cache.enabled {
                CacheManager::from_config(&config.cache)
            } else {
                CacheManager::disabled()
            };

            let mut request = MapRequest::new(path)
                .with_focus(focus.iter().cloned())
                .with_idents(ident.iter().cloned());
            request.token_budget = max_tokens;

            tracing::debug!(
                path = %path.display(),
                cache = cache.is_enabled(),
                strategy = %config.cache.strategy,
                "generating repo map"
            );
            let mapper = RepoMapper::new(config.repomap, cache);
            let output = mapper.generate_map(&request).into_diagnostic()?;
            print!("{output}");
        }
        Some(Command::Cache { action }) => {
            let cache = CacheManager::from_config(&config.cache);
            match action {
                CacheAction::Info => {
                    let stats = cache.stats().into_diagnostic()?;
                    println!("Directory: {}", stats.dir.display());
                    println!("Entries:   {}", stats.entries);
                    println!("Size:      {} bytes", stats.total_bytes);
                    println!("Strategy:  {}", config.cache.strategy);
                    println!("Enabled:   {}", config.cache.enabled);
                }
                CacheAction::Clear => {
                    let removed = cache.clear().into_diagnostic()?;
                    println!("Removed {removed} cached map(s) from {}", cache.dir().display());
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
    }

    Ok(())
}
