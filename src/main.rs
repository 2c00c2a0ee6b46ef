use clap::{Parser, Subcommand};
use doc_lastmod::config::{self, LastModifiedConfig};
use doc_lastmod::manifest::{MANIFEST_FILENAME, Manifest};
use doc_lastmod::output;
use doc_lastmod::pipeline::LastModifiedStage;
use doc_lastmod::stage::StageRegistry;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("DOC_LASTMOD_RELEASE");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("DOC_LASTMOD_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

/// Location of the build to post-process.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Documentation output folder (the generator's `_site`)
    output: PathBuf,

    /// Build manifest [default: <OUTPUT>/manifest.json]
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Config file [default: ./lastmod.toml if present, else stock settings]
    #[arg(long)]
    config: Option<PathBuf>,
}

impl BuildArgs {
    fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.output.join(MANIFEST_FILENAME))
    }

    fn load_config(&self) -> Result<LastModifiedConfig, config::ConfigError> {
        match &self.config {
            Some(path) => config::load_config_file(path),
            None => config::load_config(Path::new(".")),
        }
    }
}

#[derive(Parser)]
#[command(name = "doc-lastmod")]
#[command(about = "Stamp generated documentation pages with their last-modified date")]
#[command(long_about = "\
Stamp generated documentation pages with their last-modified date

Runs after the documentation generator. For every conceptual page listed in
the build manifest, the newest git commit touching the page's source file
is looked up and a notice is appended to the page's content region:

  This page was last modified at 2021-03-01 10:00:00 (UTC).

The commit message is shown in a collapsible panel below it. Sources with no
git history fall back to their file modification time (without a panel).

Run 'doc-lastmod gen-config' to generate a documented lastmod.toml.")]
#[command(version = version_string())]
struct Cli {
    /// More log output (-v debug, -vv trace). DOC_LASTMOD_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append last-modified notices to the pages of a finished build
    Annotate(BuildArgs),
    /// Show what `annotate` would do without modifying any page
    Check(BuildArgs),
    /// Print a stock lastmod.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Command::Annotate(args) => {
            let config = args.load_config()?;
            init_thread_pool(&config.processing);
            let manifest = Manifest::load(&args.manifest_path())?;

            let mut registry = StageRegistry::new();
            registry.register(LastModifiedStage::new(config));

            for (_, summary) in registry.run(&manifest, &args.output)? {
                output::print_run_summary(&summary);
            }
        }
        Command::Check(args) => {
            let config = args.load_config()?;
            let manifest = Manifest::load(&args.manifest_path())?;
            println!("==> Checking {}", args.output.display());
            let report = LastModifiedStage::new(config).check(&manifest, &args.output)?;
            output::print_check_report(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays a clean report.
fn init_tracing(quiet: bool, verbose: u8) -> Result<(), Box<dyn std::error::Error>> {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("DOC_LASTMOD_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .map_err(|e| format!("failed to initialize logging: {e}"))?;
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
