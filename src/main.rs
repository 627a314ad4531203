use clap::{Parser, Subcommand};
use galaxy_post::catalog::Catalog;
use galaxy_post::config::{self, BotConfig};
use galaxy_post::endpoint::BlueskyClient;
use galaxy_post::fetch::HttpImageSource;
use galaxy_post::output;
use galaxy_post::pipeline::{self, Pipeline, RunSettings};
use galaxy_post::publish::{CancelToken, ThreadSleeper};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Where the catalog comes from for commands that never post.
#[derive(clap::Args, Clone)]
struct CatalogArgs {
    /// Catalog CSV (defaults to $GALAXY_CATALOG)
    #[arg(long)]
    catalog: Option<PathBuf>,
}

impl CatalogArgs {
    fn resolve(&self) -> Result<PathBuf, config::ConfigError> {
        match &self.catalog {
            Some(path) => Ok(path.clone()),
            None => config::catalog_path_from_env(),
        }
    }
}

#[derive(Parser)]
#[command(name = "galaxy-post")]
#[command(about = "Post a random galaxy with a generated caption to Bluesky")]
#[command(long_about = "\
Post a random galaxy with a generated caption to Bluesky

Each run samples one row from the catalog, renders a caption from its
redshift, coordinates, classification, survey and project, downloads the
image and posts both. Network failures are retried; rejected posts are not.

Required environment:
  BSKY_USERNAME    Bluesky handle or email
  BSKY_PASSWORD    Bluesky app password
  GALAXY_CATALOG   Path to the catalog CSV

Run 'galaxy-post gen-config' to generate a documented galaxy-post.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "galaxy-post.toml", global = true)]
    config: PathBuf,

    /// Seed for row selection and caption decoration
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Select a galaxy and post it
    Post,
    /// Print the caption a run would post, without touching the network
    Preview {
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Print record and caption as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate every catalog row
    Check(CatalogArgs),
    /// Print a stock galaxy-post.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    match cli.command {
        Command::Post => {
            let environment = config::Environment::from_process_env()?;
            let bot_config = config::load_config(&cli.config)?;
            let catalog = Catalog::load(&environment.catalog_path)?;

            let images = HttpImageSource::new(&bot_config.fetch);
            let endpoint = BlueskyClient::new(&bot_config.endpoint, environment.credentials);
            let settings = RunSettings::from_config(&bot_config);
            let cancel = cancel_token(&bot_config);

            let pipeline = Pipeline {
                source: &catalog,
                images: &images,
                endpoint: &endpoint,
                settings: &settings,
            };
            let report = pipeline.run(&mut rng, &ThreadSleeper, &cancel)?;
            output::print_run_report(&report);
            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Preview { catalog, json } => {
            let bot_config = config::load_config(&cli.config)?;
            let catalog = load_catalog(&catalog.resolve()?)?;
            let settings = RunSettings::from_config(&bot_config);
            let draft = pipeline::draft(&catalog, &settings.caption, &mut rng)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&draft)?);
            } else {
                output::print_draft(&draft);
            }
        }
        Command::Check(catalog) => {
            let bot_config = config::load_config(&cli.config)?;
            let catalog = load_catalog(&catalog.resolve()?)?;
            let settings = RunSettings::from_config(&bot_config);
            let summary = pipeline::check_catalog(&catalog, &settings.caption);
            output::print_check_summary(&summary);
            if !summary.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_catalog(path: &Path) -> Result<Catalog, Box<dyn Error>> {
    Ok(Catalog::load(path)?)
}

/// Cancel token carrying `publish.deadline_secs`, counted from now.
fn cancel_token(config: &BotConfig) -> CancelToken {
    let token = CancelToken::new();
    match config.publish.deadline_secs {
        Some(secs) => token.with_deadline(Instant::now() + Duration::from_secs(secs)),
        None => token,
    }
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "galaxy_post=debug"
    } else {
        "galaxy_post=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Fails only if a global subscriber is already set; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
