use clap::{Parser, Subcommand};
use zine_pools::allocate::{allocation_counts, run_allocation};
use zine_pools::config::{self, Config, DEFAULT_CONFIG_FILE};
use zine_pools::poster::PoolConsumer;
use zine_pools::publish::{PatreonPublisher, Publisher, SimulatedPublisher};
use zine_pools::state::now;
use zine_pools::store::StateStore;
use zine_pools::types::Platform;
use zine_pools::{logging, output};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "zine-pools")]
#[command(about = "Daily image allocation and posting pools for the architecture zine")]
#[command(long_about = "\
Daily image allocation and posting pools for the architecture zine

Each day the image generator writes a batch of images. `allocate` splits
the day's new images across four FIFO pools, one per platform, and each
`post` run takes images off the front of one pool.

Files (relative to the working directory, see `gen-config`):

  images/<style>/<style>_image_NN_YYYYMMDD_HHMMSS.jpg   generated images
  captions/<style>_captions.txt                        line N = caption for image N
  image_allocation_state.json (+ .backup)              the four pools
  allocation_summary.txt                               written by `allocate`
  posts/<platform>_posts_<stamp>.{json,txt}            written by `post`
  logs/<command>_<stamp>.log                           per-run log

Patreon credentials come from PATREON_* environment variables.
ZINE_FAST_MODE=1 disables delays between posts.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Allocate today's new images to the platform pools
    Allocate,
    /// Post the next images from one platform's pool
    Post {
        platform: Platform,
        /// Number of images to take (default from config)
        #[arg(long)]
        count: Option<usize>,
    },
    /// Show pool sizes and the daily allocation plan
    Status,
    /// Print a stock zine.toml with all options documented
    GenConfig,
}

impl Command {
    fn log_name(&self) -> String {
        match self {
            Command::Allocate => "allocate".to_string(),
            Command::Post { platform, .. } => format!("post_{}", platform.key()),
            Command::Status => "status".to_string(),
            Command::GenConfig => "gen-config".to_string(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Status => {
            let config = load(&cli)?;
            init_logging(&cli, &config, false)?;
            let state = StateStore::new(&config.paths.state_file).load();
            let plan = allocation_counts(config.allocation.daily_images, &config.allocation.ratios);
            output::print_status(&state, plan);
        }
        Command::Allocate => {
            let config = load(&cli)?;
            init_logging(&cli, &config, true)?;
            let today = now().date();
            let report = run_allocation(&config, today, &mut rand::rng()).inspect_err(|e| {
                error!(error = %e, "image allocation failed");
            })?;
            output::print_allocation_report(&report);
        }
        Command::Post { platform, count } => {
            let config = load(&cli)?;
            init_logging(&cli, &config, true)?;
            let mut consumer = PoolConsumer::new(*platform, &config);
            if let Some(n) = count {
                consumer = consumer.with_count(*n);
            }
            let mut publisher = build_publisher(*platform, &config)?;
            let store = StateStore::new(&config.paths.state_file);
            let report = consumer.run(&store, publisher.as_mut(), &mut rand::rng(), now());
            output::print_consumption_report(&report);
        }
    }
    Ok(())
}

/// Defaults, then the TOML file, then environment overrides.
fn load(cli: &Cli) -> Result<Config, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Stderr logging for every command; `with_file` also allows the per-run log file.
fn init_logging(cli: &Cli, config: &Config, with_file: bool) -> Result<(), logging::LoggingError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let mut settings = config.logging.clone();
    settings.file &= with_file;
    let log_file = logging::init(
        &settings,
        &config.paths.log_dir,
        &cli.command.log_name(),
        cli.verbose,
        rust_log.as_deref(),
        now(),
    )?;
    if let Some(path) = log_file {
        info!(file = %path.display(), "logging to file");
    }
    Ok(())
}

/// Real Patreon client when enabled, a simulator everywhere else.
fn build_publisher(
    platform: Platform,
    config: &Config,
) -> Result<Box<dyn Publisher>, Box<dyn std::error::Error>> {
    if platform == Platform::Patreon && config.patreon.enabled {
        return Ok(Box::new(PatreonPublisher::new(&config.patreon)?));
    }
    info!(platform = platform.key(), "using simulated publisher");
    Ok(Box::new(SimulatedPublisher::new(platform)))
}
