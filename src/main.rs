use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pampero::catalog::FileCatalog;
use pampero::clock::SystemClock;
use pampero::config::Config;
use pampero::scheduler::{RegenerationLoop, SchedulerService, WeeklyGenerator};
use pampero::storage::ScheduleStore;

#[derive(Parser)]
#[command(
    name = "pampero",
    version,
    about = "Broadcast-television programming grid and scheduling engine",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler daemon with the regeneration loop
    Run,

    /// Generate a schedule immediately
    Generate {
        /// Which schedule to generate
        #[arg(value_enum)]
        target: GenerateTarget,
    },

    /// Rebuild one channel's weekly assignments and current day
    Rebuild {
        /// Channel id to rebuild
        channel: String,
    },

    /// Show generation bookkeeping and rebuild state
    Status,

    /// Look up what a channel is airing
    WhatsOn {
        /// Channel id to query
        channel: String,

        /// RFC 3339 timestamp (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GenerateTarget {
    Weekly,
    Daily,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = Config::load(cli.config.as_deref())?;
    let service = build_service(&config)?;

    match cli.command {
        Commands::Run => {
            tracing::info!("Starting scheduler daemon");
            run(config, service).await?;
        }

        Commands::Generate { target } => match target {
            GenerateTarget::Weekly => {
                let schedule = service.generate_weekly().await?;
                println!(
                    "Weekly schedule generated for week starting {} ({} channels)",
                    schedule.week_start,
                    schedule.channels.len()
                );
            }
            GenerateTarget::Daily => {
                let schedule = service.generate_daily().await?;
                println!(
                    "Daily schedule generated for {} ({} channels)",
                    schedule.schedule_date,
                    schedule.channels.len()
                );
            }
        },

        Commands::Rebuild { channel } => {
            tracing::info!(channel = %channel, "Manual rebuild requested");
            service.rebuild_channel(&channel).await?;
            println!("Channel '{channel}' rebuilt");
        }

        Commands::Status => {
            let status = service.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::WhatsOn { channel, at } => {
            service.bootstrap().await?;
            let at = match at {
                Some(raw) => chrono::DateTime::parse_from_rfc3339(&raw)?
                    .with_timezone(&chrono::Utc),
                None => chrono::Utc::now(),
            };
            let program = service.get_current_program(&channel, at).await?;
            println!(
                "{} @ {}s{}",
                program.content_id,
                program.offset_sec,
                if program.is_commercial {
                    " (commercial)"
                } else {
                    ""
                }
            );
        }
    }

    Ok(())
}

fn build_service(config: &Config) -> Result<Arc<SchedulerService>> {
    let tz = config.tz()?;
    let store = ScheduleStore::new(&config.paths.data_dir)?;
    let catalog = Arc::new(FileCatalog::new(&config.paths.content_dir));
    let clock = Arc::new(SystemClock::new(tz));

    let service = SchedulerService::new(store, catalog, clock)
        .with_weekly_generator(WeeklyGenerator::new(
            config.scheduling.stretch_min,
            config.scheduling.stretch_max,
        ))
        .with_block_layout(config.scheduling.breaks)
        .with_run_weights(config.scheduling.back_to_back_weights.clone());

    Ok(Arc::new(service))
}

async fn run(config: Config, service: Arc<SchedulerService>) -> Result<()> {
    service.bootstrap().await?;

    let regen = Arc::new(RegenerationLoop::new(config.trigger.clone(), service)?);
    let runner = {
        let regen = regen.clone();
        tokio::spawn(async move { regen.start().await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    regen.stop().await;
    runner.await??;

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("pampero=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("pampero=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
