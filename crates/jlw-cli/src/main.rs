use anyhow::Result;
use clap::{Parser, Subcommand};
use jlw_etl::{maybe_build_scheduler, run_due_from_env, EtlConfig, PgWarehouse};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jlw")]
#[command(about = "Job Listings Warehouse command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one ETL batch over every due search configuration, then exit.
    Run,
    /// Start the cron scheduler and keep running until Ctrl-C.
    Schedule,
    /// Serve the read-only dashboard.
    Serve,
    /// Apply the warehouse schema.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let summary = run_due_from_env().await?;
            println!(
                "etl batch complete: run_id={} due={} succeeded={} failed={} ids={} details={}",
                summary.run_id,
                summary.configs_due,
                summary.configs_succeeded,
                summary.configs_failed,
                summary.ids_discovered,
                summary.details_fetched
            );
        }
        Commands::Schedule => {
            let config = EtlConfig::from_env();
            match maybe_build_scheduler(&config).await? {
                Some(mut sched) => {
                    sched.start().await?;
                    info!(
                        cron_1 = %config.etl_cron_1,
                        cron_2 = %config.etl_cron_2,
                        "scheduler started, waiting for Ctrl-C"
                    );
                    tokio::signal::ctrl_c().await?;
                    sched.shutdown().await?;
                }
                None => {
                    eprintln!("scheduler is disabled; set JLW_SCHEDULER_ENABLED=true to enable");
                }
            }
        }
        Commands::Serve => {
            jlw_web::serve_from_env().await?;
        }
        Commands::Migrate => {
            let config = EtlConfig::from_env();
            let warehouse = PgWarehouse::connect(&config.database_url)?;
            warehouse.migrate().await?;
            println!("warehouse schema applied");
        }
    }

    Ok(())
}
