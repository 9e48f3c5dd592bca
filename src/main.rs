mod cli;
mod config;
mod dashboard;
mod error;
mod forecast;
mod orchestrator;
mod remote;
mod state_machine;
mod ui;

use std::io::Write;

use chrono::Utc;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use cli::{Cli, Command};
use config::ForecastConfig;
use error::ForecastError;
use orchestrator::{CancellationToken, JobRunner};
use remote::{JobHandle, JobRequest, JobService, PollOutcome, RemoteJobClient, decode};
use state_machine::{Job, JobReport};
use ui::JobProgress;

/// Logs go to stderr as `[HH:MM:SS] [LEVEL] message`; `RUST_LOG` still applies.
fn init_logger(verbose: bool) {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();
}

async fn run(config: &ForecastConfig, request: JobRequest) -> Result<(), ForecastError> {
    let client = RemoteJobClient::new(&config.remote)?;
    let progress = JobProgress::start(&format!("forecast for input {}", request.input_selector));
    let cancel = CancellationToken::new();
    let runner = JobRunner::new(client, &config.remote)
        .with_cancellation(cancel.clone())
        .with_observer(&progress);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, cancelling job");
            cancel.cancel();
        }
    });

    let steps = request.steps;
    let mut job = Job::new(request);
    let result = runner.run(&mut job).await;
    progress.complete(&result);
    progress.print_report(&JobReport::from_job(&job));

    let payload = result?;
    let report = dashboard::export_payload(
        config,
        &payload,
        steps,
        Utc::now(),
        &mut rand::thread_rng(),
    )?;
    ui::print_export(&report);
    Ok(())
}

async fn status(config: &ForecastConfig, job_id: &str) -> Result<(), ForecastError> {
    let client = RemoteJobClient::new(&config.remote)?;
    let handle = JobHandle {
        id: job_id.to_string(),
        status_url: client.status_url(job_id),
    };

    match client.poll(&handle).await? {
        PollOutcome::Pending => println!("{job_id}: pending"),
        PollOutcome::Completed(raw) => {
            let size = raw.bytes.len();
            let payload = decode(raw);
            println!(
                "{job_id}: completed, {size} bytes ({})",
                payload.content_type()
            );
        }
        PollOutcome::Rejected(rejection) => {
            println!(
                "{job_id}: rejected (status {}): {}",
                rejection.status, rejection.message
            );
        }
    }
    Ok(())
}

fn demo(config: &ForecastConfig, steps: u32) -> Result<(), ForecastError> {
    log::info!("running in demo mode with placeholder data");
    let report =
        dashboard::export_placeholder(config, steps, Utc::now(), &mut rand::thread_rng(), None)?;
    ui::print_export(&report);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => ForecastConfig::load_from(path)?,
        None => ForecastConfig::load()?,
    };
    cli.apply(&mut config);

    match &cli.command {
        Command::Run {
            input,
            samples,
            steps,
        } => run(&config, JobRequest::new(input.clone(), *samples, *steps)).await?,
        Command::Status { job_id } => status(&config, job_id).await?,
        Command::Demo { steps } => demo(&config, *steps)?,
    }
    Ok(())
}
