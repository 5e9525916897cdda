//! `codepad` -- run a source file on the remote execution service.
//!
//! Reads a source file (and optionally a stdin file), picks the language
//! from the file extension, submits the job, waits for it to finish and
//! prints the combined output. The status line goes to stderr.
//!
//! Configuration comes from the environment (see
//! [`ClientConfig::from_env`]); a `.env` file is honoured.
//!
//! | Variable   | Default                              |
//! |------------|--------------------------------------|
//! | `RUST_LOG` | `codepad_cli=info,codepad_judge=info` |

mod args;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use codepad_core::job::JobRequest;
use codepad_core::language::language_for_path;
use codepad_events::{EventBus, ExecutionEvent, ObserverSet, TracingObserver};
use codepad_judge::api::JudgeApi;
use codepad_judge::config::ClientConfig;
use codepad_judge::runner::Runner;
use codepad_judge::session::SessionContext;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::{Cli, Command, RunArgs};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codepad_cli=info,codepad_judge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "codepad failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command) -> anyhow::Result<ExitCode> {
    let config = ClientConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        ce_url = %config.endpoints.ce_url,
        extra_ce_url = %config.endpoints.extra_ce_url,
        max_attempts = config.poll.max_attempts,
        "Starting codepad",
    );

    let api = Arc::new(
        JudgeApi::new(config.endpoints.clone(), config.request_timeout)
            .context("failed to build HTTP client")?,
    );
    let session = Arc::new(SessionContext::new());

    match command {
        Command::Languages => {
            let catalog = session
                .load_catalog(api.as_ref())
                .await
                .context("failed to load the language catalog")?;
            for option in catalog {
                println!("{:>4}  {:<8}  {}", option.id, option.flavor.as_str(), option.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(run) => {
            let bus = Arc::new(EventBus::default());
            let progress = tokio::spawn(show_progress(bus.subscribe()));
            let observers = ObserverSet::new()
                .with(Arc::new(TracingObserver))
                .with(bus);

            let runner = Runner::new(api, session, Arc::new(observers), config.poll);
            let code = run_file(&runner, run).await;

            // Dropping the runner closes the bus and ends the progress task.
            drop(runner);
            progress.await.ok();
            code
        }
    }
}

async fn run_file(runner: &Runner, run: RunArgs) -> anyhow::Result<ExitCode> {
    let source = tokio::fs::read_to_string(&run.source)
        .await
        .with_context(|| format!("failed to read {}", run.source.display()))?;
    let stdin = match &run.stdin {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => String::new(),
    };

    let language = run
        .language()
        .unwrap_or_else(|| language_for_path(&run.source));
    let request = JobRequest::new(language.flavor, language.language_id, source)
        .with_stdin(stdin)
        .with_compiler_options(run.compiler_options)
        .with_command_line_arguments(run.arguments);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match runner.run_with_cancel(&request, &cancel).await {
        Ok(report) => {
            if !report.output.is_empty() {
                println!("{}", report.output);
            }
            eprintln!("{}", report.status_line);
            Ok(if report.result.status.id == codepad_core::status::STATUS_ACCEPTED {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(failure) => {
            match &failure.report {
                Some(report) => {
                    eprintln!("{}", report.title);
                    if !report.details.is_empty() {
                        eprintln!("{}", report.details);
                    }
                }
                None => eprintln!("{}", failure.error),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print the status of a job while it is still queued or running.
async fn show_progress(mut events: tokio::sync::broadcast::Receiver<ExecutionEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(ExecutionEvent::StatusUpdate { status, .. }) => {
                eprintln!("{}...", status.description);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress display lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
