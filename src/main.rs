use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod adapters;
mod cli;
mod config;
mod context;
mod distribution;
mod engine;
mod install;
mod lifecycle;
mod logging;
mod notify;
mod poll;
mod provisioner;
mod scaffold;

use cli::Cli;
use config::ValidationSummaryError;
use notify::Notifier;

/// Exit code for runtime failures
const EXIT_FAILURE: i32 = 1;

/// Exit code for configuration/usage problems
const EXIT_INVALID: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                print!("{err}");
                std::process::exit(0);
            }
            eprintln!(
                "{}",
                cli::normalize_error_message(&err.render().to_string())
            );
            std::process::exit(EXIT_INVALID);
        }
    };

    if let Err(err) = logging::init_logging(&cli.verbosity) {
        eprintln!("{err}");
        std::process::exit(EXIT_INVALID);
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            ctrl_c_cancel.cancel();
        }
    });

    let notifier = Notifier::stdout();
    if let Err(err) = cli::commands::dispatch(cli.command, notifier.clone(), cancel).await {
        notifier.error(cli::normalize_error_message(&format!("{err:#}")));

        let code = if err.downcast_ref::<ValidationSummaryError>().is_some() {
            EXIT_INVALID
        } else {
            EXIT_FAILURE
        };
        std::process::exit(code);
    }
}
