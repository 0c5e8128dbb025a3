mod cli;
mod formatting;
mod settings;

use std::process::ExitCode;

use dexport_lib::{init_logging, parse_target, run_export, ExportError, ExportRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cli::Cli;
use formatting::{render_error, write_report};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = init_logging(args.verbose, args.log_format()) {
        eprintln!("{err}");
    }
    run(args).await
}

async fn run(args: Cli) -> ExitCode {
    let request = match build_request(&args) {
        Ok(request) => request,
        Err(err) => return render_error(&err, args.report),
    };
    let config = match settings::load_config(args.config.as_deref())
        .and_then(|config| settings::resolve_config(config, &args))
    {
        Ok(config) => config,
        Err(err) => return render_error(&err, args.report),
    };
    debug!(?config, ?request, "resolved export settings");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; closing the browser");
            on_interrupt.cancel();
        }
    });

    match run_export(&request, &config, cancel).await {
        Ok(report) => match write_report(&report, args.report) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Failed to write report: {err}");
                ExitCode::from(2)
            }
        },
        Err(err) => render_error(&err, args.report),
    }
}

fn build_request(args: &Cli) -> Result<ExportRequest, ExportError> {
    let target = parse_target(&args.target_url)?;
    Ok(ExportRequest::new(target, args.format.into()).with_credentials(settings::credentials(args)))
}
