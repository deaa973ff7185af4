//! Deskmate entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config (env overrides applied)
//!   3. Init logger at the configured level
//!   4. Build service adapters
//!   5. Run the console session on a current-thread runtime until exit,
//!      end of input, or Ctrl-C

use deskmate::console::Sink;
use deskmate::dispatch::Dispatcher;
use deskmate::error::AppError;
use deskmate::services::Services;
use deskmate::session::Session;
use deskmate::{config, logger};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level, config.log_file.as_deref())?;

    info!(
        user_name = %config.user_name,
        assistant_name = %config.assistant_name,
        work_dir = %config.work_dir.display(),
        log_level = %config.log_level,
        "config loaded"
    );

    let services = Services::build(&config).map_err(AppError::Config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let shutdown = CancellationToken::new();
        let ctrl_c = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => ctrl_c.cancel(),
                Err(e) => warn!("ctrl-c handler unavailable: {e}"),
            }
        });

        let sink = Sink::stdout(config.assistant_name.clone());
        let dispatcher = Dispatcher::new(config.user_name.clone(), services, sink);
        let mut session = Session::new(&config.user_name, &config.assistant_name, dispatcher);
        let end = session
            .run(BufReader::new(tokio::io::stdin()), shutdown)
            .await;
        info!(?end, "deskmate exiting");
    });

    Ok(())
}
