use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use weathercache::app::App;
use weathercache::cli::Args;
use weathercache::config::Config;
use weathercache::logging::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting weathercache"
    );

    let mut app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "Failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = app.setup_services() {
        error!(error = ?e, "Failed to setup services");
        return ExitCode::FAILURE;
    }

    app.start_services();
    app.run().await
}
