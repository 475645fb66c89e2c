//! `atelier` -- headless image-generation panel.
//!
//! Submits one job to the panel backend, logs its progress, and saves
//! the result. Optionally paints mask strokes over the result and
//! submits a repair pass.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                 | Description                     |
//! |------------------------|----------|-------------------------|---------------------------------|
//! | `PANEL_BASE_URL`       | no       | `http://127.0.0.1:5000` | Panel API base (`--base-url`)   |
//! | `PANEL_WS_URL`         | no       | `ws://<host>:8188`      | Push channel base               |
//! | `POLL_INTERVAL_MS`     | no       | `1000`                  | Delay between result queries    |
//! | `POLL_MAX_ATTEMPTS`    | no       | `60`                    | Result queries before giving up |
//! | `FINISH_DELAY_MS`      | no       | `1500`                  | Completed-bar hide delay        |
//! | `REQUEST_TIMEOUT_SECS` | no       | `120`                   | HTTP request timeout            |

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_cli::args::CliArgs;
use atelier_cli::panel;
use atelier_client::config::PanelConfig;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier=info,atelier_cli=info,atelier_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let base_url = args.base_url.clone();
    let config = match PanelConfig::from_lookup(|key| match (key, &base_url) {
        ("PANEL_BASE_URL", Some(url)) => Some(url.clone()),
        _ => std::env::var(key).ok(),
    }) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        base_url = %config.base_url,
        ws_url = %config.ws_url,
        mode = %args.mode,
        "Starting atelier",
    );

    match panel::run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Run failed");
            ExitCode::FAILURE
        }
    }
}
