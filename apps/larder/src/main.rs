//! # Larder - Recipe Recommender
//!
//! The main binary for the Larder recommendation pipeline.
//!
//! ## Usage
//!
//! ```bash
//! # Recommend recipes for what is in the pantry
//! larder recommend -i egg,flour,milk -t 30 -p vegetarian
//!
//! # Fit a posterior model from history and persist it
//! larder --mode posterior learn -o model.lrdr
//!
//! # Cross-validate the learned model
//! larder validate --folds 5
//! ```

use clap::Parser;
use larder::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // LARDER_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("LARDER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "larder=info,larder_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Larder startup banner.
fn print_banner() {
    println!(
        r#"
  Larder v{}
  What can I cook with what I have?
"#,
        env!("CARGO_PKG_VERSION")
    );
}
