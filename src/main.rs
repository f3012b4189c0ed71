// Entrypoint for the image-upload command.
// - Parses arguments first, so `--help` and usage errors never depend on
//   configuration.
// - Resolves configuration (defaults → config file → environment).
// - Hands the parsed arguments and an API-backed context to
//   `plugin::execute` and exits with whatever code it returns.

use std::io::{StdoutLock, Write};

use image_upload::api::ApiClient;
use image_upload::config::CliConfig;
use image_upload::error::EXIT_CONFIG;
use image_upload::plugin::{self, PluginContext};

fn main() {
    let mut stdout = std::io::stdout().lock();
    let args = match plugin::parse_args(std::env::args_os().skip(1), &mut stdout) {
        Ok(args) => args,
        Err(code) => exit(stdout, code),
    };

    let config = match CliConfig::builder()
        .with_env_overrides()
        .with_default_config_file()
        .and_then(|builder| builder.build())
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            exit(stdout, EXIT_CONFIG);
        }
    };

    init_logging(config.verbose);
    tracing::debug!(api_url = %config.api_url, region = ?config.region, "configuration loaded");

    let client = match ApiClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit(stdout, EXIT_CONFIG);
        }
    };

    let ctx = PluginContext::new(config.token.clone().unwrap_or_default(), client)
        .with_default_region(config.region.clone());

    let code = plugin::execute(&args, &ctx, &mut stdout);
    exit(stdout, code);
}

/// `process::exit` skips destructors, so flush what the command printed first.
fn exit(mut stdout: StdoutLock<'_>, code: i32) -> ! {
    if let Err(e) = stdout.flush() {
        tracing::debug!(error = %e, "failed to flush stdout");
    }
    std::process::exit(code);
}

/// Logs go to stderr so they never mix with the command's own output.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
