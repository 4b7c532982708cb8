use clap::Parser;
use tracing_subscriber::EnvFilter;

use blog_api_rust::cli::utils::output_error;
use blog_api_rust::cli::{Cli, OutputFormat};
use blog_api_rust::config::AppConfig;
use blog_api_rust::BlogError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, BLOG_PLACEHOLDER_USER_ID, etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_format = OutputFormat::from_cli(&cli);

    let config = AppConfig::from_env()?;
    config.validate()?;
    tracing::info!("Starting blog CLI in {:?} mode", config.environment);

    if let Err(e) = blog_api_rust::cli::run(cli, config).await {
        let code = e.downcast_ref::<BlogError>().map(BlogError::error_code);
        output_error(output_format, &e.to_string(), code)?;
        if matches!(std::env::var("CLI_VERBOSE").as_deref(), Ok("true") | Ok("1")) {
            eprintln!("{e:?}");
        }
        std::process::exit(1);
    }

    Ok(())
}
