use clap::Parser;
use college_api_rust::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = college_api_rust::cli::run(cli).await {
        if let Ok("true") | Ok("1") = std::env::var("CLI_VERBOSE").as_deref() {
            eprintln!("Error: {e:?}");
        }
        std::process::exit(1);
    }

    Ok(())
}
