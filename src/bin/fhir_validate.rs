use clap::Parser;
use octofhir_validator::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli::verbosity_directive(cli.verbose, cli.quiet)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli::run(cli.command, cli.cache_dir).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    }
}
