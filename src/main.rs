//! graphkeys CLI binary entry point.

use graphkeys::cli::{Cli, Commands};
use graphkeys::error::KeysError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        if let Some(hint) = e.category().hint() {
            eprintln!("Hint: {hint}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), KeysError> {
    let (app, serve) = cli.load_config()?;
    match &cli.command {
        Commands::Get(args) => graphkeys::cli::keys::handle_get(&app, args).await,
        Commands::Set(args) => graphkeys::cli::keys::handle_set(&app, args).await,
        Commands::Delete(args) => graphkeys::cli::keys::handle_delete(&app, args).await,
        Commands::Serve(_) => graphkeys::cli::serve::handle_serve(&app, &serve).await,
    }
}
