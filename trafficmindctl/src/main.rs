use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = trafficmindctl::Cli::parse();
    if let Err(err) = trafficmindctl::run(cli).await {
        if err.is_startup() {
            eprintln!("fatal: {err}");
            std::process::exit(2);
        }
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
