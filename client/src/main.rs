use clap::Parser;
use client::network::Client;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name shown in the roster and on the scoreboard
    #[arg(short = 'n', long, default_value = "")]
    nickname: String,

    /// Walk around randomly once spawned
    #[arg(short = 'w', long)]
    wander: bool,

    /// Shoot at the closest entity every N milliseconds
    #[arg(long)]
    shoot_interval: Option<u64>,

    /// Start the match right away when this client is the host
    #[arg(long)]
    start_match: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let mut client = Client::new(
        &args.server,
        args.nickname,
        args.wander,
        args.shoot_interval.map(Duration::from_millis),
        args.start_match,
    )
    .await?;

    client.run().await?;

    Ok(())
}
