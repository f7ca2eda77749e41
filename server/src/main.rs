use clap::Parser;
use log::info;
use server::config::SessionConfig;
use server::network::Server;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Session settings file (TOML); command-line values override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tick rate (updates per second)
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Maximum number of connected clients
    #[arg(short, long)]
    max_clients: Option<usize>,

    /// Non-player agents per wave
    #[arg(long)]
    bots_per_wave: Option<u32>,

    /// Number of non-player waves
    #[arg(long)]
    waves: Option<u32>,

    /// Seconds a dead player waits before respawning
    #[arg(long)]
    respawn_delay: Option<f32>,
}

impl Args {
    fn session_config(&self) -> Result<SessionConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };

        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(max_clients) = self.max_clients {
            config.max_clients = max_clients;
        }
        if let Some(bots_per_wave) = self.bots_per_wave {
            config.bots.bots_per_wave = bots_per_wave;
        }
        if let Some(waves) = self.waves {
            config.bots.waves = waves;
        }
        if let Some(respawn_delay) = self.respawn_delay {
            config.respawn_delay_secs = respawn_delay;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.session_config()?;
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting server on {} at {} Hz", address, config.tick_rate);
    let mut server = Server::new(&address, config).await?;
    server.run().await?;

    info!("Server stopped");
    Ok(())
}
