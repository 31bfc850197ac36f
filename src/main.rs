use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{info, warn};

use relaycast::{
    cli::{Cli, Command},
    client,
    tcp::TcpRelay,
    udp::UdpRelay,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => {
            let listener = TcpListener::bind(args.listen)
                .await
                .with_context(|| format!("failed to bind {}", args.listen))?;
            let relay = TcpRelay::new(listener);
            info!("stream relay listening on {}", relay.local_addr()?);
            if let Err(err) = relay.run_until_ctrl_c().await {
                warn!("stream relay exited with error: {err:?}");
                return Err(err);
            }
        }
        Command::ServerUdp(args) => {
            let socket = UdpSocket::bind(args.listen)
                .await
                .with_context(|| format!("failed to bind {}", args.listen))?;
            let relay = UdpRelay::new(socket);
            info!("datagram relay listening on {}", relay.local_addr()?);
            if let Err(err) = relay.run_until_ctrl_c().await {
                warn!("datagram relay exited with error: {err:?}");
                return Err(err);
            }
        }
        Command::Client(args) => client::run_stream(args).await?,
        Command::ClientUdp(args) => client::run_datagram(args).await?,
    }

    Ok(())
}
