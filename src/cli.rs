use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the stream relay, accepting TCP connections.
    Server(ServerArgs),
    /// Run the datagram relay on a UDP socket.
    ServerUdp(ServerArgs),
    /// Connect to a stream relay and exchange messages interactively.
    Client(ClientArgs),
    /// Talk to a datagram relay interactively.
    ClientUdp(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:7000")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Address of the relay, as host:port.
    #[arg(long, default_value = "127.0.0.1:7000")]
    pub server: String,
}
