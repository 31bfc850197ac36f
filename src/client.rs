//! Interactive clients for both relay variants.
//!
//! Lines from stdin go to the relay verbatim, newline included; whatever
//! the relay sends back is written to stdout as-is. An empty input line
//! ends the session without transmitting it.

use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Stdin},
    net::{
        TcpStream, UdpSocket,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
};
use tracing::warn;

use crate::{broadcast::MAX_MESSAGE_LEN, cli::ClientArgs};

pub async fn run_stream(args: ClientArgs) -> Result<()> {
    let stream = TcpStream::connect(args.server.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    write_stdout(&format!("*** connected to {}", args.server)).await?;

    let (mut reader, mut writer) = stream.into_split();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();

    run_stream_loop(&mut reader, &mut writer, &mut stdin, &mut input).await?;
    shutdown_connection(&mut writer).await;

    Ok(())
}

async fn run_stream_loop(
    reader: &mut OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
    stdin: &mut BufReader<Stdin>,
    input: &mut String,
) -> Result<()> {
    let mut received = [0u8; MAX_MESSAGE_LEN];

    loop {
        input.clear();
        select! {
            bytes_read = reader.read(&mut received) => {
                if !handle_relay_bytes(bytes_read, &received).await? {
                    break;
                }
            }
            bytes_read = stdin.read_line(input) => {
                if !handle_stream_input(bytes_read, input, writer).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                handle_ctrl_c(ctrl_c);
                break;
            }
        }
    }
    Ok(())
}

async fn handle_relay_bytes(bytes_read: io::Result<usize>, received: &[u8]) -> Result<bool> {
    let len = bytes_read.context("failed to read from the relay")?;
    if len == 0 {
        write_stdout("*** relay closed the connection").await?;
        return Ok(false);
    }
    print_payload(&received[..len]).await?;
    Ok(true)
}

async fn handle_stream_input(
    bytes_read: io::Result<usize>,
    input: &str,
    writer: &mut OwnedWriteHalf,
) -> Result<bool> {
    let bytes_read = bytes_read.context("failed to read stdin")?;
    if bytes_read == 0 || is_empty_line(input) {
        return Ok(false);
    }

    writer
        .write_all(input.as_bytes())
        .await
        .context("failed to send to the relay")?;
    Ok(true)
}

pub async fn run_datagram(args: ClientArgs) -> Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind a local datagram socket")?;
    socket
        .connect(args.server.as_str())
        .await
        .with_context(|| format!("failed to reach {}", args.server))?;
    write_stdout(&format!("*** sending to {}", args.server)).await?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();

    run_datagram_loop(&socket, &mut stdin, &mut input).await
}

async fn run_datagram_loop(
    socket: &UdpSocket,
    stdin: &mut BufReader<Stdin>,
    input: &mut String,
) -> Result<()> {
    let mut received = [0u8; MAX_MESSAGE_LEN];

    loop {
        input.clear();
        select! {
            received_len = socket.recv(&mut received) => {
                let len = received_len.context("failed to receive from the relay")?;
                print_payload(&received[..len]).await?;
            }
            bytes_read = stdin.read_line(input) => {
                if !handle_datagram_input(bytes_read, input, socket).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                handle_ctrl_c(ctrl_c);
                send_leave(socket).await;
                break;
            }
        }
    }
    Ok(())
}

async fn handle_datagram_input(
    bytes_read: io::Result<usize>,
    input: &str,
    socket: &UdpSocket,
) -> Result<bool> {
    let bytes_read = bytes_read.context("failed to read stdin")?;
    if bytes_read == 0 || is_empty_line(input) {
        send_leave(socket).await;
        return Ok(false);
    }

    socket
        .send(input.as_bytes())
        .await
        .context("failed to send to the relay")?;
    Ok(true)
}

/// An empty datagram is the leave signal. Failing to send it only leaves
/// a dead entry behind on the relay.
async fn send_leave(socket: &UdpSocket) {
    if let Err(error) = socket.send(&[]).await {
        warn!(?error, "failed to send the leave datagram");
    }
}

/// A line is empty when nothing but the line terminator came in. Spaces
/// count as payload and are transmitted like any other bytes.
fn is_empty_line(input: &str) -> bool {
    input.trim_end_matches(['\r', '\n']).is_empty()
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}

async fn shutdown_connection(writer: &mut OwnedWriteHalf) {
    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shutdown client writer cleanly");
    }
}

async fn print_payload(payload: &[u8]) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(payload).await?;
    stdout.flush().await
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
