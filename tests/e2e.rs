use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::test]
async fn stream_cli_end_to_end() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("relaycast");

    let (mut relay_child, mut relay_stdout) = spawn_relay(&binary, "server").await?;
    let addr = read_relay_addr(&mut relay_stdout).await?;

    // Drain further relay logs in the background so the pipe never fills.
    let relay_log_task = tokio::spawn(async move {
        drain_stdout(relay_stdout).await;
    });

    let mut alice = spawn_client(&binary, "client", &addr).await?;
    let banner = read_line_expect(&mut alice.stdout, "waiting for alice banner").await?;
    assert_eq!(banner, format!("*** connected to {addr}"));

    let mut bob = spawn_client(&binary, "client", &addr).await?;
    let banner = read_line_expect(&mut bob.stdout, "waiting for bob banner").await?;
    assert_eq!(banner, format!("*** connected to {addr}"));

    // Bob's first line comes back to him, which proves he is a member;
    // Alice receives it as well.
    bob.send_line("checking in").await?;
    let bob_echo = read_line_expect(&mut bob.stdout, "waiting for bob echo").await?;
    assert_eq!(bob_echo, "checking in");
    let alice_hears = read_line_expect(&mut alice.stdout, "waiting for alice").await?;
    assert_eq!(alice_hears, "checking in");

    // Every line reaches both members, the sender included.
    alice.send_line("hello from alice").await?;
    assert_eq!(
        read_line_expect(&mut alice.stdout, "waiting for alice echo").await?,
        "hello from alice"
    );
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for bob").await?,
        "hello from alice"
    );

    bob.send_line("hi alice!").await?;
    assert_eq!(
        read_line_expect(&mut alice.stdout, "waiting for alice").await?,
        "hi alice!"
    );
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for bob echo").await?,
        "hi alice!"
    );

    // An empty line quits without transmitting anything.
    alice.send_line("").await?;
    ensure_success(&mut alice.child, "alice client").await?;

    // The relay keeps serving the remaining member.
    bob.send_line("anyone?").await?;
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for bob solo echo").await?,
        "anyone?"
    );

    bob.send_line("").await?;
    ensure_success(&mut bob.child, "bob client").await?;

    // The relay stays up after clients disconnect; terminate it manually.
    let _ = relay_child.kill().await;
    let _ = relay_child.wait().await;
    let _ = relay_log_task.await;

    Ok(())
}

#[tokio::test]
async fn datagram_cli_end_to_end() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("relaycast");

    let (mut relay_child, mut relay_stdout) = spawn_relay(&binary, "server-udp").await?;
    let addr = read_relay_addr(&mut relay_stdout).await?;

    let relay_log_task = tokio::spawn(async move {
        drain_stdout(relay_stdout).await;
    });

    let mut p = spawn_client(&binary, "client-udp", &addr).await?;
    let banner = read_line_expect(&mut p.stdout, "waiting for p banner").await?;
    assert_eq!(banner, format!("*** sending to {addr}"));

    // P's first datagram joins it and comes straight back.
    p.send_line("ping").await?;
    assert_eq!(
        read_line_expect(&mut p.stdout, "waiting for p echo").await?,
        "ping"
    );

    let mut q = spawn_client(&binary, "client-udp", &addr).await?;
    let banner = read_line_expect(&mut q.stdout, "waiting for q banner").await?;
    assert_eq!(banner, format!("*** sending to {addr}"));

    q.send_line("hola").await?;
    assert_eq!(
        read_line_expect(&mut q.stdout, "waiting for q echo").await?,
        "hola"
    );
    assert_eq!(
        read_line_expect(&mut p.stdout, "waiting for p").await?,
        "hola"
    );

    // An empty line makes P leave; the relay drops it from the membership.
    p.send_line("").await?;
    ensure_success(&mut p.child, "p client").await?;

    q.send_line("solo").await?;
    assert_eq!(
        read_line_expect(&mut q.stdout, "waiting for q solo echo").await?,
        "solo"
    );

    q.send_line("").await?;
    ensure_success(&mut q.child, "q client").await?;

    let _ = relay_child.kill().await;
    let _ = relay_child.wait().await;
    let _ = relay_log_task.await;

    Ok(())
}

struct ClientProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ClientProcess {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to send line '{line}'"))?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

async fn spawn_relay(binary: &Path, mode: &str) -> Result<(Child, BufReader<ChildStdout>)> {
    let mut cmd = Command::new(binary);
    cmd.arg(mode)
        .arg("--listen")
        .arg("127.0.0.1:0")
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().context("failed to spawn relay")?;
    let stdout = child
        .stdout
        .take()
        .context("relay stdout missing after spawn")?;

    Ok((child, BufReader::new(stdout)))
}

async fn read_relay_addr(reader: &mut BufReader<ChildStdout>) -> Result<String> {
    let line = read_line(reader)
        .await?
        .context("relay did not emit its listening address")?;
    let trimmed = line.trim();
    let addr = trimmed
        .split_whitespace()
        .last()
        .context("unexpected relay banner format")?;
    if !addr.contains(':') {
        return Err(anyhow!("relay banner missing socket: {trimmed}"));
    }
    Ok(addr.to_string())
}

async fn spawn_client(binary: &Path, mode: &str, addr: &str) -> Result<ClientProcess> {
    let mut cmd = Command::new(binary);
    cmd.arg(mode)
        .arg("--server")
        .arg(addr)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {mode} against {addr}"))?;

    let stdin = child
        .stdin
        .take()
        .context("client stdin missing after spawn")?;
    let stdout = child
        .stdout
        .take()
        .context("client stdout missing after spawn")?;

    Ok(ClientProcess {
        child,
        stdin,
        stdout: BufReader::new(stdout),
    })
}

async fn read_line_expect(
    reader: &mut BufReader<ChildStdout>,
    description: &str,
) -> Result<String> {
    match read_line(reader).await {
        Ok(Some(line)) => Ok(line),
        Ok(None) => Err(anyhow!("{description}: stream closed")),
        Err(err) => Err(err.context(format!("{description}: failed to read line"))),
    }
}

async fn read_line(reader: &mut BufReader<ChildStdout>) -> Result<Option<String>> {
    let mut line = String::new();
    let read_future = reader.read_line(&mut line);
    let bytes_io = match timeout(READ_TIMEOUT, read_future).await {
        Ok(result) => result,
        Err(_) => return Err(anyhow!("timed out waiting for line")),
    };
    let byte_count = bytes_io?;
    if byte_count == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn drain_stdout(mut reader: BufReader<ChildStdout>) {
    let mut buffer = String::new();
    while reader
        .read_line(&mut buffer)
        .await
        .map(|bytes| {
            let has_data = bytes > 0;
            if has_data {
                buffer.clear();
            }
            has_data
        })
        .unwrap_or(false)
    {}
}

async fn ensure_success(child: &mut Child, name: &str) -> Result<()> {
    let status = child
        .wait()
        .await
        .with_context(|| format!("failed to await {name} process"))?;
    if !status.success() {
        return Err(anyhow!("{name} exited with status {status}"));
    }
    Ok(())
}
