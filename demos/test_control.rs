//! Exercise the RR12 control protocol against a running bridge.
//!
//! Usage: cargo run --example test_control [IP] [PORT]
//!
//! Default endpoint: 127.0.0.1:3601

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let ip = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1".to_string());

    let port: u16 = std::env::args().nth(2).and_then(|s| s.parse().ok()).unwrap_or(3601);

    println!("Testing RR12 control connection to {ip}:{port}");
    println!("==============================================");

    let mut stream = TcpStream::connect((ip.as_str(), port)).await?;
    let mut buf = [0u8; 1024];

    println!("\n[1] Negotiating protocol...");
    stream.write_all(b"SETPROTOCOL;<=3.4\r\n").await?;
    let n = timeout(Duration::from_secs(5), stream.read(&mut buf)).await??;
    println!("    Reply: {}", String::from_utf8_lossy(&buf[..n]).trim_end());

    println!("\n[2] Querying box name...");
    stream.write_all(b"GETCONFIG;GENERAL;BOXNAME\r\n").await?;
    let n = timeout(Duration::from_secs(5), stream.read(&mut buf)).await??;
    println!("    Reply: {}", String::from_utf8_lossy(&buf[..n]).trim_end());

    println!("\n[3] Querying status...");
    stream.write_all(b"GETSTATUS\r\n").await?;
    let n = timeout(Duration::from_secs(5), stream.read(&mut buf)).await??;
    println!("    Reply: {}", String::from_utf8_lossy(&buf[..n]).trim_end());

    println!("\n[4] Going live, waiting for tag payloads (10s)...");
    stream.write_all(b"GO_LIVE\r\n").await?;
    match timeout(Duration::from_secs(10), stream.read(&mut buf)).await {
        Ok(Ok(0)) => println!("    Bridge closed the connection"),
        Ok(Ok(n)) => println!("    Payload: {}", String::from_utf8_lossy(&buf[..n]).trim_end()),
        Ok(Err(e)) => println!("    Read error: {e}"),
        Err(_) => println!("    No payload within 10s (tag stream idle?)"),
    }

    Ok(())
}
