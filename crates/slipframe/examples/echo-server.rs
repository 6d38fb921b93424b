//! Minimal echo server: accepts one peer and echoes messages back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send unix:/tmp/slipframe-echo-<pid>/echo.sock \
//!     --data 'hello' --wait --wait-timeout 3

use std::fs;

use slipframe::transport::SlipListener;
use slipframe::{Endpoint, SlipWrapper, TransportError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("slipframe-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let endpoint = Endpoint::unix(sock_dir.join("echo.sock"));

    let listener = SlipListener::bind(&endpoint)?;
    eprintln!("Listening on {endpoint}");

    let (mut socket, peer) = listener.accept()?;
    eprintln!("Peer connected: {peer}");

    loop {
        match socket.recv_msg() {
            Ok(Some(msg)) => {
                eprintln!("Received {} bytes", msg.len());
                socket.send_msg(&msg)?;
            }
            Ok(None) => {
                eprintln!("Peer disconnected");
                break;
            }
            Err(TransportError::Driver(err)) if err.is_protocol() => {
                eprintln!("Skipping packet: {err}")
            }
            Err(err) => return Err(err.into()),
        }
    }

    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
