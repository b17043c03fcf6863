//! Echo over a real WebSocket connection on localhost.
//!
//! Run with:
//!   cargo run -p wsmux --example ws-echo
//!
//! Against the CLI server instead:
//!   cargo run -p wsmux --features cli -- serve 127.0.0.1:9000
//!   cargo run -p wsmux --features cli -- send ws://127.0.0.1:9000 --meta '{"name":"x"}' --data hello

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wsmux::transport::websocket;
use wsmux::{MultiplexerBuilder, Parity};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    eprintln!("Listening on ws://{addr}");

    tokio::spawn(async move {
        let Ok((tcp, peer)) = listener.accept().await else {
            return;
        };
        let Ok(transport) = websocket::accept(tcp).await else {
            return;
        };
        eprintln!("Peer connected: {peer}");
        let (_mux, mut incoming) = MultiplexerBuilder::new()
            .with_parity(Parity::Odd)
            .with_accept_policy(|_: &bytes::Bytes| -> Result<(), String> { Ok(()) })
            .spawn(transport);
        while let Some(inbound) = incoming.next().await {
            let (mut reader, mut writer) = tokio::io::split(inbound.stream);
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
            let _ = writer.shutdown().await;
        }
    });

    let transport = websocket::connect(&format!("ws://{addr}")).await?;
    let (mux, _) = MultiplexerBuilder::new()
        .with_parity(Parity::Even)
        .spawn(transport);

    let mut stream = mux.create_channel(&br#"{"name":"x"}"#[..]).await?;
    stream.write_all(b"hello over websocket").await?;
    stream.shutdown().await?;

    let mut echoed = String::new();
    stream.read_to_string(&mut echoed).await?;
    eprintln!("Echoed: {echoed}");

    drop(stream);
    mux.close().await;
    Ok(())
}
