//! Two multiplexers in one process, echoing several channels at once.
//!
//! Run with:
//!   cargo run -p wsmux --example memory-echo

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wsmux::transport::memory;
use wsmux::{MultiplexerBuilder, Parity};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (left, right) = memory::pair();

    let (client, _) = MultiplexerBuilder::new()
        .with_parity(Parity::Even)
        .spawn(left);
    let (_server, mut incoming) = MultiplexerBuilder::new()
        .with_parity(Parity::Odd)
        .with_accept_policy(|_: &bytes::Bytes| -> Result<(), String> { Ok(()) })
        .spawn(right);

    // Server side: echo every accepted channel.
    tokio::spawn(async move {
        while let Some(inbound) = incoming.next().await {
            eprintln!(
                "server: channel {} opened with {}",
                inbound.channel,
                String::from_utf8_lossy(&inbound.metadata)
            );
            let (mut reader, mut writer) = tokio::io::split(inbound.stream);
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    let mut tasks = Vec::new();
    for name in ["alpha", "beta", "gamma"] {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let metadata = format!(r#"{{"name":"{name}"}}"#);
            let stream = client.create_channel(metadata.into_bytes()).await?;
            let (mut reader, mut writer) = tokio::io::split(stream);

            let message = name.repeat(10_000);
            let write = async {
                writer.write_all(message.as_bytes()).await?;
                writer.shutdown().await
            };
            let mut echoed = Vec::new();
            let (written, read) = tokio::join!(write, reader.read_to_end(&mut echoed));
            written?;
            read?;
            assert_eq!(echoed, message.as_bytes());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>((name, echoed.len()))
        }));
    }

    for task in tasks {
        match task.await? {
            Ok((name, len)) => eprintln!("client: {name} echoed {len} bytes"),
            Err(err) => eprintln!("client: channel failed: {err}"),
        }
    }

    client.close().await;
    Ok(())
}
