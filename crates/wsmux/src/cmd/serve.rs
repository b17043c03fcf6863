use std::io;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wsmux_peer::{IncomingChannel, MultiplexerBuilder, MuxStream, Parity, StreamConfig};
use wsmux_transport::websocket;

use crate::cmd::{runtime, ServeArgs};
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::{print_channel, ChannelReport, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    runtime()?.block_on(serve(args, format))
}

async fn serve(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = TcpListener::bind(args.addr)
        .await
        .map_err(|err| io_error("bind failed", err))?;
    let local = listener
        .local_addr()
        .map_err(|err| io_error("bind failed", err))?;
    info!(addr = %local, "listening");

    let config = StreamConfig::default()
        .with_read_buffer_size(args.read_buffer)
        .with_write_max_outstanding(args.max_outstanding);
    let (reports_tx, mut reports) = mpsc::unbounded_channel();
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    let mut echoed = 0usize;
    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("interrupted");
                break;
            }
            accepted = listener.accept() => {
                let (tcp, peer) = accepted.map_err(|err| io_error("accept failed", err))?;
                tokio::spawn(serve_peer(tcp, peer.to_string(), config.clone(), reports_tx.clone()));
            }
            Some(report) = reports.recv() => {
                print_channel(&report, format);
                echoed += 1;
                if args.count.is_some_and(|count| echoed >= count) {
                    break;
                }
            }
        }
    }

    Ok(SUCCESS)
}

async fn serve_peer(
    tcp: TcpStream,
    peer: String,
    config: StreamConfig,
    reports: mpsc::UnboundedSender<ChannelReport>,
) {
    let transport = match websocket::accept(tcp).await {
        Ok(transport) => transport,
        Err(err) => {
            warn!(peer = %peer, error = %err, "websocket handshake failed");
            return;
        }
    };

    let (mux, mut incoming) = MultiplexerBuilder::new()
        .with_parity(Parity::Odd)
        .with_stream_config(config)
        .with_accept_policy(json_metadata)
        .spawn(transport);
    info!(peer = %peer, "peer connected");

    while let Some(inbound) = incoming.next().await {
        let peer = peer.clone();
        let reports = reports.clone();
        tokio::spawn(async move {
            let IncomingChannel {
                channel,
                metadata,
                stream,
            } = inbound;
            debug!(peer = %peer, channel, "echoing channel");
            match echo(stream).await {
                Ok(bytes) => {
                    let _ = reports.send(ChannelReport::new(peer, channel, &metadata, bytes));
                }
                Err(err) => warn!(peer = %peer, channel, error = %err, "echo failed"),
            }
        });
    }

    info!(
        peer = %peer,
        reason = %mux.closed_reason().unwrap_or_default(),
        "peer disconnected"
    );
}

/// Copy everything the channel delivers back into it, then end it.
async fn echo(stream: MuxStream) -> io::Result<u64> {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(bytes)
}

/// Channels must carry JSON metadata, or none at all.
fn json_metadata(metadata: &Bytes) -> Result<(), String> {
    if metadata.is_empty() {
        return Ok(());
    }
    serde_json::from_slice::<serde_json::Value>(metadata)
        .map(|_| ())
        .map_err(|err| format!("metadata is not valid JSON: {err}"))
}
