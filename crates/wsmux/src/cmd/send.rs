use std::fs;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wsmux_peer::{Multiplexer, MuxConfig, Parity};
use wsmux_transport::websocket;

use crate::cmd::{runtime, SendArgs};
use crate::exit::{
    io_error, peer_error, timeout, transport_error, CliError, CliResult, SUCCESS, USAGE,
};
use crate::output::{print_exchange, ExchangeReport, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let limit = parse_duration(&args.timeout)?;
    let metadata = resolve_metadata(&args.meta)?;
    let payload = resolve_payload(&args)?;

    let report = runtime()?
        .block_on(async { tokio::time::timeout(limit, exchange(&args.url, metadata, payload)).await })
        .map_err(|_| timeout("exchange failed"))??;

    print_exchange(&report, format);
    Ok(SUCCESS)
}

/// Open one channel, send `payload`, end the channel and collect the reply.
async fn exchange(url: &str, metadata: Bytes, payload: Vec<u8>) -> CliResult<ExchangeReport> {
    let started = Instant::now();
    let transport = websocket::connect(url)
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    let (mux, _incoming) =
        Multiplexer::spawn(transport, MuxConfig::default().with_parity(Parity::Even));

    let stream = mux
        .create_channel(metadata)
        .await
        .map_err(|err| peer_error("create failed", err))?;
    let (mut reader, mut writer) = tokio::io::split(stream);

    // The reply is read while writing so neither side stalls on a full window.
    let write = async {
        writer.write_all(&payload).await?;
        writer.shutdown().await
    };
    let read = async {
        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.map(|_| received)
    };
    let (written, received) = tokio::join!(write, read);
    written.map_err(|err| io_error("send failed", err))?;
    let received = received.map_err(|err| io_error("receive failed", err))?;

    drop(reader);
    drop(writer);
    mux.close().await;

    Ok(ExchangeReport::new(
        url.to_string(),
        payload.len(),
        received,
        started.elapsed().as_millis(),
    ))
}

fn resolve_metadata(meta: &str) -> CliResult<Bytes> {
    serde_json::from_str::<serde_json::Value>(meta)
        .map_err(|err| CliError::new(USAGE, format!("--meta is not valid JSON: {err}")))?;
    Ok(Bytes::from(meta.as_bytes().to_vec()))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let (number, scale) = if let Some(num) = input.strip_suffix("ms") {
        (num, 1)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, 1_000)
    } else if let Some(num) = input.strip_suffix('m') {
        (num, 60_000)
    } else {
        (input, 1_000)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input:?}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(Duration::from_millis(value.saturating_mul(scale)))
}
