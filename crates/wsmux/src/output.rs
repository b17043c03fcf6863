use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One inbound channel the server echoed to completion.
#[derive(Debug, Serialize)]
pub struct ChannelReport {
    pub event: &'static str,
    pub peer: String,
    pub channel: u64,
    pub metadata: String,
    pub bytes: u64,
    pub timestamp: String,
}

impl ChannelReport {
    pub fn new(peer: String, channel: u64, metadata: &[u8], bytes: u64) -> Self {
        Self {
            event: "channel-echoed",
            peer,
            channel,
            metadata: preview(metadata),
            bytes,
            timestamp: now_unix_seconds(),
        }
    }
}

/// The result of a `send` exchange.
#[derive(Debug, Serialize)]
pub struct ExchangeReport {
    pub event: &'static str,
    pub url: String,
    pub sent: usize,
    pub received: usize,
    pub payload: String,
    pub elapsed_ms: u128,
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl ExchangeReport {
    pub fn new(url: String, sent: usize, received: Vec<u8>, elapsed_ms: u128) -> Self {
        Self {
            event: "exchange",
            url,
            sent,
            received: received.len(),
            payload: preview(&received),
            elapsed_ms,
            raw: received,
        }
    }
}

pub fn print_channel(report: &ChannelReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "CHANNEL", "BYTES", "METADATA"])
                .add_row(vec![
                    report.peer.clone(),
                    report.channel.to_string(),
                    report.bytes.to_string(),
                    report.metadata.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "peer={} channel={} bytes={} metadata={}",
                report.peer, report.channel, report.bytes, report.metadata
            );
        }
        OutputFormat::Raw => print_raw(format!("{}\n", report.metadata).as_bytes()),
    }
}

pub fn print_exchange(report: &ExchangeReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["URL", "SENT", "RECEIVED", "MS", "PAYLOAD"])
                .add_row(vec![
                    report.url.clone(),
                    report.sent.to_string(),
                    report.received.to_string(),
                    report.elapsed_ms.to_string(),
                    report.payload.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "url={} sent={} received={} elapsed_ms={} payload={}",
                report.url, report.sent, report.received, report.elapsed_ms, report.payload
            );
        }
        OutputFormat::Raw => print_raw(&report.raw),
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
