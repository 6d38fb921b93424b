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

#[derive(Serialize)]
struct MessageOutput<'a> {
    index: usize,
    size: usize,
    payload: String,
    payload_hex: String,
    source: &'a str,
    timestamp: String,
}

/// Print one decoded message. `index` counts messages from this source,
/// starting at 1.
pub fn print_message(message: &[u8], source: &str, index: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                index,
                size: message.len(),
                payload: payload_preview(message),
                payload_hex: hex(message),
                source,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "SOURCE", "PAYLOAD"])
                .add_row(vec![
                    index.to_string(),
                    message.len().to_string(),
                    source.to_string(),
                    payload_preview(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{} size={} source={} payload={}",
                index,
                message.len(),
                source,
                payload_preview(message)
            );
        }
        OutputFormat::Raw => {
            print_raw(message);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn hex(payload: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(payload.len() * 2);
    for byte in payload {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
