use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use olcbprims_frame::mti::mti_name;
use olcbprims_frame::CanFrame;
use olcbprims_node::Message;
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
    schema_id: &'a str,
    mti: String,
    mti_name: &'a str,
    source: Option<String>,
    source_alias: Option<String>,
    dest: Option<String>,
    dest_alias: Option<String>,
    event_id: Option<String>,
    payload: Option<String>,
    timestamp: String,
}

pub fn print_message(message: &Message, format: OutputFormat) {
    let source = message.source.map(|id| id.to_string());
    let source_alias = message.source_alias.map(|alias| alias.to_string());
    let dest = message.dest.map(|id| id.to_string());
    let dest_alias = message.dest_alias.map(|alias| alias.to_string());
    let event_id = message.event_id.map(|id| id.to_string());
    let payload = message.payload.as_deref().map(hex);

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                schema_id: "https://schemas.3leaps.dev/olcbprims/cli/v1/message-received.schema.json",
                mti: format!("0x{:03X}", message.mti),
                mti_name: mti_name(message.mti),
                source,
                source_alias,
                dest,
                dest_alias,
                event_id,
                payload,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MTI", "NAME", "SOURCE", "DEST", "DATA"])
                .add_row(vec![
                    format!("0x{:03X}", message.mti),
                    mti_name(message.mti).to_string(),
                    source.or(source_alias).unwrap_or_else(|| "-".to_string()),
                    dest.or(dest_alias).unwrap_or_else(|| "-".to_string()),
                    event_id.or(payload).unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{message}"),
        OutputFormat::Raw => print_raw(&message.body()),
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    schema_id: &'a str,
    header: String,
    kind: &'a str,
    data: String,
    gridconnect: String,
}

pub fn print_frame(frame: &CanFrame, format: OutputFormat) {
    let kind = frame.kind();
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                schema_id: "https://schemas.3leaps.dev/olcbprims/cli/v1/frame-received.schema.json",
                header: format!("0x{:08X}", frame.header()),
                kind: kind.name(),
                data: hex(frame.data()),
                gridconnect: frame.to_gridconnect(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["HEADER", "KIND", "DATA"])
                .add_row(vec![
                    format!("{:08X}", frame.header()),
                    kind.name().to_string(),
                    hex(frame.data()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{:<4} {frame:?}", kind.name());
        }
        OutputFormat::Raw => println!("{frame}"),
    }
}

/// Print a flat key/value record, used by `resolve` and `verify`.
pub fn print_record<T: Serialize>(record: &T, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(rows.iter().map(|(key, _)| key.to_uppercase()))
                .add_row(rows.iter().map(|(_, value)| value.clone()));
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = rows.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("{}", line.join(" "));
        }
        OutputFormat::Raw => {
            if let Some((_, value)) = rows.last() {
                println!("{value}");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
