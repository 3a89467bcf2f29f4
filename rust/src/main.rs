use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use snowflake::{
    Epoch, Preset, Schema, SchemaConfig, Segment, SnowflakeParts, checked_field, pack,
    parse_value, unpack,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "snowflake",
    version,
    about = "Generate and parse Discord, Twitter, Instagram and custom snowflake IDs"
)]
struct Cli {
    #[command(flatten)]
    schema: SchemaOpts,

    #[command(subcommand)]
    command: Command,
}

/// Schema selection. A config file takes precedence over a preset; the
/// per-field flags override whichever base was chosen.
#[derive(Args, Debug, Clone, Default)]
struct SchemaOpts {
    /// Preset layout: discord, twitter or instagram.
    #[arg(long, global = true, env = "SNOWFLAKE_PRESET", value_parser = parse_preset)]
    preset: Option<Preset>,

    /// JSON schema config file.
    #[arg(long, global = true, env = "SNOWFLAKE_CONFIG")]
    config: Option<PathBuf>,

    /// Epoch as a preset name or Unix milliseconds.
    #[arg(long, global = true)]
    epoch: Option<Epoch>,

    /// Reserve the most significant bit (true/false or 0/1).
    #[arg(long, global = true, allow_negative_numbers = true, value_parser = parse_leading_bit)]
    leading_bit: Option<i64>,

    #[arg(long, global = true, allow_negative_numbers = true)]
    timestamp_bits: Option<i64>,

    #[arg(long, global = true, allow_negative_numbers = true)]
    param1_bits: Option<i64>,

    #[arg(long, global = true, allow_negative_numbers = true)]
    param2_bits: Option<i64>,

    #[arg(long, global = true, allow_negative_numbers = true)]
    sequence_bits: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack field values into a snowflake.
    Generate {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        param1: i128,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        param2: i128,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        sequence: i128,
        /// RFC 3339 date or Unix milliseconds; defaults to now.
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
    },
    /// Split a snowflake into its fields.
    Parse {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the bit layout of the selected schema.
    Layout {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective schema config as JSON.
    Config,
    /// Generate a sample and check that it parses back.
    Healthcheck {
        #[arg(long)]
        json: bool,
    },
}

fn parse_preset(s: &str) -> Result<Preset, String> {
    Preset::parse(s).ok_or_else(|| "preset must be one of: discord, twitter, instagram".to_string())
}

fn parse_leading_bit(s: &str) -> Result<i64, String> {
    match s {
        "true" => Ok(1),
        "false" => Ok(0),
        _ => s
            .parse::<i64>()
            .map_err(|_| "leading-bit must be true, false, 0 or 1".to_string()),
    }
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ms) = s.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| format!("timestamp out of range: {ms}"));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("invalid date {s:?}: {e}"))
}

fn resolve_config(opts: &SchemaOpts) -> Result<SchemaConfig, String> {
    let mut config = match (&opts.config, opts.preset) {
        (Some(path), preset) => {
            if let Some(preset) = preset {
                warn!(preset = preset.as_str(), path = %path.display(), "config file overrides preset");
            }
            SchemaConfig::load(path).map_err(|e| format!("{}: {e}", path.display()))?
        }
        (None, Some(preset)) => preset.schema().config(),
        (None, None) => SchemaConfig::default(),
    };

    if let Some(epoch) = opts.epoch {
        config.epoch = epoch;
    }
    if let Some(v) = opts.leading_bit {
        config.leading_bit = v;
    }
    if let Some(v) = opts.timestamp_bits {
        config.timestamp_length = v;
    }
    if let Some(v) = opts.param1_bits {
        config.param1_length = v;
    }
    if let Some(v) = opts.param2_bits {
        config.param2_length = v;
    }
    if let Some(v) = opts.sequence_bits {
        config.sequence_length = v;
    }
    debug!(?config, "resolved schema config");
    Ok(config)
}

fn resolve_schema(opts: &SchemaOpts) -> Result<Schema, String> {
    resolve_config(opts)?.build().map_err(|e| e.to_string())
}

fn run_generate(
    schema: &Schema,
    param1: i128,
    param2: i128,
    sequence: i128,
    date: Option<DateTime<Utc>>,
) -> Result<(), String> {
    let param1 = checked_field(schema, Segment::Param1, param1).map_err(|e| e.to_string())?;
    let param2 = checked_field(schema, Segment::Param2, param2).map_err(|e| e.to_string())?;
    let sequence = checked_field(schema, Segment::Sequence, sequence).map_err(|e| e.to_string())?;

    let id = pack(schema, date, param1, param2, sequence).map_err(|e| e.to_string())?;
    println!("{id}");
    Ok(())
}

/// JSON form of a parsed snowflake. The id is a string so that consumers
/// limited to 53-bit integers keep every digit.
fn parse_payload(id: u64, parts: &SnowflakeParts) -> Value {
    json!({
        "id": id.to_string(),
        "timestamp": parts.timestamp.to_rfc3339(),
        "timestamp_ms": parts.timestamp_ms(),
        "param1": parts.param1,
        "param2": parts.param2,
        "sequence": parts.sequence,
    })
}

fn layout_payload(schema: &Schema) -> Value {
    json!({
        "epoch": schema.epoch(),
        "epoch_ms": schema.epoch_ms(),
        "latest": schema.latest_timestamp().map(|t| t.to_rfc3339()),
        "segments": schema.layout(),
    })
}

fn run_parse(schema: &Schema, raw: &str, json_out: bool) -> Result<(), String> {
    let id = parse_value(raw).map_err(|e| e.to_string())?;
    let parts = unpack(schema, id).map_err(|e| e.to_string())?;

    if json_out {
        let payload = parse_payload(id, &parts);
        println!(
            "{}",
            serde_json::to_string(&payload).map_err(|e| e.to_string())?
        );
    } else {
        println!("id={id}");
        println!("timestamp={}", parts.timestamp.to_rfc3339());
        println!("param1={}", parts.param1);
        println!("param2={}", parts.param2);
        println!("sequence={}", parts.sequence);
    }
    Ok(())
}

fn run_layout(schema: &Schema, json_out: bool) -> Result<(), String> {
    let layout = schema.layout();

    if json_out {
        let payload = layout_payload(schema);
        println!(
            "{}",
            serde_json::to_string(&payload).map_err(|e| e.to_string())?
        );
    } else {
        println!("epoch={} ({}ms)", schema.epoch(), schema.epoch_ms());
        for seg in layout.iter().filter(|s| s.width > 0) {
            println!(
                "{:<12} bits {:>2}..{:<2} width={:<2} max={}",
                seg.segment.as_str(),
                seg.shift + seg.width - 1,
                seg.shift,
                seg.width,
                seg.mask
            );
        }
    }
    Ok(())
}

fn run_config(opts: &SchemaOpts) -> Result<(), String> {
    let config = resolve_config(opts)?;
    config.build().map_err(|e| e.to_string())?;
    println!("{}", config.to_json().map_err(|e| e.to_string())?);
    Ok(())
}

fn run_healthcheck(schema: &Schema, json_out: bool) -> Result<(), String> {
    let date = Utc::now();
    let param1 = schema.max_param1();
    let param2 = schema.max_param2();
    let sequence = schema.max_sequence();

    let sample = pack(schema, Some(date), param1, param2, sequence).map_err(|e| e.to_string())?;
    let parts = unpack(schema, sample).map_err(|e| e.to_string())?;
    let ok = parts.timestamp_ms() == date.timestamp_millis()
        && parts.param1 == param1
        && parts.param2 == param2
        && parts.sequence == sequence;

    if json_out {
        let payload = json!({
            "ok": ok,
            "epoch": schema.epoch(),
            "sample_id": sample.to_string(),
        });
        println!(
            "{}",
            serde_json::to_string(&payload).map_err(|e| e.to_string())?
        );
    } else {
        println!("ok={ok} epoch={} sample={sample}", schema.epoch());
    }

    if ok {
        Ok(())
    } else {
        Err("healthcheck failed".to_string())
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let opts = &cli.schema;
    match cli.command {
        Command::Generate {
            param1,
            param2,
            sequence,
            date,
        } => run_generate(&resolve_schema(opts)?, param1, param2, sequence, date),
        Command::Parse { id, json } => run_parse(&resolve_schema(opts)?, &id, json),
        Command::Layout { json } => run_layout(&resolve_schema(opts)?, json),
        Command::Healthcheck { json } => run_healthcheck(&resolve_schema(opts)?, json),
        Command::Config => run_config(opts),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
