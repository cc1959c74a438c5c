//! CLI for flashring queue files.
//!
//! Provides commands for inspecting, editing, and benchmarking queue files.

use std::error::Error;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use flashring::{OpenFlags, Queue, QueueConfig, Record, SeqWidth, SlotLayout};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// flashring: persistent circular record queue CLI.
#[derive(Parser)]
#[command(name = "flashring", version, about)]
struct Cli {
    /// Number of slots in the queue file.
    #[arg(long, global = true, default_value = "100")]
    capacity: u32,

    /// Load the queue configuration from a JSON file instead of `--capacity`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Width of the per-slot sequence number.
    #[arg(long, global = true)]
    seq_width: Option<SeqWidthArg>,

    /// Record type stored in each slot.
    #[arg(long, global = true, default_value = "i32")]
    record: RecordKind,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Display the file layout, recovered state, and slot seqs.
    Info {
        /// Path to the queue file.
        file: PathBuf,
    },

    /// Append records, creating the file if needed.
    Push {
        /// Path to the queue file.
        file: PathBuf,

        /// Values to push, oldest first.
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<String>,

        /// Fail instead of overwriting the oldest record when full.
        #[arg(long)]
        no_circular: bool,
    },

    /// Remove and print the oldest records.
    Pop {
        /// Path to the queue file.
        file: PathBuf,

        /// Maximum number of records to pop.
        #[arg(long, default_value = "1")]
        count: u32,
    },

    /// Print records without removing them.
    Peek {
        /// Path to the queue file.
        file: PathBuf,

        /// Position from the oldest record; all records when omitted.
        #[arg(long)]
        index: Option<u32>,
    },

    /// Print every physical slot, active or not.
    Dump {
        /// Path to the queue file.
        file: PathBuf,
    },

    /// Remove all records.
    Clear {
        /// Path to the queue file.
        file: PathBuf,
    },

    /// Run a push/pop throughput benchmark on a temporary file.
    Bench {
        /// Number of records to push and pop.
        #[arg(long, default_value = "10000")]
        records: u64,
    },
}

/// Seq width accepted on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum SeqWidthArg {
    /// Two-byte seqs.
    U16,
    /// Four-byte seqs.
    U32,
}

impl From<SeqWidthArg> for SeqWidth {
    fn from(arg: SeqWidthArg) -> Self {
        match arg {
            SeqWidthArg::U16 => SeqWidth::U16,
            SeqWidthArg::U32 => SeqWidth::U32,
        }
    }
}

/// Record types the CLI can read and write.
#[derive(Clone, Copy, ValueEnum)]
enum RecordKind {
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit float.
    F64,
}

/// Output format for command results.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// JSON document.
    Json,
}

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.record {
        RecordKind::I32 => run::<i32>(&cli),
        RecordKind::I64 => run::<i64>(&cli),
        RecordKind::U32 => run::<u32>(&cli),
        RecordKind::F64 => run::<f64>(&cli),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Dispatches a command for records of type `T`.
fn run<T>(cli: &Cli) -> CliResult<()>
where
    T: Record + FromStr + Display + Serialize,
    <T as FromStr>::Err: Error + 'static,
{
    let config = queue_config(cli)?;
    debug!(capacity = config.capacity, seq_width = %config.seq_width, "queue configuration");

    match &cli.command {
        Commands::Info { file } => cmd_info::<T>(config, file, cli.format),
        Commands::Push {
            file,
            values,
            no_circular,
        } => cmd_push::<T>(config, file, values, !no_circular, cli.format),
        Commands::Pop { file, count } => cmd_pop::<T>(config, file, *count, cli.format),
        Commands::Peek { file, index } => cmd_peek::<T>(config, file, *index, cli.format),
        Commands::Dump { file } => cmd_dump::<T>(config, file, cli.format),
        Commands::Clear { file } => cmd_clear::<T>(config, file),
        Commands::Bench { records } => cmd_bench(config, *records),
    }
}

/// Builds the queue configuration from `--config` or `--capacity`, then
/// applies `--seq-width`.
fn queue_config(cli: &Cli) -> CliResult<QueueConfig> {
    let mut config = match &cli.config {
        Some(path) => QueueConfig::load(path)?,
        None => QueueConfig::new(cli.capacity)?,
    };
    if let Some(width) = cli.seq_width {
        config = config.with_seq_width(width.into());
    }
    config.validate()?;
    Ok(config)
}

/// Opens a queue file, creating it if missing.
fn open_queue<T: Record>(config: QueueConfig, file: &Path, flags: OpenFlags) -> CliResult<Queue<T>> {
    let mut queue = Queue::new(config)?;
    queue.open(file, flags)?;
    Ok(queue)
}

/// Opens a queue file that must already exist and match the configured
/// layout.
///
/// A wrong `--capacity`, `--seq-width`, or `--record` only shows up as a
/// size mismatch, which `open` would otherwise treat as a short file and reset.
fn open_existing<T: Record>(config: QueueConfig, file: &Path) -> CliResult<Queue<T>> {
    if !file.exists() {
        return Err(format!("No queue file at '{}'", file.display()).into());
    }

    let expected = SlotLayout::for_record::<T>(config.capacity, config.seq_width).file_size();
    let actual = std::fs::metadata(file)?.len();
    if actual != expected {
        return Err(format!(
            "Queue file '{}' is {actual} bytes, layout expects {expected} \
             (check --capacity, --seq-width, and --record)",
            file.display()
        )
        .into());
    }

    open_queue(config, file, OpenFlags::default())
}

/// Parses command-line values into records.
fn parse_values<T>(values: &[String]) -> CliResult<Vec<T>>
where
    T: FromStr,
    <T as FromStr>::Err: Error + 'static,
{
    values
        .iter()
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| format!("Invalid value '{v}': {e}").into())
        })
        .collect()
}

/// Prints records one per line, or as a JSON array.
fn print_records<T: Display + Serialize>(records: &[T], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Text => {
            for record in records {
                println!("{record}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
    }
    Ok(())
}

/// Implements `flashring info <file>`.
fn cmd_info<T: Record>(config: QueueConfig, file: &Path, format: OutputFormat) -> CliResult<()> {
    let mut queue = open_existing::<T>(config, file)?;
    let layout = *queue.layout();
    let state = queue.state();
    let seqs = queue.slot_seqs()?;

    match format {
        OutputFormat::Text => {
            println!("Queue: {}", file.display());
            println!();
            println!("Layout:");
            println!("  Capacity: {} slots", layout.capacity());
            println!("  Record size: {} bytes", layout.record_size());
            println!("  Seq width: {}", layout.seq_width());
            println!("  Slot size: {} bytes", layout.slot_size());
            println!("  File size: {} bytes", layout.file_size());
            println!();
            println!("State:");
            println!("  Records: {}/{}", state.count, layout.capacity());
            println!("  Head: slot {}", layout.slot_index(state.head));
            println!("  Tail: slot {}", layout.slot_index(state.tail));
            println!("  Last seq: {}", state.next_seq);
            println!();
            let seqs: Vec<_> = seqs.iter().map(u32::to_string).collect();
            println!("Seqs: [{}]", seqs.join(", "));
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": file.display().to_string(),
                "layout": layout,
                "state": state,
                "seqs": seqs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    queue.close()?;
    Ok(())
}

/// Implements `flashring push <file> <values>...`.
fn cmd_push<T>(
    config: QueueConfig,
    file: &Path,
    values: &[String],
    circular: bool,
    format: OutputFormat,
) -> CliResult<()>
where
    T: Record + FromStr,
    <T as FromStr>::Err: Error + 'static,
{
    let records = parse_values::<T>(values)?;
    let mut queue = open_queue::<T>(config, file, OpenFlags::default().circular(circular))?;

    let mut pushed = 0usize;
    for record in records {
        queue.push(record)?;
        pushed += 1;
    }

    match format {
        OutputFormat::Text => println!("Pushed {pushed} records ({} queued)", queue.size()),
        OutputFormat::Json => {
            let output = serde_json::json!({ "pushed": pushed, "size": queue.size() });
            println!("{output}");
        }
    }

    queue.close()?;
    Ok(())
}

/// Implements `flashring pop <file>`.
fn cmd_pop<T: Record + Display + Serialize>(
    config: QueueConfig,
    file: &Path,
    count: u32,
    format: OutputFormat,
) -> CliResult<()> {
    let mut queue = open_existing::<T>(config, file)?;

    let n = count.min(queue.size());
    let mut records = Vec::with_capacity(n as usize);
    for _ in 0..n {
        records.push(queue.pop()?);
    }

    print_records(&records, format)?;
    queue.close()?;
    Ok(())
}

/// Implements `flashring peek <file>`.
fn cmd_peek<T: Record + Display + Serialize>(
    config: QueueConfig,
    file: &Path,
    index: Option<u32>,
    format: OutputFormat,
) -> CliResult<()> {
    let mut queue = open_existing::<T>(config, file)?;

    let records = match index {
        Some(index) => vec![queue.peek(index)?],
        None => queue.peek_all()?,
    };

    print_records(&records, format)?;
    queue.close()?;
    Ok(())
}

/// One physical slot as shown by `dump`.
#[derive(Serialize)]
struct SlotEntry<T> {
    slot: u32,
    seq: u32,
    value: Option<T>,
}

/// Implements `flashring dump <file>`.
fn cmd_dump<T: Record + Display + Serialize>(
    config: QueueConfig,
    file: &Path,
    format: OutputFormat,
) -> CliResult<()> {
    let mut queue = open_existing::<T>(config, file)?;
    let seqs = queue.slot_seqs()?;

    let mut slots = Vec::with_capacity(seqs.len());
    for (slot, seq) in (0u32..).zip(seqs) {
        slots.push(SlotEntry {
            slot,
            seq,
            value: queue.get_raw(slot)?,
        });
    }

    match format {
        OutputFormat::Text => {
            println!("slot,seq,value");
            for entry in &slots {
                match &entry.value {
                    Some(value) => println!("{},{},{value}", entry.slot, entry.seq),
                    None => println!("{},{},-", entry.slot, entry.seq),
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&slots)?),
    }

    queue.close()?;
    Ok(())
}

/// Implements `flashring clear <file>`.
fn cmd_clear<T: Record>(config: QueueConfig, file: &Path) -> CliResult<()> {
    let mut queue = open_queue::<T>(config, file, OpenFlags::default().reset(true))?;
    println!("Cleared {} ({} slots)", file.display(), queue.capacity());
    queue.close()?;
    Ok(())
}

/// Implements `flashring bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(config: QueueConfig, records: u64) -> CliResult<()> {
    println!("flashring push/pop benchmark");
    println!("  Records: {records}");
    println!("  Capacity: {}", config.capacity);
    println!("  Seq width: {}", config.seq_width);
    println!();

    let temp_dir = tempfile::tempdir()?;
    let path = temp_dir.path().join("bench.bin");
    let mut queue = open_queue::<u64>(config, &path, OpenFlags::default().reset(true))?;

    let start = Instant::now();
    for value in 0..records {
        queue.push(value)?;
    }
    let push_elapsed = start.elapsed();

    let remaining = queue.size();
    let start = Instant::now();
    while !queue.is_empty() {
        queue.pop()?;
    }
    let pop_elapsed = start.elapsed();

    queue.close()?;

    let push_ns = push_elapsed.as_nanos() as f64 / records.max(1) as f64;
    let pop_ns = pop_elapsed.as_nanos() as f64 / f64::from(remaining.max(1));

    println!("Results:");
    println!("  Push: {records} records in {push_elapsed:.3?} ({push_ns:.0} ns/push)");
    println!("  Pop: {remaining} records in {pop_elapsed:.3?} ({pop_ns:.0} ns/pop)");

    Ok(())
}
