//! CLI front end for the pipeline core.
//!
//! Thin command-line and configuration parsing, deliberately out of the
//! core's scope (`spec.md` §1): this binary only loads a program image and
//! an optional JSON [`Config`], drives [`Controller::run_cycles`]/
//! [`Controller::run_till_halt`], and prints or serializes the results.
//! Grounded on the teacher's `crates/cli/src/main.rs` `clap` derive layout.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rv5_core::pipeline::{Controller, RunOutcome, TickEvent};
use rv5_core::snapshot::{JsonLinesLogger, Snapshot, SnapshotLogger};
use rv5_core::Config;

#[derive(Parser, Debug)]
#[command(
    name = "rv5",
    author,
    version,
    about = "Cycle-accurate five-stage RISC-V pipeline simulator",
    long_about = "Runs a raw little-endian RV32I instruction image through the \
five-stage pipeline core and reports per-cycle snapshots and final statistics.\n\n\
Examples:\n  rv5 program.bin\n  rv5 program.bin --config cache.json --cycles 500\n  rv5 program.bin --trace --stats-json"
)]
struct Cli {
    /// Flat binary image of little-endian RV32I instruction words.
    program: PathBuf,

    /// Optional JSON configuration file (`Config`); unspecified fields
    /// fall back to the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of cycles to run; 0 (the default) means "until halt or error".
    #[arg(long, default_value_t = 0)]
    cycles: u64,

    /// Print a per-cycle pipeline diagram to stdout.
    #[arg(long)]
    trace: bool,

    /// Write the per-cycle snapshot stream as JSON Lines to this path.
    #[arg(long)]
    trace_json: Option<PathBuf>,

    /// Emit final statistics as JSON instead of the human-readable table.
    #[arg(long)]
    stats_json: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => {
            let text = fs::read_to_string(p)?;
            serde_json::from_str(&text)?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

fn stage_cell(label: &str, raw: u32, status: rv5_core::instr::Status) -> String {
    format!("[{label} {raw:#010x} {status:?}]")
}

fn print_diagram(snap: &Snapshot) {
    println!(
        "cycle {:>5}  [IF pc={:#010x} {:?}] {} {} {} {}",
        snap.cycle,
        snap.if_pc,
        snap.if_status,
        stage_cell("ID", snap.id_instr, snap.id_status),
        stage_cell("EX", snap.ex_instr, snap.ex_status),
        stage_cell("MEM", snap.mem_instr, snap.mem_status),
        stage_cell("WB", snap.wb_instr, snap.wb_status),
    );
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("error: failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };

    let program = match fs::read(&cli.program) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: failed to read {}: {err}", cli.program.display());
            return ExitCode::FAILURE;
        }
    };

    let mut controller = Controller::init(config, &program);

    let mut json_logger = match cli.trace_json.as_ref() {
        Some(p) => match fs::File::create(p) {
            Ok(f) => Some(JsonLinesLogger::new(f)),
            Err(err) => {
                eprintln!("error: failed to open trace-json output: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let limit = (cli.cycles != 0).then_some(cli.cycles);
    let outcome = run_and_trace(&mut controller, limit, cli.trace, json_logger.as_mut());

    let stats = controller.finalize();
    if cli.stats_json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error: failed to serialize stats: {err}"),
        }
    } else {
        stats.print();
    }

    match outcome {
        RunOutcome::Halted | RunOutcome::Continued => ExitCode::SUCCESS,
        RunOutcome::Exception(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

/// Drives `controller` for `limit` cycles (or until halt/error if `None`),
/// emitting a snapshot through the requested sinks after every tick.
fn run_and_trace(
    controller: &mut Controller,
    limit: Option<u64>,
    trace: bool,
    mut json_logger: Option<&mut JsonLinesLogger<fs::File>>,
) -> RunOutcome {
    let mut remaining = limit;
    loop {
        if remaining == Some(0) {
            return RunOutcome::Continued;
        }
        let event = controller.tick();
        let snap = controller.snapshot();
        if trace {
            print_diagram(&snap);
        }
        if let Some(logger) = json_logger.as_deref_mut() {
            logger.record(&snap);
        }
        if let Some(n) = remaining.as_mut() {
            *n -= 1;
        }
        match event {
            TickEvent::Halted => return RunOutcome::Halted,
            TickEvent::Exception(err) => return RunOutcome::Exception(err),
            TickEvent::Normal | TickEvent::CacheStall => {}
        }
    }
}
