use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tilectl::simulator::config::{load_and_merge_configs, CliOverrides};
use tilectl::simulator::run_simulation;
use tilectl::simulator::utils::log::init_log_quiet;

/// tilectl - cycle-level model of a tiled matmul phase controller
#[derive(Parser, Debug)]
#[command(name = "tilectl")]
#[command(version)]
#[command(about = "Phase controller and port width adapter simulator", long_about = None)]
struct Args {
  /// Configuration file merged over the built-in defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<String>,

  /// Enable step mode (interactive stepping)
  #[arg(short, long)]
  step: bool,

  /// Quiet mode (warnings and errors only)
  #[arg(short, long)]
  quiet: bool,

  /// Output trace file path (JSON lines, one object per cycle)
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Run mode: cycle or event
  #[arg(short, long, value_name = "MODE")]
  mode: Option<String>,

  #[arg(long, value_name = "N")]
  tile_height: Option<u32>,

  #[arg(long, value_name = "N")]
  rows_per_iter: Option<u32>,

  #[arg(long, value_name = "N")]
  tot_stores: Option<u32>,

  /// Give up after N cycles
  #[arg(long, value_name = "N")]
  max_cycles: Option<u64>,

  /// Start the job without a register write
  #[arg(long)]
  test_mode: bool,
}

fn main() -> std::io::Result<ExitCode> {
  let args = Args::parse();
  init_log_quiet(args.quiet);

  let cli = CliOverrides {
    quiet: args.quiet,
    step: args.step,
    test_mode: args.test_mode,
    trace_file: args.trace_file,
    run_mode: args.mode,
    tile_height: args.tile_height,
    rows_per_iter: args.rows_per_iter,
    tot_stores: args.tot_stores,
    max_cycles: args.max_cycles,
  };

  let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
  let config = load_and_merge_configs(args.config.as_deref(), &root, &cli)?;

  let report = run_simulation(&config)?;
  if report.stalled {
    log::error!("job stalled after {} cycles", report.cycles);
    return Ok(ExitCode::FAILURE);
  }
  Ok(ExitCode::SUCCESS)
}
