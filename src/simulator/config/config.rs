use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::bench::BenchConfig;

/// Largest value a 16-bit register field can hold
const FIELD_MAX: u32 = 0xFFFF;

/// Array geometry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerSection {
  #[serde(default = "default_tile_height")]
  pub tile_height: u32,
}

fn default_tile_height() -> u32 {
  4
}

impl Default for ControllerSection {
  fn default() -> Self {
    Self {
      tile_height: default_tile_height(),
    }
  }
}

/// Values the host programs into the register file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobSection {
  #[serde(default = "default_rows_per_iter")]
  pub rows_per_iter: u32,
  #[serde(default = "default_tot_stores")]
  pub tot_stores: u32,
  #[serde(default)]
  pub test_mode: bool,
}

fn default_rows_per_iter() -> u32 {
  4
}

fn default_tot_stores() -> u32 {
  1
}

impl Default for JobSection {
  fn default() -> Self {
    Self {
      rows_per_iter: default_rows_per_iter(),
      tot_stores: default_tot_stores(),
      test_mode: false,
    }
  }
}

/// Collaborator timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchSection {
  #[serde(default = "default_interval")]
  pub row_interval: u32,
  #[serde(default = "default_interval")]
  pub pipe_interval: u32,
  #[serde(default = "default_interval")]
  pub store_interval: u32,
  #[serde(default = "default_zbuf_depth")]
  pub zbuf_depth: u32,
  #[serde(default = "default_max_cycles")]
  pub max_cycles: u64,
  #[serde(default)]
  pub clear_at: Option<u64>,
}

fn default_interval() -> u32 {
  1
}

fn default_zbuf_depth() -> u32 {
  4
}

fn default_max_cycles() -> u64 {
  10_000
}

impl Default for BenchSection {
  fn default() -> Self {
    Self {
      row_interval: default_interval(),
      pipe_interval: default_interval(),
      store_interval: default_interval(),
      zbuf_depth: default_zbuf_depth(),
      max_cycles: default_max_cycles(),
      clear_at: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default = "default_run_mode")]
  pub run_mode: String,
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  #[serde(default)]
  pub trace_file: String,
}

fn default_run_mode() -> String {
  "cycle".to_string()
}

impl Default for SimulationSection {
  fn default() -> Self {
    Self {
      run_mode: default_run_mode(),
      quiet: false,
      step_mode: false,
      trace_file: String::new(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub controller: ControllerSection,
  #[serde(default)]
  pub job: JobSection,
  #[serde(default)]
  pub bench: BenchSection,
  #[serde(default)]
  pub simulation: SimulationSection,
}

impl AppConfig {
  pub fn bench_config(&self) -> BenchConfig {
    BenchConfig {
      tile_height: self.controller.tile_height,
      rows_per_iter: self.job.rows_per_iter,
      tot_stores: self.job.tot_stores,
      test_mode: self.job.test_mode,
      row_interval: self.bench.row_interval,
      pipe_interval: self.bench.pipe_interval,
      store_interval: self.bench.store_interval,
      zbuf_depth: self.bench.zbuf_depth,
      max_cycles: self.bench.max_cycles,
      clear_at: self.bench.clear_at,
    }
  }
}

/// CLI values that take precedence over every config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub quiet: bool,
  pub step: bool,
  pub test_mode: bool,
  pub trace_file: Option<String>,
  pub run_mode: Option<String>,
  pub tile_height: Option<u32>,
  pub rows_per_iter: Option<u32>,
  pub tot_stores: Option<u32>,
  pub max_cycles: Option<u64>,
}

/// Load default.toml shipped with the crate
pub fn load_default_config() -> io::Result<AppConfig> {
  let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
  let config_path = manifest_dir
    .join("src")
    .join("simulator")
    .join("config")
    .join("default.toml");

  load_config_file(&config_path)
}

pub fn load_config_file(path: &Path) -> io::Result<AppConfig> {
  let content = fs::read_to_string(path)
    .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("cannot read config file {:?}: {}", path, e)))?;

  parse_config(&content)
}

pub fn parse_config(content: &str) -> io::Result<AppConfig> {
  toml::from_str::<AppConfig>(content)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("failed to parse TOML config: {}", e)))
}

/// Merge two configs, sections present in the override file win
///
/// Sections parse with their defaults filled in, so the override is read
/// back as a raw table to tell an explicit value from a missing one.
pub fn merge_config(base: AppConfig, override_src: &str) -> io::Result<AppConfig> {
  let mut merged = toml::Value::try_from(&base)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("failed to encode config: {}", e)))?;
  let over: toml::Value = toml::from_str(override_src)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("failed to parse TOML config: {}", e)))?;

  if let (Some(dst), Some(src)) = (merged.as_table_mut(), over.as_table()) {
    for (section, values) in src {
      match (dst.get_mut(section).and_then(|v| v.as_table_mut()), values.as_table()) {
        (Some(dst_section), Some(src_section)) => {
          for (key, value) in src_section {
            dst_section.insert(key.clone(), value.clone());
          }
        },
        _ => {
          dst.insert(section.clone(), values.clone());
        },
      }
    }
  }

  merged
    .try_into::<AppConfig>()
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid merged config: {}", e)))
}

pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides) {
  if cli.quiet {
    config.simulation.quiet = true;
  }
  if cli.step {
    config.simulation.step_mode = true;
  }
  if cli.test_mode {
    config.job.test_mode = true;
  }
  if let Some(file) = &cli.trace_file {
    config.simulation.trace_file = file.clone();
  }
  if let Some(mode) = &cli.run_mode {
    config.simulation.run_mode = mode.clone();
  }
  if let Some(h) = cli.tile_height {
    config.controller.tile_height = h;
  }
  if let Some(r) = cli.rows_per_iter {
    config.job.rows_per_iter = r;
  }
  if let Some(t) = cli.tot_stores {
    config.job.tot_stores = t;
  }
  if let Some(n) = cli.max_cycles {
    config.bench.max_cycles = n;
  }
}

fn invalid(msg: String) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, msg)
}

pub fn validate_config(config: &AppConfig) -> io::Result<()> {
  let h = config.controller.tile_height;
  if h < 2 {
    return Err(invalid(format!("tile_height must be at least 2, got {}", h)));
  }
  if h > FIELD_MAX {
    return Err(invalid(format!("tile_height {} does not fit a 16-bit field", h)));
  }

  for (name, value) in [
    ("rows_per_iter", config.job.rows_per_iter),
    ("tot_stores", config.job.tot_stores),
  ] {
    if value == 0 {
      return Err(invalid(format!("{} cannot be zero", name)));
    }
    if value > FIELD_MAX {
      return Err(invalid(format!("{} {} does not fit a 16-bit field", name, value)));
    }
  }

  for (name, value) in [
    ("row_interval", config.bench.row_interval),
    ("pipe_interval", config.bench.pipe_interval),
    ("store_interval", config.bench.store_interval),
    ("zbuf_depth", config.bench.zbuf_depth),
  ] {
    if value == 0 {
      return Err(invalid(format!("{} cannot be zero", name)));
    }
  }

  match config.simulation.run_mode.to_lowercase().as_str() {
    "cycle" | "event" => {},
    other => return Err(invalid(format!("unsupported run mode: {}", other))),
  }

  Ok(())
}

/// Resolve a relative trace path against `root`
pub fn resolve_paths(config: &mut AppConfig, root: &Path) {
  let trace = &config.simulation.trace_file;
  if !trace.is_empty() && Path::new(trace).is_relative() {
    config.simulation.trace_file = root.join(trace).to_string_lossy().to_string();
  }
}

/// Flow:
/// 1. default.toml
/// 2. merge the user file if given
/// 3. CLI overrides
/// 4. resolve relative paths
/// 5. validate
pub fn load_and_merge_configs(custom_config_path: Option<&str>, root: &Path, cli: &CliOverrides) -> io::Result<AppConfig> {
  let mut config = load_default_config()?;

  if let Some(custom_path) = custom_config_path {
    let custom_path_buf = PathBuf::from(custom_path);
    let custom_path_abs = if custom_path_buf.is_absolute() {
      custom_path_buf
    } else {
      root.join(&custom_path_buf)
    };

    let content = fs::read_to_string(&custom_path_abs).map_err(|e| {
      io::Error::new(
        io::ErrorKind::NotFound,
        format!("cannot read config file {:?}: {}", custom_path_abs, e),
      )
    })?;
    config = merge_config(config, &content)?;
  }

  apply_cli_overrides(&mut config, cli);
  resolve_paths(&mut config, root);
  validate_config(&config)?;

  Ok(config)
}
