use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Result, Write};
use std::path::Path;

/// JSON-lines trace, one object per record
pub struct TraceWriter<W: Write> {
  writer: W,
  lines: u64,
}

impl TraceWriter<BufWriter<File>> {
  pub fn create(path: &Path) -> Result<Self> {
    let file = File::create(path)
      .map_err(|e| io::Error::new(e.kind(), format!("cannot create trace file {:?}: {}", path, e)))?;
    Ok(Self::new(BufWriter::new(file)))
  }
}

impl<W: Write> TraceWriter<W> {
  pub fn new(writer: W) -> Self {
    Self { writer, lines: 0 }
  }

  pub fn write<T: Serialize>(&mut self, entry: &T) -> Result<()> {
    let line = serde_json::to_string(entry).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(self.writer, "{}", line)?;
    self.lines += 1;
    Ok(())
  }

  pub fn lines(&self) -> u64 {
    self.lines
  }

  pub fn flush(&mut self) -> Result<()> {
    self.writer.flush()
  }

  pub fn into_inner(self) -> W {
    self.writer
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_one_json_object_per_line() {
    let mut trace = TraceWriter::new(Vec::new());
    trace.write(&serde_json::json!({ "cycle": 0 })).unwrap();
    trace.write(&serde_json::json!({ "cycle": 1 })).unwrap();
    assert_eq!(trace.lines(), 2);
    let text = String::from_utf8(trace.into_inner()).unwrap();
    let cycles: Vec<u64> = text
      .lines()
      .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["cycle"].as_u64().unwrap())
      .collect();
    assert_eq!(cycles, vec![0, 1]);
  }
}
