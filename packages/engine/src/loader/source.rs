//! JSON Lines row source.
//!
//! One JSON object per line. Scalar values become strings, nulls are dropped,
//! and nested arrays or objects are kept as their JSON text. A line that is
//! not a JSON object surfaces as [`RowError::Malformed`] so the loader can
//! skip and count it. So does a line that is not valid UTF-8; any other
//! read failure ends the stream after being reported once.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{LoadError, Row, RowError};

/// Streaming reader over a `.jsonl` file.
pub struct JsonLinesSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line: usize,
    exhausted: bool,
}

impl JsonLinesSource {
    /// Opens `path`. A file that does not exist yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Source`] for any other I/O failure.
    pub fn open(path: impl AsRef<Path>) -> Result<Option<Self>, LoadError> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => Ok(Some(Self {
                path: path.to_path_buf(),
                lines: BufReader::new(file).lines(),
                line: 0,
                exhausted: false,
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LoadError::Source {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for JsonLinesSource {
    type Item = Result<Row, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        loop {
            let line = self.lines.next()?;
            self.line += 1;
            let text = match line {
                Ok(text) => text,
                Err(err) => {
                    if err.kind() != io::ErrorKind::InvalidData {
                        self.exhausted = true;
                        tracing::warn!(path = %self.path.display(), line = self.line, %err, "source read failed");
                    }
                    return Some(Err(RowError::Malformed(format!(
                        "line {}: read failed: {err}",
                        self.line
                    ))));
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(parse_line(&text).map_err(|reason| {
                RowError::Malformed(format!("line {}: {reason}", self.line))
            }));
        }
    }
}

fn parse_line(text: &str) -> Result<Row, String> {
    let value: Value = serde_json::from_str(text).map_err(|err| err.to_string())?;
    let Value::Object(object) = value else {
        return Err("expected a JSON object".to_string());
    };
    Ok(object
        .into_iter()
        .filter_map(|(name, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
            };
            Some((name, text))
        })
        .collect())
}
