//! Newline-delimited append-only files.
//!
//! Every append is written, flushed and fsync'd before returning. Readers treat
//! a final line without its newline as a torn write and drop it; any other
//! malformed content is reported to the caller by the format-specific parser.
//! A writer cuts such a fragment off when it opens the file, so new lines never
//! land on the end of it.

use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct LineWriter {
    path: PathBuf,
    file: BufWriter<File>,
}

impl LineWriter {
    /// Open or create the file for appending. Missing parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let dropped = truncate_torn_tail(&path)?;
        if dropped > 0 {
            tracing::warn!("Dropped {} bytes of torn tail from {:?}", dropped, path);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            file: BufWriter::new(file),
        })
    }

    /// Append one line. Only returns Ok() after the line is durable.
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        debug_assert!(!line.contains('\n'));
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Cut a final line without its newline, so the next append starts a fresh
/// line. Returns the number of bytes removed.
fn truncate_torn_tail(path: &Path) -> Result<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let meta = file.metadata()?;
    let len = meta.len();
    if len == 0 || !meta.is_file() {
        return Ok(0);
    }

    let mut content = Vec::with_capacity(len as usize);
    file.read_to_end(&mut content)?;
    if content.last() == Some(&b'\n') {
        return Ok(0);
    }

    let keep = content
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i as u64 + 1)
        .unwrap_or(0);
    file.set_len(keep)?;
    file.seek(SeekFrom::Start(keep))?;
    file.sync_all()?;
    Ok(len - keep)
}

/// Complete lines of a file, with 1-based line numbers. A missing file reads as empty.
pub struct ReadLines {
    pub lines: Vec<(usize, String)>,
    pub torn_tail: bool,
}

pub fn read_lines(path: impl AsRef<Path>) -> Result<ReadLines> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ReadLines {
            lines: Vec::new(),
            torn_tail: false,
        });
    }

    let content = std::fs::read_to_string(path)?;
    let torn_tail = !content.is_empty() && !content.ends_with('\n');

    let mut raw: Vec<&str> = content.split('\n').collect();
    // split leaves either "" after the final newline or the torn fragment
    raw.pop();

    let lines = raw
        .into_iter()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r').to_string()))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    Ok(ReadLines { lines, torn_tail })
}
