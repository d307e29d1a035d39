use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Page separator written by `pdftotext` and most PDF-to-text tools.
const PAGE_BREAK: char = '\x0c';

/// A block of text could not be produced.
#[derive(Debug, thiserror::Error)]
#[error("text source unavailable: {}: {source}", .path.display())]
pub struct SourceUnavailable {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Supplies raw text blocks one at a time; `None` ends the sequence.
pub trait TextSource {
    fn next_block(&mut self) -> Option<Result<String, SourceUnavailable>>;
}

impl<I> TextSource for I
where
    I: Iterator<Item = Result<String, SourceUnavailable>>,
{
    fn next_block(&mut self) -> Option<Result<String, SourceUnavailable>> {
        self.next()
    }
}

/// Reads text files page by page.
///
/// Files split into blocks on form feeds. Directories contribute their
/// `*.txt` files in name order. `-` reads stdin.
#[derive(Debug, Default)]
pub struct FileSource {
    paths: VecDeque<PathBuf>,
    pages: VecDeque<String>,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        FileSource {
            paths: paths.into_iter().map(Into::into).collect(),
            pages: VecDeque::new(),
        }
    }

    fn read_path(&mut self, path: PathBuf) -> Result<(), SourceUnavailable> {
        let unavailable = |source| SourceUnavailable {
            path: path.clone(),
            source,
        };

        if path.as_os_str() == "-" {
            let mut raw = Vec::new();
            io::stdin().read_to_end(&mut raw).map_err(unavailable)?;
            self.push_pages(&String::from_utf8_lossy(&raw));
            return Ok(());
        }

        if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(&path)
                .map_err(unavailable)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
                .collect();
            files.sort();
            debug!("{}: {} text files", path.display(), files.len());
            for file in files.into_iter().rev() {
                self.paths.push_front(file);
            }
            return Ok(());
        }

        let raw = fs::read(&path).map_err(unavailable)?;
        let before = self.pages.len();
        self.push_pages(&String::from_utf8_lossy(&raw));
        debug!("{}: {} pages", path.display(), self.pages.len() - before);
        Ok(())
    }

    fn push_pages(&mut self, text: &str) {
        self.pages.extend(
            text.split(PAGE_BREAK)
                .filter(|page| !page.trim().is_empty())
                .map(str::to_string),
        );
    }
}

impl Iterator for FileSource {
    type Item = Result<String, SourceUnavailable>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(page) = self.pages.pop_front() {
                return Some(Ok(page));
            }
            let path = self.paths.pop_front()?;
            if let Err(e) = self.read_path(path) {
                return Some(Err(e));
            }
        }
    }
}

/// Receives result entries one line at a time, in final order.
pub trait LineSink {
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

impl LineSink for Vec<String> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Line sink over any writer (stdout, a file).
pub struct WriterSink<W: Write> {
    inner: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        WriterSink { inner }
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> LineSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.inner, "{}", line)
    }
}

pub fn write_names(sink: &mut impl LineSink, names: &[String]) -> io::Result<()> {
    for name in names {
        sink.write_line(name)?;
    }
    Ok(())
}

/// Trimmed, non-empty lines of a text file.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

// ── Tests ──
