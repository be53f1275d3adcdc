//! Transposes per-sample call arrays into position rows.
//!
//! The store is read one window of at most `chunk_size` positions at a time.
//! Each window is an `ndarray` matrix with one row per position and one
//! column per array, so at most one window of calls is held in memory.
use crate::error::{Error, Result};
use crate::progress::{Observer, Progress};
use crate::store::ArrayStore;
use crate::table::{Row, TableHeader, TableWriter};
use crate::{Position, DEFAULT_CHUNK_SIZE};
use ndarray::{Array2, ArrayView1};
use std::io::Write;

pub struct StreamerBuilder {
    chunk_size: usize,
    reference: Option<String>,
}

impl Default for StreamerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamerBuilder {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            reference: None,
        }
    }

    /// Maximum number of positions read per window.
    pub fn chunk_size(&mut self, chunk_size: usize) -> &mut Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Names the reference array. Without one the last key in sorted order
    /// is the reference.
    pub fn reference(&mut self, reference: &str) -> &mut Self {
        self.reference = Some(reference.to_owned());
        self
    }

    /// Resolves the column order and checks that every array has the same
    /// length.
    pub fn build<S: ArrayStore>(&self, store: S) -> Result<MatrixStreamer<S>> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }

        let mut columns = store.list_keys()?;
        columns.sort();
        columns.dedup();
        if columns.is_empty() {
            return Err(Error::EmptyStore);
        }

        if let Some(reference) = &self.reference {
            let idx = columns
                .iter()
                .position(|key| key == reference)
                .ok_or_else(|| Error::missing_key(reference.as_str()))?;
            let reference = columns.remove(idx);
            columns.push(reference);
        }

        let positions = store.len(&columns[0])?;
        for key in columns.iter().skip(1) {
            let found = store.len(key)?;
            if found != positions {
                return Err(Error::ShapeMismatch {
                    key: key.clone(),
                    expected: positions,
                    found,
                });
            }
        }

        Ok(MatrixStreamer {
            store,
            columns,
            positions,
            chunk_size: self.chunk_size,
        })
    }
}

pub struct MatrixStreamer<S> {
    store: S,
    columns: Vec<String>,
    positions: usize,
    chunk_size: usize,
}

impl<S: ArrayStore> MatrixStreamer<S> {
    /// Sample columns in sorted order followed by the reference column.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn header(&self) -> TableHeader {
        let mut samples = self.columns.clone();
        let reference = samples.pop().unwrap_or_default();
        TableHeader { samples, reference }
    }

    /// Number of positions in every array.
    pub fn positions(&self) -> usize {
        self.positions
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn windows(&self) -> Windows<'_, S> {
        Windows {
            streamer: self,
            start: 0,
            failed: false,
        }
    }

    fn read_window(&self, start: usize, end: usize) -> Result<Window> {
        let slices = self
            .columns
            .iter()
            .map(|key| self.store.read_slice(key, start, end))
            .collect::<Result<Vec<_>>>()?;
        let calls = Array2::from_shape_fn((end - start, slices.len()), |(i, j)| slices[j][i]);
        Ok(Window { start, calls })
    }

    pub fn started(&self) -> Progress {
        Progress::StreamStarted {
            columns: self.columns.len(),
            positions: self.positions,
            chunk_size: self.chunk_size,
        }
    }

    /// Writes the header and every position row to `table`.
    pub fn write_table<W: Write>(
        &self,
        table: &mut TableWriter<W>,
        observer: &mut dyn Observer,
    ) -> Result<()> {
        observer.observe(&self.started());
        table.write_header(&self.columns)?;
        for window in self.windows() {
            let window = window?;
            for (position, calls) in window.positions() {
                table.write_row(position, calls)?;
            }
            observer.observe(&window.progress());
        }
        Ok(())
    }
}

/// Positions `start + 1 ..= start + calls.nrows()`, one row each.
#[derive(Debug, Clone)]
pub struct Window {
    pub start: usize,
    pub calls: Array2<u8>,
}

impl Window {
    pub fn end(&self) -> usize {
        self.start + self.calls.nrows()
    }

    /// Each row with its 1-based position.
    pub fn positions(&self) -> impl Iterator<Item = (Position, ArrayView1<'_, u8>)> {
        let start = self.start as Position;
        self.calls
            .outer_iter()
            .enumerate()
            .map(move |(i, calls)| (start + i as Position + 1, calls))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        self.positions()
            .map(|(position, calls)| Row::from_bytes(position, calls.iter().copied()))
    }

    pub fn progress(&self) -> Progress {
        Progress::WindowWritten {
            start: self.start as Position,
            end: self.end() as Position,
        }
    }
}

pub struct Windows<'a, S> {
    streamer: &'a MatrixStreamer<S>,
    start: usize,
    failed: bool,
}

impl<'a, S: ArrayStore> Iterator for Windows<'a, S> {
    type Item = Result<Window>;

    fn next(&mut self) -> Option<Result<Window>> {
        if self.failed || self.start >= self.streamer.positions {
            return None;
        }
        let end = (self.start + self.streamer.chunk_size).min(self.streamer.positions);
        let window = self.streamer.read_window(self.start, end);
        self.failed = window.is_err();
        self.start = end;
        Some(window)
    }
}
