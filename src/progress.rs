//! Progress events emitted while transcoding.
//!
//! Events are informational. An [`Observer`] sees them in the order they
//! happen but has no way to alter the run.
use crate::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The streamer validated the store and is about to read windows.
    StreamStarted {
        columns: usize,
        positions: usize,
        chunk_size: usize,
    },
    /// Rows `start + 1 ..= end` were transposed and handed on.
    WindowWritten { start: Position, end: Position },
    /// The encoder parsed the table header.
    EncodeStarted { samples: usize, reference: String },
    EncodeFinished {
        rows: u64,
        records: u64,
        skipped: u64,
    },
}

pub trait Observer {
    fn observe(&mut self, event: &Progress);
}

impl<F> Observer for F
where
    F: FnMut(&Progress),
{
    fn observe(&mut self, event: &Progress) {
        (*self)(event)
    }
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn observe(&mut self, event: &Progress) {
        match event {
            Progress::StreamStarted {
                columns,
                positions,
                chunk_size,
            } => tracing::info!(columns, positions, chunk_size, "streaming matrix"),
            Progress::WindowWritten { start, end } => {
                tracing::debug!(start = start + 1, end, "window written")
            }
            Progress::EncodeStarted { samples, reference } => {
                tracing::info!(samples, reference = %reference, "encoding variants")
            }
            Progress::EncodeFinished {
                rows,
                records,
                skipped,
            } => tracing::info!(rows, records, skipped, "encoding finished"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Observer for Silent {
    fn observe(&mut self, _event: &Progress) {}
}
