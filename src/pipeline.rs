//! Runs the streamer and the encoder end to end.
//!
//! By default the streamer writes the whole matrix to a compressed table on
//! disk and the encoder reads it back. In pipelined mode the two stages run
//! on separate threads joined by a bounded queue of windows and no table is
//! written; the output is identical either way.
//!
//! The VCF is written next to its final path with a `.partial` suffix and
//! only renamed into place once every record has been written.
use crate::encoder::{encode_table, EncodeSummary, VariantEncoder};
use crate::error::{Error, Result, Stage};
use crate::progress::Observer;
use crate::store::{ArrayStore, DirectoryStore};
use crate::streamer::{MatrixStreamer, StreamerBuilder};
use crate::table::{TableReader, TableWriter};
use crate::vcf::VcfWriter;
use crate::DEFAULT_CHUNK_SIZE;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

const TABLE_SUFFIX: &str = "_temp.tsv.gz";
const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct Pipeline {
    input: PathBuf,
    output: PathBuf,
    chrom: String,
    chunk_size: usize,
    reference: Option<String>,
    intermediate: Option<PathBuf>,
    keep_intermediate: bool,
    pipelined: bool,
    queue_depth: usize,
}

impl Pipeline {
    pub fn new<I, O>(input: I, output: O, chrom: &str) -> Self
    where
        I: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        Self {
            input: input.into(),
            output: output.into(),
            chrom: chrom.to_owned(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            reference: None,
            intermediate: None,
            keep_intermediate: false,
            pipelined: false,
            queue_depth: 2,
        }
    }

    pub fn chunk_size(&mut self, chunk_size: usize) -> &mut Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn reference(&mut self, reference: Option<&str>) -> &mut Self {
        self.reference = reference.map(str::to_owned);
        self
    }

    pub fn intermediate<P: Into<PathBuf>>(&mut self, path: P) -> &mut Self {
        self.intermediate = Some(path.into());
        self
    }

    pub fn keep_intermediate(&mut self, keep: bool) -> &mut Self {
        self.keep_intermediate = keep;
        self
    }

    pub fn pipelined(&mut self, pipelined: bool) -> &mut Self {
        self.pipelined = pipelined;
        self
    }

    /// Number of windows the streamer may run ahead of the encoder in
    /// pipelined mode.
    pub fn queue_depth(&mut self, depth: usize) -> &mut Self {
        self.queue_depth = depth;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Path of the intermediate table. Unless set explicitly this is the
    /// output path with `.gz` and `.vcf` stripped and `_temp.tsv.gz` appended.
    pub fn intermediate_path(&self) -> PathBuf {
        if let Some(path) = &self.intermediate {
            return path.clone();
        }
        let mut base = self.output.with_extension("");
        if base.extension().map_or(false, |ext| ext == "vcf") {
            base = base.with_extension("");
        }
        let mut name = base.file_name().map(OsString::from).unwrap_or_default();
        name.push(TABLE_SUFFIX);
        base.with_file_name(name)
    }

    pub fn partial_path(&self) -> PathBuf {
        let mut name = self
            .output
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(PARTIAL_SUFFIX);
        self.output.with_file_name(name)
    }

    /// Output is gzip compressed when its path ends in `.gz`.
    pub fn compress(&self) -> bool {
        self.output.extension().map_or(false, |ext| ext == "gz")
    }

    fn streamer<S: ArrayStore>(&self, store: S) -> Result<MatrixStreamer<S>> {
        let mut builder = StreamerBuilder::new();
        builder.chunk_size(self.chunk_size);
        if let Some(reference) = &self.reference {
            builder.reference(reference);
        }
        builder.build(store)
    }

    /// Transcodes the array store directory at the input path.
    pub fn run(&self, observer: &mut dyn Observer) -> Result<EncodeSummary> {
        let store =
            DirectoryStore::open(&self.input).map_err(|err| Error::in_stage(Stage::Stream, err))?;
        self.run_with(store, observer)
    }

    /// Transcodes `store`, writing the VCF to the output path.
    pub fn run_with<S>(&self, store: S, observer: &mut dyn Observer) -> Result<EncodeSummary>
    where
        S: ArrayStore + Send,
    {
        tracing::info!(
            input = %self.input.display(),
            output = %self.output.display(),
            chrom = %self.chrom,
            pipelined = self.pipelined,
            "transcoding"
        );
        let streamer = self
            .streamer(store)
            .map_err(|err| Error::in_stage(Stage::Stream, err))?;

        let partial = self.partial_path();
        let outcome = if self.pipelined {
            self.run_pipelined(streamer, &partial, observer)
        } else {
            self.run_sequential(&streamer, &partial, observer)
        };
        let summary = match outcome {
            Ok(summary) => summary,
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        tracing::warn!(path = %partial.display(), error = %cleanup, "could not remove partial output");
                    }
                }
                return Err(err);
            }
        };

        fs::rename(&partial, &self.output)
            .map_err(|err| Error::in_stage(Stage::Finalize, err.into()))?;
        tracing::info!(output = %self.output.display(), records = summary.records, "done");
        Ok(summary)
    }

    fn run_sequential<S: ArrayStore>(
        &self,
        streamer: &MatrixStreamer<S>,
        partial: &Path,
        observer: &mut dyn Observer,
    ) -> Result<EncodeSummary> {
        let table = self.intermediate_path();
        if table == self.output || table == partial {
            return Err(Error::in_stage(
                Stage::Stream,
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "intermediate table path must differ from the output path",
                )),
            ));
        }

        tracing::info!(path = %table.display(), "writing intermediate table");
        let outcome = write_table(streamer, &table, observer)
            .map_err(|err| Error::in_stage(Stage::Stream, err))
            .and_then(|()| {
                encode_file(&table, partial, &self.chrom, self.compress(), observer)
                    .map_err(|err| Error::in_stage(Stage::Encode, err))
            });

        if !self.keep_intermediate {
            if let Err(err) = fs::remove_file(&table) {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %table.display(), error = %err, "could not remove intermediate table");
                }
            }
        }
        outcome
    }

    fn run_pipelined<S>(
        &self,
        streamer: MatrixStreamer<S>,
        partial: &Path,
        observer: &mut dyn Observer,
    ) -> Result<EncodeSummary>
    where
        S: ArrayStore + Send,
    {
        let encode = |err: Error| Error::in_stage(Stage::Encode, err);

        observer.observe(&streamer.started());
        let encoder = VariantEncoder::new(streamer.header());
        let mut vcf = VcfWriter::create(partial, &self.chrom, self.compress()).map_err(encode)?;
        let (sender, receiver) = mpsc::sync_channel(self.queue_depth);

        let summary = thread::scope(|scope| -> Result<EncodeSummary> {
            scope.spawn(move || {
                for window in streamer.windows() {
                    if sender.send(window).is_err() {
                        break;
                    }
                }
            });

            observer.observe(&encoder.started());
            vcf.write_header(encoder.header()).map_err(encode)?;
            let mut summary = EncodeSummary::default();
            for window in receiver {
                let window = window.map_err(|err| Error::in_stage(Stage::Stream, err))?;
                for row in window.rows() {
                    encoder
                        .encode_into(&row, &mut vcf, &mut summary)
                        .map_err(encode)?;
                }
                observer.observe(&window.progress());
            }
            observer.observe(&summary.progress());
            Ok(summary)
        })?;

        vcf.close().map_err(encode)?;
        Ok(summary)
    }
}

fn write_table<S: ArrayStore>(
    streamer: &MatrixStreamer<S>,
    path: &Path,
    observer: &mut dyn Observer,
) -> Result<()> {
    let mut table = TableWriter::create(path)?;
    streamer.write_table(&mut table, observer)?;
    table.close()
}

fn encode_file(
    table: &Path,
    partial: &Path,
    chrom: &str,
    compress: bool,
    observer: &mut dyn Observer,
) -> Result<EncodeSummary> {
    let reader = TableReader::open(table)?;
    let encoder = VariantEncoder::new(reader.header().clone());
    let mut vcf = VcfWriter::create(partial, chrom, compress)?;
    let summary = encode_table(&encoder, reader, &mut vcf, observer)?;
    vcf.close()?;
    Ok(summary)
}
