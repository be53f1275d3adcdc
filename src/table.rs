//! The row-oriented table passed from the streamer to the encoder.
//!
//! The first line names the columns: `pos`, the samples, and the reference
//! last. Every following line holds a 1-based position and one call per
//! column, tab separated. Fields are never quoted, so a call byte that would
//! split a line (the delimiter, `\n` or `\r`) is written as `?`, which reads
//! back as an unknown call. Tables written to disk are gzip compressed.
use crate::error::{Error, Result};
use crate::{Call, Position, SampleNames, POSITION_COLUMN};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::ArrayView1;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const UNKNOWN_CELL: u8 = b'?';

/// Column layout of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    pub samples: SampleNames,
    pub reference: String,
}

impl TableHeader {
    /// Splits `pos, samples..., reference` into its parts.
    pub fn from_columns(columns: Vec<String>) -> Result<Self> {
        let mut columns = columns.into_iter();
        match columns.next() {
            Some(ref first) if first == POSITION_COLUMN => {}
            Some(first) => {
                return Err(Error::invalid_header(format!(
                    "first column is `{}`, expected `{}`",
                    first, POSITION_COLUMN
                )))
            }
            None => return Err(Error::invalid_header("header line is empty")),
        }

        let mut samples: SampleNames = columns.collect();
        let reference = samples
            .pop()
            .ok_or_else(|| Error::invalid_header("no reference column"))?;

        let mut seen = HashSet::new();
        for name in samples.iter().chain(std::iter::once(&reference)) {
            if !seen.insert(name.as_str()) {
                return Err(Error::invalid_header(format!(
                    "column `{}` appears more than once",
                    name
                )));
            }
        }

        Ok(Self { samples, reference })
    }

    /// Sample columns followed by the reference column.
    pub fn call_columns(&self) -> impl Iterator<Item = &String> {
        self.samples.iter().chain(std::iter::once(&self.reference))
    }

    /// Number of fields in every data line, position included.
    pub fn width(&self) -> usize {
        self.samples.len() + 2
    }
}

/// One data line: a position and its classified calls, reference last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Line number within the table, header being line 1.
    pub line: u64,
    pub position: Position,
    pub calls: Vec<Call>,
}

impl Row {
    /// Builds the row the table would hold for `position`.
    pub fn from_bytes<I>(position: Position, bytes: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        Self {
            line: position + 1,
            position,
            calls: bytes.into_iter().map(Call::from_byte).collect(),
        }
    }
}

/// Configures the delimiter shared by [`TableReader`] and [`TableWriter`].
pub struct TableBuilder {
    delimiter: u8,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { delimiter: b'\t' }
    }

    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    /// Reads the header line and returns a reader positioned at the first row.
    pub fn from_reader<R: Read>(&self, reader: R) -> Result<TableReader<R>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .quoting(false)
            .flexible(true)
            .from_reader(reader);

        let columns = rdr
            .byte_headers()?
            .iter()
            .map(|name| {
                String::from_utf8(name.to_vec())
                    .map_err(|_| Error::invalid_header("column name is not valid UTF-8"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TableReader {
            header: TableHeader::from_columns(columns)?,
            records: rdr,
            record: csv::ByteRecord::new(),
        })
    }

    pub fn from_writer<W: Write>(&self, writer: W) -> TableWriter<W> {
        TableWriter {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .delimiter(self.delimiter)
                .quote_style(csv::QuoteStyle::Never)
                .from_writer(writer),
            delimiter: self.delimiter,
            width: None,
        }
    }
}

/// Yields the rows of a table.
///
/// Rows are not checked against the header width here; the encoder rejects
/// them.
pub struct TableReader<R> {
    header: TableHeader,
    records: csv::Reader<R>,
    record: csv::ByteRecord,
}

impl TableReader<Box<dyn Read + Send>> {
    /// Opens a table on disk, gzip compressed or plain.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = BufReader::new(File::open(path)?);
        let reader: Box<dyn Read + Send> = if file.fill_buf()?.starts_with(&GZIP_MAGIC) {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        TableBuilder::new().from_reader(reader)
    }
}

impl<R: Read> TableReader<R> {
    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    fn parse_row(&self) -> Result<Row> {
        let line = self
            .record
            .position()
            .map(|position| position.line())
            .unwrap_or_default();
        let mut fields = self.record.iter();
        let field = fields.next().unwrap_or_default();
        let position = std::str::from_utf8(field)
            .ok()
            .and_then(|value| value.parse::<Position>().ok())
            .ok_or_else(|| Error::InvalidPosition {
                line,
                value: String::from_utf8_lossy(field).into_owned(),
            })?;
        Ok(Row {
            line,
            position,
            calls: fields.map(Call::classify).collect(),
        })
    }
}

impl<R: Read> Iterator for TableReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        match self.records.read_byte_record(&mut self.record) {
            Ok(true) => Some(self.parse_row()),
            Ok(false) => None,
            Err(err) => Some(Err(err.into())),
        }
    }
}

/// Writes a table line by line.
pub struct TableWriter<W: Write> {
    writer: csv::Writer<W>,
    delimiter: u8,
    width: Option<usize>,
}

impl TableWriter<GzEncoder<BufWriter<File>>> {
    /// Creates a gzip compressed table on disk.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(TableBuilder::new().from_writer(GzEncoder::new(file, Compression::default())))
    }

    /// Finishes the gzip stream and flushes the file.
    pub fn close(self) -> Result<()> {
        let mut file = self.finish()?.finish()?;
        file.flush()?;
        Ok(())
    }
}

impl<W: Write> TableWriter<W> {
    /// Writes the header line. `columns` are the call columns, reference last.
    pub fn write_header<'a, I>(&mut self, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut names = vec![POSITION_COLUMN];
        names.extend(columns.into_iter().map(String::as_str));
        self.writer.write_record(&names)?;
        self.width = Some(names.len());
        Ok(())
    }

    pub fn write_row(&mut self, position: Position, calls: ArrayView1<'_, u8>) -> Result<()> {
        if let Some(width) = self.width {
            if calls.len() + 1 != width {
                return Err(Error::RowShape {
                    line: position + 1,
                    expected: width,
                    found: calls.len() + 1,
                });
            }
        }
        let delimiter = self.delimiter;
        let cells: Vec<u8> = calls
            .iter()
            .map(|&call| match call {
                b'\n' | b'\r' => UNKNOWN_CELL,
                call if call == delimiter => UNKNOWN_CELL,
                call => call,
            })
            .collect();
        let position = position.to_string();
        let fields = std::iter::once(position.as_bytes()).chain(cells.iter().map(std::slice::from_ref));
        self.writer.write_record(fields)?;
        Ok(())
    }

    /// Flushes buffered lines and returns the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| Error::Io(io::Error::new(err.error().kind(), err.error().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Base;
    use ndarray::arr1;
    use std::error::Error;
    use std::result::Result;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_header_splits_reference() -> Result<(), Box<dyn Error>> {
        let header = TableHeader::from_columns(columns(&["pos", "s0", "s1", "ref"]))?;
        assert_eq!(header.samples, vec!["s0", "s1"]);
        assert_eq!(header.reference, "ref");
        assert_eq!(header.width(), 4);
        Ok(())
    }

    #[test]
    fn test_header_rejects_bad_layouts() {
        assert!(TableHeader::from_columns(columns(&[])).is_err());
        assert!(TableHeader::from_columns(columns(&["pos"])).is_err());
        assert!(TableHeader::from_columns(columns(&["position", "ref"])).is_err());
        assert!(TableHeader::from_columns(columns(&["pos", "s0", "s0", "ref"])).is_err());
    }

    #[test]
    fn test_written_table_reads_back() -> Result<(), Box<dyn Error>> {
        let names = columns(&["s0", "ref"]);
        let mut writer = TableBuilder::new().from_writer(vec![]);
        writer.write_header(&names)?;
        writer.write_row(1, arr1(&[b'A', b'C']).view())?;
        writer.write_row(2, arr1(&[b'\t', b'N']).view())?;
        writer.write_row(3, arr1(&[b'"', b'\n']).view())?;
        let bytes = writer.finish()?;
        assert_eq!(bytes, b"pos\ts0\tref\n1\tA\tC\n2\t?\tN\n3\t\"\t?\n".to_vec());

        let reader = TableBuilder::new().from_reader(bytes.as_slice())?;
        assert_eq!(reader.header().reference, "ref");
        let rows = reader.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].calls, vec![Call::Base(Base::A), Call::Base(Base::C)]);
        assert_eq!(rows[1].position, 2);
        assert_eq!(rows[1].calls, vec![Call::Unknown, Call::Missing]);
        assert_eq!(rows[2].calls, vec![Call::Unknown, Call::Unknown]);
        Ok(())
    }

    #[test]
    fn test_quote_in_plain_table_is_a_call() -> Result<(), Box<dyn Error>> {
        let table = "pos\ts0\tref\n1\t\"A\tA\n2\tA\tA\n";
        let rows = TableBuilder::new()
            .from_reader(table.as_bytes())?
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].calls, vec![Call::Unknown, Call::Base(Base::A)]);
        assert_eq!(rows[1].position, 2);
        Ok(())
    }

    #[test]
    fn test_invalid_position_is_reported() -> Result<(), Box<dyn Error>> {
        let reader = TableBuilder::new().from_reader("pos\tref\nx\tA\n".as_bytes())?;
        let rows = reader.collect::<Vec<_>>();
        match &rows[0] {
            Err(crate::error::Error::InvalidPosition { line, value }) => {
                assert_eq!(*line, 2);
                assert_eq!(value, "x");
            }
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_gzip_table_on_disk() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table.tsv.gz");
        let mut writer = TableWriter::create(&path)?;
        writer.write_header(&columns(&["ref"]))?;
        writer.write_row(1, arr1(&[b'G']).view())?;
        writer.close()?;

        let mut raw = [0u8; 2];
        File::open(&path)?.read_exact(&mut raw)?;
        assert_eq!(raw, GZIP_MAGIC);

        let rows = TableReader::open(&path)?.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rows, vec![Row::from_bytes(1, vec![b'G'])]);
        Ok(())
    }
}
