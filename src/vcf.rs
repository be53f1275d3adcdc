//! VCF output.
use crate::error::Result;
use crate::table::TableHeader;
use crate::VariantRecord;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const FILE_FORMAT: &str = "VCFv4.2";

/// Plain or gzip compressed output file.
pub enum OutputFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputFile {
    pub fn create<P: AsRef<Path>>(path: P, compress: bool) -> io::Result<Self> {
        let file = BufWriter::with_capacity(64 * 1024, File::create(path)?);
        Ok(if compress {
            OutputFile::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            OutputFile::Plain(file)
        })
    }

    /// Finishes any compressed stream and flushes the file.
    pub fn close(self) -> io::Result<()> {
        let mut file = match self {
            OutputFile::Plain(file) => file,
            OutputFile::Gzip(encoder) => encoder.finish()?,
        };
        file.flush()
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputFile::Plain(file) => file.write(buf),
            OutputFile::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputFile::Plain(file) => file.flush(),
            OutputFile::Gzip(encoder) => encoder.flush(),
        }
    }
}

pub struct VcfWriter<W: Write> {
    writer: W,
    chrom: String,
}

impl VcfWriter<OutputFile> {
    pub fn create<P: AsRef<Path>>(path: P, chrom: &str, compress: bool) -> Result<Self> {
        Ok(Self::new(OutputFile::create(path, compress)?, chrom))
    }

    pub fn close(self) -> Result<()> {
        self.writer.close()?;
        Ok(())
    }
}

impl<W: Write> VcfWriter<W> {
    pub fn new(writer: W, chrom: &str) -> Self {
        Self {
            writer,
            chrom: chrom.to_owned(),
        }
    }

    /// Meta lines and the `#CHROM` line. Only sample columns are listed; the
    /// reference column is named in `##reference`.
    pub fn write_header(&mut self, header: &TableHeader) -> Result<()> {
        let w = &mut self.writer;
        writeln!(w, "##fileformat={}", FILE_FORMAT)?;
        writeln!(w, "##reference={}", header.reference)?;
        writeln!(
            w,
            "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">"
        )?;
        write!(w, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT")?;
        for sample in &header.samples {
            write!(w, "\t{}", sample)?;
        }
        writeln!(w)?;
        Ok(())
    }

    pub fn write_record(&mut self, record: &VariantRecord) -> Result<()> {
        let w = &mut self.writer;
        write!(
            w,
            "{}\t{}\t.\t{}\t{}\t.\tPASS\t.\tGT",
            self.chrom,
            record.position,
            record.reference,
            record.alt_field()
        )?;
        for genotype in &record.genotypes {
            write!(w, "\t{}", genotype)?;
        }
        writeln!(w)?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Base, Genotype};
    use flate2::read::MultiGzDecoder;
    use std::error::Error;
    use std::io::Read;
    use std::result::Result;

    fn header() -> TableHeader {
        TableHeader {
            samples: vec!["s0".into(), "s1".into()],
            reference: "Col-0".into(),
        }
    }

    fn record() -> VariantRecord {
        VariantRecord {
            position: 12,
            reference: Base::G,
            alternates: vec![Base::A, Base::T],
            genotypes: vec![Genotype::HomAlt(2), Genotype::Missing],
        }
    }

    #[test]
    fn test_header_and_record_lines() -> Result<(), Box<dyn Error>> {
        let mut vcf = VcfWriter::new(vec![], "Chr5");
        vcf.write_header(&header())?;
        vcf.write_record(&record())?;
        let text = String::from_utf8(vcf.finish()?)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "##fileformat=VCFv4.2",
                "##reference=Col-0",
                "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">",
                "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts0\ts1",
                "Chr5\t12\t.\tG\tA,T\t.\tPASS\t.\tGT\t2/2\t./.",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_compressed_output() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.vcf.gz");
        let mut vcf = VcfWriter::create(&path, "1", true)?;
        vcf.write_header(&header())?;
        vcf.close()?;

        let mut text = String::new();
        MultiGzDecoder::new(File::open(&path)?).read_to_string(&mut text)?;
        assert!(text.starts_with("##fileformat=VCFv4.2\n"));
        Ok(())
    }
}
