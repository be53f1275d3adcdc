//! Encodes position rows as variant records.
use crate::error::{Error, Result};
use crate::progress::{Observer, Progress};
use crate::table::{Row, TableHeader};
use crate::vcf::VcfWriter;
use crate::{AlleleIndex, Base, Call, Genotype, VariantRecord};
use std::io::Write;

/// Counts kept while encoding a table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSummary {
    pub rows: u64,
    pub records: u64,
    /// Rows dropped because the reference call was not a canonical base.
    pub skipped: u64,
}

impl EncodeSummary {
    pub fn progress(&self) -> Progress {
        Progress::EncodeFinished {
            rows: self.rows,
            records: self.records,
            skipped: self.skipped,
        }
    }
}

/// Genotype of a single call given the row's reference and sorted alternates.
pub fn genotype(call: Call, reference: Base, alternates: &[Base]) -> Genotype {
    match call {
        Call::Base(base) if base == reference => Genotype::HomRef,
        Call::Base(base) => alternates
            .iter()
            .position(|alt| *alt == base)
            .map_or(Genotype::Missing, |idx| {
                Genotype::HomAlt((idx + 1) as AlleleIndex)
            }),
        Call::Missing | Call::Unknown => Genotype::Missing,
    }
}

/// Canonical bases among `calls` other than `reference`, in lexicographic
/// order regardless of where in the row they first appear.
pub fn alternates(calls: &[Call], reference: Base) -> Vec<Base> {
    let mut present = [false; 4];
    for base in calls.iter().filter_map(|call| call.base()) {
        if base != reference {
            present[base.slot()] = true;
        }
    }
    Base::ALL
        .iter()
        .copied()
        .filter(|base| present[base.slot()])
        .collect()
}

pub struct VariantEncoder {
    header: TableHeader,
}

impl VariantEncoder {
    pub fn new(header: TableHeader) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn started(&self) -> Progress {
        Progress::EncodeStarted {
            samples: self.header.samples.len(),
            reference: self.header.reference.clone(),
        }
    }

    /// Encodes one row. Returns `None` when the reference call is not a
    /// canonical base; a row of the wrong width is an error.
    pub fn encode(&self, row: &Row) -> Result<Option<VariantRecord>> {
        let expected = self.header.width();
        let found = row.calls.len() + 1;
        let (reference, samples) = match row.calls.split_last() {
            Some(split) if found == expected => split,
            _ => {
                return Err(Error::RowShape {
                    line: row.line,
                    expected,
                    found,
                })
            }
        };

        let reference = match reference.base() {
            Some(base) => base,
            None => return Ok(None),
        };

        let alternates = alternates(samples, reference);
        let genotypes = samples
            .iter()
            .map(|call| genotype(*call, reference, &alternates))
            .collect();

        Ok(Some(VariantRecord {
            position: row.position,
            reference,
            alternates,
            genotypes,
        }))
    }

    /// Encodes `row` and writes its record, if any, to `vcf`.
    ///
    /// Rows must arrive in order starting at position 1; `summary` counts the
    /// rows seen so far.
    pub fn encode_into<W: Write>(
        &self,
        row: &Row,
        vcf: &mut VcfWriter<W>,
        summary: &mut EncodeSummary,
    ) -> Result<()> {
        let expected = summary.rows + 1;
        if row.position != expected {
            return Err(Error::PositionOrder {
                line: row.line,
                expected,
                found: row.position,
            });
        }
        summary.rows += 1;
        match self.encode(row)? {
            Some(record) => {
                vcf.write_record(&record)?;
                summary.records += 1;
            }
            None => summary.skipped += 1,
        }
        Ok(())
    }
}

/// Writes the VCF header and one record per encodable row of `rows`.
pub fn encode_table<I, W>(
    encoder: &VariantEncoder,
    rows: I,
    vcf: &mut VcfWriter<W>,
    observer: &mut dyn Observer,
) -> Result<EncodeSummary>
where
    I: IntoIterator<Item = Result<Row>>,
    W: Write,
{
    observer.observe(&encoder.started());
    vcf.write_header(encoder.header())?;
    let mut summary = EncodeSummary::default();
    for row in rows {
        encoder.encode_into(&row?, vcf, &mut summary)?;
    }
    observer.observe(&summary.progress());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Silent;
    use crate::table::TableBuilder;
    use std::error::Error;
    use std::result::Result;

    fn encoder(samples: &[&str]) -> VariantEncoder {
        VariantEncoder::new(TableHeader {
            samples: samples.iter().map(|s| s.to_string()).collect(),
            reference: "ref".into(),
        })
    }

    #[test]
    fn test_alternates_sorted_not_first_seen() -> Result<(), Box<dyn Error>> {
        let record = encoder(&["s0", "s1", "s2", "s3"])
            .encode(&Row::from_bytes(7, b"AGCAA".to_vec()))?
            .ok_or("record expected")?;
        assert_eq!(record.position, 7);
        assert_eq!(record.reference, Base::A);
        assert_eq!(record.alternates, vec![Base::C, Base::G]);
        assert_eq!(
            record.genotypes,
            vec![
                Genotype::HomRef,
                Genotype::HomAlt(2),
                Genotype::HomAlt(1),
                Genotype::HomRef
            ]
        );
        Ok(())
    }

    #[test]
    fn test_missing_and_unknown_calls() -> Result<(), Box<dyn Error>> {
        let record = encoder(&["s0", "s1", "s2", "s3"])
            .encode(&Row::from_bytes(1, b"N-xTC".to_vec()))?
            .ok_or("record expected")?;
        assert_eq!(record.alternates, vec![Base::T]);
        assert_eq!(
            record.genotypes,
            vec![
                Genotype::Missing,
                Genotype::Missing,
                Genotype::Missing,
                Genotype::HomAlt(1)
            ]
        );
        Ok(())
    }

    #[test]
    fn test_no_alternate_row() -> Result<(), Box<dyn Error>> {
        let record = encoder(&["s0", "s1"])
            .encode(&Row::from_bytes(3, b"GGG".to_vec()))?
            .ok_or("record expected")?;
        assert_eq!(record.alt_field(), ".");
        assert_eq!(record.genotypes, vec![Genotype::HomRef; 2]);
        Ok(())
    }

    #[test]
    fn test_ambiguous_reference_is_skipped() -> Result<(), Box<dyn Error>> {
        let encoder = encoder(&["s0"]);
        for reference in b"N-R".iter() {
            let row = Row::from_bytes(1, vec![b'A', *reference]);
            assert_eq!(encoder.encode(&row)?, None);
        }
        Ok(())
    }

    #[test]
    fn test_wrong_width_is_fatal() {
        let encoder = encoder(&["s0", "s1"]);
        for bytes in [b"A".to_vec(), b"AA".to_vec(), b"AAAA".to_vec(), vec![]].iter() {
            let row = Row::from_bytes(4, bytes.clone());
            match encoder.encode(&row) {
                Err(crate::error::Error::RowShape {
                    line,
                    expected,
                    found,
                }) => {
                    assert_eq!(line, 5);
                    assert_eq!(expected, 4);
                    assert_eq!(found, bytes.len() + 1);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_encode_table_counts_rows() -> Result<(), Box<dyn Error>> {
        let table = "pos\ts0\ts1\tref\n1\tA\tC\tA\n2\tA\tA\tN\n3\tT\tT\tT\n";
        let reader = TableBuilder::new().from_reader(table.as_bytes())?;
        let encoder = VariantEncoder::new(reader.header().clone());
        let mut vcf = VcfWriter::new(vec![], "chr1");
        let summary = encode_table(&encoder, reader, &mut vcf, &mut Silent)?;
        assert_eq!(
            summary,
            EncodeSummary {
                rows: 3,
                records: 2,
                skipped: 1
            }
        );
        let text = String::from_utf8(vcf.finish()?)?;
        assert!(text.ends_with(
            "chr1\t1\t.\tA\tC\t.\tPASS\t.\tGT\t0/0\t1/1\nchr1\t3\t.\tT\t.\t.\tPASS\t.\tGT\t0/0\t0/0\n"
        ));
        Ok(())
    }

    #[test]
    fn test_encode_table_stops_on_corrupt_row() -> Result<(), Box<dyn Error>> {
        let table = "pos\ts0\tref\n1\tA\tA\n2\tA\n3\tA\tA\n";
        let reader = TableBuilder::new().from_reader(table.as_bytes())?;
        let encoder = VariantEncoder::new(reader.header().clone());
        let mut vcf = VcfWriter::new(vec![], "chr1");
        let result = encode_table(&encoder, reader, &mut vcf, &mut Silent);
        assert!(matches!(
            result,
            Err(crate::error::Error::RowShape { line: 3, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_lost_row_is_fatal() -> Result<(), Box<dyn Error>> {
        let table = "pos\ts0\tref\n1\tA\tA\n\n3\tC\tC\n";
        let reader = TableBuilder::new().from_reader(table.as_bytes())?;
        let encoder = VariantEncoder::new(reader.header().clone());
        let mut vcf = VcfWriter::new(vec![], "chr1");
        let result = encode_table(&encoder, reader, &mut vcf, &mut Silent);
        assert!(matches!(
            result,
            Err(crate::error::Error::PositionOrder {
                expected: 2,
                found: 3,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_repeated_position_is_fatal() {
        let encoder = encoder(&["s0"]);
        let mut vcf = VcfWriter::new(vec![], "chr1");
        let mut summary = EncodeSummary::default();
        let row = Row::from_bytes(1, b"AA".to_vec());
        assert!(encoder.encode_into(&row, &mut vcf, &mut summary).is_ok());
        match encoder.encode_into(&row, &mut vcf, &mut summary) {
            Err(crate::error::Error::PositionOrder {
                line,
                expected,
                found,
            }) => assert_eq!((line, expected, found), (2, 2, 1)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(summary.rows, 1);
    }
}
