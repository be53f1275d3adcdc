#![crate_name = "genomics_vcf"]
//! Transcodes a per-sample genotype call matrix into a VCF record stream.
//!
//! The matrix lives in an [`store::ArrayStore`]: one named array of single byte
//! calls per sample, all of equal length. The [`streamer::MatrixStreamer`]
//! transposes it window by window into position rows, and the
//! [`encoder::VariantEncoder`] turns each row into a [`VariantRecord`].
use std::fmt;

pub mod prelude;

pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod streamer;
pub mod table;
pub mod vcf;

/// 1-based position of a row in the matrix.
pub type Position = u64;
/// 1-based index into a row's alternate allele list.
pub type AlleleIndex = u8;
pub type SampleNames = Vec<String>;

/// Number of matrix rows read per window unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 500_000;

/// Name of the first column of the intermediate table.
pub const POSITION_COLUMN: &str = "pos";

/// A canonical nucleotide.
///
/// Variant order is alphabetical so the derived `Ord` sorts alleles
/// lexicographically.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Base {
    A,
    C,
    G,
    T,
}

impl Base {
    pub const ALL: [Base; 4] = [Base::A, Base::C, Base::G, Base::T];

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(Base::A),
            b'C' => Some(Base::C),
            b'G' => Some(Base::G),
            b'T' => Some(Base::T),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Base::A => 'A',
            Base::C => 'C',
            Base::G => 'G',
            Base::T => 'T',
        }
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Classification of a single matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Base(Base),
    /// `N` or `-`
    Missing,
    /// Anything outside both alphabets, including empty or multi-character cells.
    Unknown,
}

impl Call {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'N' | b'-' => Call::Missing,
            _ => Base::from_byte(byte).map_or(Call::Unknown, Call::Base),
        }
    }

    /// Classifies a cell of the intermediate table.
    pub fn classify(cell: &[u8]) -> Self {
        match cell {
            [byte] => Self::from_byte(*byte),
            _ => Call::Unknown,
        }
    }

    pub fn base(self) -> Option<Base> {
        match self {
            Call::Base(base) => Some(base),
            _ => None,
        }
    }
}

/// Per-sample genotype code. Calls are always rendered homozygous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genotype {
    HomRef,
    HomAlt(AlleleIndex),
    Missing,
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Genotype::HomRef => f.write_str("0/0"),
            Genotype::HomAlt(k) => write!(f, "{}/{}", k, k),
            Genotype::Missing => f.write_str("./."),
        }
    }
}

/// One encoded matrix row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRecord {
    pub position: Position,
    pub reference: Base,
    /// Sorted, deduplicated, never containing `reference`.
    pub alternates: Vec<Base>,
    /// One per sample, in header order.
    pub genotypes: Vec<Genotype>,
}

impl VariantRecord {
    /// The ALT column: comma-joined alternates, or `.` when there are none.
    pub fn alt_field(&self) -> String {
        if self.alternates.is_empty() {
            return ".".to_owned();
        }
        self.alternates
            .iter()
            .map(|base| base.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}
