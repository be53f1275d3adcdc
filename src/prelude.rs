pub use crate::encoder::{encode_table, EncodeSummary, VariantEncoder};
pub use crate::error::{Error, Result, Stage};
pub use crate::pipeline::Pipeline;
pub use crate::progress::{LogObserver, Observer, Progress, Silent};
pub use crate::store::{ArrayStore, DirectoryStore, MemoryStore};
pub use crate::streamer::{MatrixStreamer, StreamerBuilder, Window};
pub use crate::table::{Row, TableBuilder, TableHeader, TableReader, TableWriter};
pub use crate::vcf::VcfWriter;
pub use crate::{Base, Call, Genotype, Position, VariantRecord};
