use noodles::core::Position;
use noodles::vcf;
use noodles::vcf::header::record::value::{Map, map};
use noodles::vcf::variant::io::Write as VariantWrite;
use noodles::vcf::variant::record_buf;
use serde::Serialize;
use std::io::Write;

use crate::data_types::call_record::ConsensusPointRecord;
use crate::data_types::callers::{SampleLayout, SampleRole};

/// INFO key listing the supporting callers
pub const INFO_CALLERS: &str = "CALLERS";
/// INFO flag marking positional indel votes with disagreeing alleles
pub const INFO_INDEL_CONFLICT: &str = "INDEL_CONFLICT";

/// Writes consensus point calls as a sites-only VCF
pub struct ConsensusCallWriter<W: Write> {
    /// Header written at construction, also used to encode each record
    header: vcf::Header,
    vcf_writer: vcf::io::Writer<W>,
    /// Number of records written so far
    records_written: u64
}

impl<W: Write> ConsensusCallWriter<W> {
    /// Writes the header and returns a writer ready for records.
    /// # Arguments
    /// * `inner` - destination
    /// * `source` - value of the `##source` header line
    /// * `contigs` - chromosomes declared in the header, in output order
    /// # Errors
    /// * if the header cannot be built or written
    pub fn new(inner: W, source: &str, contigs: &[String]) -> anyhow::Result<Self> {
        let mut header = vcf::Header::default();
        header.insert("source".parse()?, vcf::header::record::Value::from(source.to_string()))?;

        let info_header = [
            (
                INFO_CALLERS,
                Map::<map::Info>::new(map::info::Number::Unknown, map::info::Type::String, "Callers that reported this call, in priority order")
            ),
            (
                INFO_INDEL_CONFLICT,
                Map::<map::Info>::new(map::info::Number::Count(0), map::info::Type::Flag, "Other indel alleles were called at this position")
            )
        ];
        for (header_key, header_value) in info_header.into_iter() {
            header.infos_mut().insert(header_key.to_string(), header_value);
        }
        for contig in contigs.iter() {
            header.contigs_mut().insert(contig.clone(), Map::<map::Contig>::new());
        }

        let mut vcf_writer = vcf::io::Writer::new(inner);
        vcf_writer.write_header(&header)?;
        Ok(Self {
            header,
            vcf_writer,
            records_written: 0
        })
    }

    /// Appends one chromosome's records, which must already be sorted by position
    pub fn write_chromosome(&mut self, records: &[ConsensusPointRecord]) -> std::io::Result<()> {
        for record in records.iter() {
            let key = record.key();
            let position = usize::try_from(key.position).ok()
                .and_then(|p| Position::try_from(p).ok())
                .ok_or_else(|| std::io::Error::other(format!("invalid position {}:{}", key.chromosome, key.position)))?;

            let filters: record_buf::Filters = match record.filter_status() {
                "PASS" => record_buf::Filters::pass(),
                "." | "" => Default::default(),
                other => other.split(';').map(|f| f.to_string()).collect()
            };

            let callers = record.supporting_callers().iter()
                .map(|c| Some(c.to_string()))
                .collect::<Vec<Option<String>>>();
            let mut info_fields = vec![
                (INFO_CALLERS.to_string(), Some(record_buf::info::field::Value::from(callers)))
            ];
            if record.indel_conflict() {
                info_fields.push((INFO_INDEL_CONFLICT.to_string(), Some(record_buf::info::field::Value::Flag)));
            }

            let mut builder = vcf::variant::RecordBuf::builder()
                .set_reference_sequence_name(key.chromosome.clone())
                .set_variant_start(position)
                .set_ids([record.id().to_string()].into_iter().collect())
                .set_reference_bases(key.reference_allele.clone())
                .set_alternate_bases(record_buf::AlternateBases::from(vec![key.alternate_allele.clone()]))
                .set_filters(filters)
                .set_info(info_fields.into_iter().collect());
            if let Some(quality) = record.quality() {
                builder = builder.set_quality_score(quality as f32);
            }
            self.vcf_writer.write_variant_record(&self.header, &builder.build())?;
        }
        self.records_written += records.len() as u64;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flushes and returns the inner writer
    pub fn finish(self) -> anyhow::Result<W> {
        let mut inner = self.vcf_writer.into_inner();
        inner.flush()?;
        Ok(inner)
    }
}

const GERMLINE_COLUMNS: [&str; 6] = ["chrom", "pos", "id", "ref_count", "alt_count", "depth"];
const SOMATIC_COLUMNS: [&str; 9] = [
    "chrom", "pos", "id",
    "tumor_ref", "tumor_alt", "tumor_depth",
    "normal_ref", "normal_alt", "normal_depth"
];

#[derive(Serialize)]
struct GermlineCountsRow<'a> {
    chrom: &'a str,
    pos: u64,
    id: &'a str,
    ref_count: Option<u32>,
    alt_count: Option<u32>,
    depth: Option<u32>
}

#[derive(Serialize)]
struct SomaticCountsRow<'a> {
    chrom: &'a str,
    pos: u64,
    id: &'a str,
    tumor_ref: Option<u32>,
    tumor_alt: Option<u32>,
    tumor_depth: Option<u32>,
    normal_ref: Option<u32>,
    normal_alt: Option<u32>,
    normal_depth: Option<u32>
}

/// Writes the read-count side table that is joined back onto the calls by (chrom, pos, id).
/// Missing counts are written as empty fields.
pub struct CountsWriter<W: Write> {
    csv_writer: csv::Writer<W>,
    /// If true, tumor and normal columns are written
    is_somatic: bool
}

impl<W: Write> CountsWriter<W> {
    /// Constructor, the column set follows the sample layout.
    /// The header is written immediately so that an empty table still has one.
    pub fn new(inner: W, layout: &SampleLayout) -> csv::Result<Self> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(inner);
        let is_somatic = layout.is_somatic();
        let columns: &[&str] = if is_somatic { &SOMATIC_COLUMNS } else { &GERMLINE_COLUMNS };
        csv_writer.write_record(columns)?;
        Ok(Self {
            csv_writer,
            is_somatic
        })
    }

    /// Appends one chromosome's records
    pub fn write_chromosome(&mut self, records: &[ConsensusPointRecord]) -> csv::Result<()> {
        for record in records.iter() {
            let key = record.key();
            if self.is_somatic {
                let tumor = record.metrics_for(SampleRole::Tumor);
                let normal = record.metrics_for(SampleRole::Normal);
                self.csv_writer.serialize(SomaticCountsRow {
                    chrom: &key.chromosome,
                    pos: key.position,
                    id: record.id(),
                    tumor_ref: tumor.ref_count,
                    tumor_alt: tumor.alt_count,
                    tumor_depth: tumor.depth,
                    normal_ref: normal.ref_count,
                    normal_alt: normal.alt_count,
                    normal_depth: normal.depth
                })?;
            } else {
                let sample = record.metrics_for(SampleRole::Sample);
                self.csv_writer.serialize(GermlineCountsRow {
                    chrom: &key.chromosome,
                    pos: key.position,
                    id: record.id(),
                    ref_count: sample.ref_count,
                    alt_count: sample.alt_count,
                    depth: sample.depth
                })?;
            }
        }
        Ok(())
    }

    /// Flushes and returns the inner writer
    pub fn finish(self) -> anyhow::Result<W> {
        let inner = self.csv_writer.into_inner()
            .map_err(|e| anyhow::anyhow!("Error while flushing counts writer: {}", e.error()))?;
        Ok(inner)
    }
}
