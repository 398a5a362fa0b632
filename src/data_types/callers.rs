use noodles::vcf::variant::record_buf::samples::Sample;
use noodles::vcf::variant::record_buf::samples::sample::Value;
use noodles::vcf::variant::record_buf::samples::sample::value::Array;
use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString};

use crate::data_types::call_record::SampleMetrics;

/// Upstream point-variant callers we know how to read.
/// Adding a caller requires a new variant here and a new arm in `extract_metrics`.
#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, clap::ValueEnum)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PointCaller {
    /// Reports read counts as FORMAT/RC and FORMAT/AC
    Museq,
    /// Reports per-base tier counts (AU, CU, GU, TU) for SNVs and TAR/TIR for indels
    Strelka,
    /// Reports a combined FORMAT/AD array that must be split into REF and ALT
    Mutect,
    /// Reports FORMAT/RO and a per-ALT FORMAT/AO list
    Freebayes
}

/// Upstream structural variant callers we know how to read.
#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, clap::ValueEnum)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointCaller {
    /// VCF-like output with SVTYPE, CIPOS, and CIEND
    Lumpy,
    /// Tabular output with explicit breakend columns
    Destruct
}

/// The role a sample column plays in a call set
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum SampleRole {
    /// The only sample in germline mode
    Sample,
    Tumor,
    Normal
}

/// Describes which sample columns carry the metrics we report
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum SampleLayout {
    /// Single sample; if no name is given, the first sample column is used
    Germline { sample: Option<String> },
    /// Paired tumor/normal; names fall back to the conventional TUMOR/NORMAL labels
    Somatic { tumor: String, normal: String }
}

impl Default for SampleLayout {
    fn default() -> Self {
        SampleLayout::Germline { sample: None }
    }
}

impl SampleLayout {
    /// Returns true if this is a tumor/normal layout
    pub fn is_somatic(&self) -> bool {
        matches!(self, SampleLayout::Somatic { .. })
    }

    /// Maps each role to a sample column index.
    /// # Arguments
    /// * `header_samples` - the sample names from the `#CHROM` header line, in column order
    /// # Errors
    /// * if a requested sample is not present in the header
    pub fn resolve(&self, header_samples: &[String]) -> Result<Vec<(SampleRole, usize)>, String> {
        let find = |name: &str| header_samples.iter().position(|s| s == name);
        match self {
            SampleLayout::Germline { sample: Some(name) } => {
                let index = find(name)
                    .ok_or_else(|| format!("sample {name:?} was not found in header {header_samples:?}"))?;
                Ok(vec![(SampleRole::Sample, index)])
            },
            SampleLayout::Germline { sample: None } => {
                if header_samples.is_empty() {
                    // sites-only input, no metrics to pull
                    Ok(vec![])
                } else {
                    Ok(vec![(SampleRole::Sample, 0)])
                }
            },
            SampleLayout::Somatic { tumor, normal } => {
                let tumor_index = find(tumor).or_else(|| find("TUMOR"))
                    .ok_or_else(|| format!("tumor sample {tumor:?} was not found in header {header_samples:?}"))?;
                let normal_index = find(normal).or_else(|| find("NORMAL"))
                    .ok_or_else(|| format!("normal sample {normal:?} was not found in header {header_samples:?}"))?;
                Ok(vec![(SampleRole::Tumor, tumor_index), (SampleRole::Normal, normal_index)])
            }
        }
    }
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum MetricError {
    #[error("malformed {field} value {value:?}")]
    Malformed { field: String, value: String },
    #[error("{field} has no entry for ALT #{alt_index}")]
    MissingAllele { field: String, alt_index: usize }
}

/// Typed view over one sample column of a record.
/// FORMAT fields the header declares arrive as integers; undeclared fields arrive as text and are parsed here.
pub struct SampleFields<'a> {
    sample: Sample<'a>
}

impl<'a> SampleFields<'a> {
    /// Constructor
    /// # Arguments
    /// * `sample` - one sample of a noodles record
    pub fn new(sample: Sample<'a>) -> Self {
        Self { sample }
    }

    /// Returns the value for a key; missing keys, trailing dropped values, and "." are all None
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.sample.get(key).flatten()
    }

    /// Every entry of a count field, "." entries are None
    fn parse_count_list(&self, key: &str) -> Result<Option<Vec<Option<u32>>>, MetricError> {
        let value = match self.get(key) {
            Some(v) => v,
            None => return Ok(None)
        };
        let malformed = || MetricError::Malformed { field: key.to_string(), value: format!("{value:?}") };
        let counts = match value {
            Value::Integer(n) => vec![Some(u32::try_from(*n).map_err(|_e| malformed())?)],
            Value::Array(Array::Integer(values)) => values.iter()
                .map(|v| v.map(|n| u32::try_from(n).map_err(|_e| malformed())).transpose())
                .collect::<Result<_, _>>()?,
            Value::String(text) => text.split(',')
                .map(|entry| if entry == "." { Ok(None) } else { parse_u32(key, entry).map(Some) })
                .collect::<Result<_, _>>()?,
            Value::Array(Array::String(values)) => values.iter()
                .map(|v| v.as_deref().map(|entry| parse_u32(key, entry)).transpose())
                .collect::<Result<_, _>>()?,
            _ => return Err(malformed())
        };
        Ok(Some(counts))
    }

    /// A single count, lists are malformed
    fn parse_count(&self, key: &str) -> Result<Option<u32>, MetricError> {
        match self.parse_count_list(key)? {
            None => Ok(None),
            Some(counts) if counts.len() == 1 => Ok(counts[0]),
            Some(counts) => Err(MetricError::Malformed { field: key.to_string(), value: format!("{counts:?}") })
        }
    }

    /// Strelka tier pairs are "tier1,tier2"; we always report tier 1
    fn parse_tier1(&self, key: &str) -> Result<Option<u32>, MetricError> {
        Ok(self.parse_count_list(key)?
            .and_then(|tiers| tiers.first().copied().flatten()))
    }
}

fn parse_u32(field: &str, value: &str) -> Result<u32, MetricError> {
    value.trim().parse::<u32>()
        .map_err(|_e| MetricError::Malformed { field: field.to_string(), value: value.to_string() })
}

fn sum_counts(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    Some(a?.saturating_add(b?))
}

impl PointCaller {
    /// Pulls the REF/ALT/depth read counts out of a sample column using this caller's field layout.
    /// # Arguments
    /// * `reference` - the REF allele of the record
    /// * `alternate` - the ALT allele these counts are for
    /// * `alt_index` - 1-based index of `alternate` in the ALT column
    /// * `fields` - the FORMAT/sample view for one sample
    /// # Errors
    /// * if a count field is present but not a non-negative integer
    /// * if a per-allele list is too short for `alt_index`
    pub fn extract_metrics(&self, reference: &str, alternate: &str, alt_index: usize, fields: &SampleFields) -> Result<SampleMetrics, MetricError> {
        match self {
            PointCaller::Museq => {
                let ref_count = fields.parse_count("RC")?;
                let alt_count = fields.parse_count("AC")?;
                let depth = match fields.parse_count("DP")? {
                    Some(dp) => Some(dp),
                    None => sum_counts(ref_count, alt_count)
                };
                Ok(SampleMetrics::new(ref_count, alt_count, depth))
            },
            PointCaller::Strelka => {
                let (ref_count, alt_count) = if reference.len() != alternate.len() {
                    // indel records
                    (fields.parse_tier1("TAR")?, fields.parse_tier1("TIR")?)
                } else {
                    let ref_key = base_count_key(reference);
                    let alt_key = base_count_key(alternate);
                    (fields.parse_tier1(&ref_key)?, fields.parse_tier1(&alt_key)?)
                };
                let depth = fields.parse_count("DP")?;
                Ok(SampleMetrics::new(ref_count, alt_count, depth))
            },
            PointCaller::Mutect => {
                let (ref_count, alt_count, ad_sum) = match fields.parse_count_list("AD")? {
                    Some(ad) => {
                        if ad.len() <= alt_index {
                            return Err(MetricError::MissingAllele { field: "AD".to_string(), alt_index });
                        }
                        let total = ad.iter().try_fold(0u32, |acc, c| c.map(|v| acc.saturating_add(v)));
                        (ad[0], ad[alt_index], total)
                    },
                    None => (None, None, None)
                };
                let depth = fields.parse_count("DP")?.or(ad_sum);
                Ok(SampleMetrics::new(ref_count, alt_count, depth))
            },
            PointCaller::Freebayes => {
                let ref_count = fields.parse_count("RO")?;
                let alt_count = match fields.parse_count_list("AO")? {
                    Some(ao) => {
                        *ao.get(alt_index - 1)
                            .ok_or(MetricError::MissingAllele { field: "AO".to_string(), alt_index })?
                    },
                    None => None
                };
                let depth = fields.parse_count("DP")?;
                Ok(SampleMetrics::new(ref_count, alt_count, depth))
            }
        }
    }
}

/// Strelka base count key, e.g. "A" -> "AU"
fn base_count_key(allele: &str) -> String {
    let base = allele.chars().next().unwrap_or('N').to_ascii_uppercase();
    format!("{base}U")
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodles::vcf::variant::record_buf::samples::Keys;
    use noodles::vcf::variant::record_buf::Samples;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_caller_labels() {
        assert_eq!(PointCaller::Museq.to_string(), "museq");
        assert_eq!(PointCaller::from_str("Mutect").unwrap(), PointCaller::Mutect);
        assert_eq!(BreakpointCaller::from_str("destruct").unwrap(), BreakpointCaller::Destruct);
        assert_eq!(PointCaller::iter().count(), 4);
    }

    fn samples(keys: &[&str], values: Vec<Option<Value>>) -> Samples {
        let keys: Keys = keys.iter().map(|k| k.to_string()).collect();
        Samples::new(keys, vec![values])
    }

    fn text(value: &str) -> Option<Value> {
        Some(Value::from(value))
    }

    #[test]
    fn test_sample_fields() {
        let ad = Value::Array(Array::Integer(vec![Some(10), Some(5)]));
        let samples = self::samples(&["GT", "AD", "DP", "XX"], vec![text("0/1"), Some(ad.clone()), None]);
        let fields = SampleFields::new(samples.get_index(0).unwrap());
        assert_eq!(fields.get("AD"), Some(&ad));
        assert_eq!(fields.get("DP"), None);
        assert_eq!(fields.get("XX"), None);
        assert_eq!(fields.get("ZZ"), None);
        assert_eq!(fields.parse_count_list("AD").unwrap(), Some(vec![Some(10), Some(5)]));
    }

    #[test]
    fn test_museq_metrics() {
        // undeclared FORMAT fields come through as text
        let samples = self::samples(&["RC", "AC", "NI"], vec![text("20"), text("7"), text("0")]);
        let fields = SampleFields::new(samples.get_index(0).unwrap());
        let metrics = PointCaller::Museq.extract_metrics("A", "T", 1, &fields).unwrap();
        assert_eq!(metrics, SampleMetrics::new(Some(20), Some(7), Some(27)));
    }

    #[test]
    fn test_strelka_metrics() {
        let samples = self::samples(
            &["DP", "FDP", "AU", "CU", "GU", "TU"],
            vec![Some(Value::Integer(30)), Some(Value::Integer(0)), text("20,21"), text("0,0"), text("0,0"), text("10,12")]
        );
        let fields = SampleFields::new(samples.get_index(0).unwrap());
        let metrics = PointCaller::Strelka.extract_metrics("A", "T", 1, &fields).unwrap();
        assert_eq!(metrics, SampleMetrics::new(Some(20), Some(10), Some(30)));

        let samples = self::samples(
            &["DP", "TAR", "TIR"],
            vec![Some(Value::Integer(25)), Some(Value::Array(Array::Integer(vec![Some(18), Some(19)]))), text("6,6")]
        );
        let fields = SampleFields::new(samples.get_index(0).unwrap());
        let metrics = PointCaller::Strelka.extract_metrics("AT", "A", 1, &fields).unwrap();
        assert_eq!(metrics, SampleMetrics::new(Some(18), Some(6), Some(25)));
    }

    #[test]
    fn test_mutect_metrics() {
        let samples = self::samples(
            &["GT", "AD"],
            vec![text("0/1/2"), Some(Value::Array(Array::Integer(vec![Some(10), Some(4), Some(3)])))]
        );
        let fields = SampleFields::new(samples.get_index(0).unwrap());
        let metrics = PointCaller::Mutect.extract_metrics("A", "G", 2, &fields).unwrap();
        assert_eq!(metrics, SampleMetrics::new(Some(10), Some(3), Some(17)));

        let err = PointCaller::Mutect.extract_metrics("A", "G", 3, &fields).unwrap_err();
        assert_eq!(err, MetricError::MissingAllele { field: "AD".to_string(), alt_index: 3 });
    }

    #[test]
    fn test_freebayes_metrics() {
        let samples = self::samples(&["GT", "DP", "RO", "AO"], vec![text("0/1"), Some(Value::Integer(16)), text("9,"), text("x")]);
        let fields = SampleFields::new(samples.get_index(0).unwrap());
        let err = PointCaller::Freebayes.extract_metrics("A", "C", 1, &fields).unwrap_err();
        assert!(matches!(err, MetricError::Malformed { .. }));

        // negative integers are not counts
        let samples = self::samples(&["RO"], vec![Some(Value::Integer(-1))]);
        let fields = SampleFields::new(samples.get_index(0).unwrap());
        assert!(PointCaller::Freebayes.extract_metrics("A", "C", 1, &fields).is_err());

        let samples = self::samples(
            &["GT", "DP", "RO", "AO"],
            vec![text("0/1"), Some(Value::Integer(16)), Some(Value::Integer(9)), Some(Value::Array(Array::Integer(vec![Some(4), Some(3)])))]
        );
        let fields = SampleFields::new(samples.get_index(0).unwrap());
        let metrics = PointCaller::Freebayes.extract_metrics("A", "C", 2, &fields).unwrap();
        assert_eq!(metrics, SampleMetrics::new(Some(9), Some(3), Some(16)));
    }

    #[test]
    fn test_layout_resolution() {
        let samples = vec!["NORMAL".to_string(), "TUMOR".to_string()];
        let layout = SampleLayout::Somatic { tumor: "patient_t".to_string(), normal: "patient_n".to_string() };
        assert_eq!(layout.resolve(&samples).unwrap(), vec![(SampleRole::Tumor, 1), (SampleRole::Normal, 0)]);

        let germline = SampleLayout::Germline { sample: Some("HG002".to_string()) };
        assert!(germline.resolve(&samples).is_err());
        assert_eq!(SampleLayout::default().resolve(&samples).unwrap(), vec![(SampleRole::Sample, 0)]);
        assert!(SampleLayout::default().resolve(&[]).unwrap().is_empty());
    }
}
