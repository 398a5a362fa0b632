/*!
# Allele normalization
Reduces a REF/ALT pair to its minimal left-anchored form so that the same event reported with different padding by different callers compares equal.

Shared trailing bases are trimmed while both alleles are longer than one base.
The first base is never removed, so positions are unchanged by normalization.

## Example usage
```rust
use quorum::normalize::normalize;

assert_eq!(normalize("GTA", "GTATA").unwrap(), ("G".to_string(), "GTA".to_string()));
assert_eq!(normalize("T", "C").unwrap(), ("T".to_string(), "C".to_string()));
assert_eq!(normalize("TAC", "TAC").unwrap(), ("T".to_string(), "T".to_string()));
```
*/
use crate::errors::NormalizationError;

/// Normalizes a single REF/ALT pair.
/// Pairs of equal length are only trimmed on the right, so SNVs and MNVs that differ at their first base pass through unchanged.
/// # Arguments
/// * `reference` - the REF allele
/// * `alternate` - a single ALT allele
/// # Errors
/// * if either allele is empty
/// * if either allele is symbolic (`<DEL>`), a breakend, or a placeholder (`*`, `.`)
/// * if the alleles differ in length after trimming but do not share a first (anchor) base
pub fn normalize(reference: &str, alternate: &str) -> Result<(String, String), NormalizationError> {
    check_allele(reference)?;
    check_allele(alternate)?;

    let ref_bytes = reference.as_bytes();
    let alt_bytes = alternate.as_bytes();
    let mut ref_len = ref_bytes.len();
    let mut alt_len = alt_bytes.len();

    // trim shared suffix, always keeping at least one base on each side
    while ref_len > 1 && alt_len > 1 && ref_bytes[ref_len - 1].eq_ignore_ascii_case(&alt_bytes[alt_len - 1]) {
        ref_len -= 1;
        alt_len -= 1;
    }

    if ref_len != alt_len && !ref_bytes[0].eq_ignore_ascii_case(&alt_bytes[0]) {
        return Err(NormalizationError::MissingAnchor);
    }

    Ok((
        reference[..ref_len].to_ascii_uppercase(),
        alternate[..alt_len].to_ascii_uppercase()
    ))
}

fn check_allele(allele: &str) -> Result<(), NormalizationError> {
    if allele.is_empty() {
        return Err(NormalizationError::EmptyAllele);
    }
    let is_sequence = allele.bytes().all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'));
    if !is_sequence {
        return Err(NormalizationError::SymbolicAllele { allele: allele.to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(r: &str, a: &str) -> (String, String) {
        normalize(r, a).unwrap()
    }

    #[test]
    fn test_documented_examples() {
        assert_eq!(norm("GTA", "GTATA"), ("G".to_string(), "GTA".to_string()));
        assert_eq!(norm("T", "C"), ("T".to_string(), "C".to_string()));
        assert_eq!(norm("TAC", "TAC"), ("T".to_string(), "T".to_string()));
    }

    #[test]
    fn test_padding_is_removed() {
        // same deletion with and without trailing padding
        assert_eq!(norm("ACGT", "AGT"), norm("ACG", "AG"));
        assert_eq!(norm("ACG", "AG"), ("AC".to_string(), "A".to_string()));

        // MNV differing at the first base is left as-is
        assert_eq!(norm("AC", "GT"), ("AC".to_string(), "GT".to_string()));

        // case is not significant
        assert_eq!(norm("acgt", "AGT"), ("AC".to_string(), "A".to_string()));
    }

    #[test]
    fn test_idempotence() {
        let pairs = [
            ("GTA", "GTATA"), ("T", "C"), ("TAC", "TAC"), ("ACGT", "AGT"),
            ("AC", "GT"), ("CTTT", "CT"), ("G", "GAAAC"), ("ATG", "ATC"),
            ("AAAA", "AAAAAA"), ("N", "A")
        ];
        for (r, a) in pairs {
            let (r1, a1) = norm(r, a);
            let (r2, a2) = norm(&r1, &a1);
            assert_eq!((r1, a1), (r2, a2), "not idempotent for {r}>{a}");
        }
    }

    #[test]
    fn test_missing_anchor() {
        assert_eq!(normalize("A", "CT"), Err(NormalizationError::MissingAnchor));
        assert_eq!(normalize("AT", "T"), Err(NormalizationError::MissingAnchor));
        assert_eq!(normalize("CAG", "TTAG"), Err(NormalizationError::MissingAnchor));
    }

    #[test]
    fn test_invalid_alleles() {
        assert_eq!(normalize("", "A"), Err(NormalizationError::EmptyAllele));
        assert_eq!(normalize("A", "<DEL>"), Err(NormalizationError::SymbolicAllele { allele: "<DEL>".to_string() }));
        assert!(normalize("A", "*").is_err());
        assert!(normalize("A", "A[chr2:100[").is_err());
    }
}
