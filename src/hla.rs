use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{HlaMatchDetails, HlaTyping, LocusMatch};

lazy_static! {
    // Allele codes look like "A2", "B27", "DR4", "DQB1*06:02"
    static ref ALLELE_CODE: Regex = Regex::new(r"^[A-Z]+[0-9A-Z*:]+$").unwrap();
}

/// The six HLA loci compared during matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locus {
    A,
    B,
    C,
    Dr,
    Dq,
    Dp,
}

impl Locus {
    /// Fixed comparison order, also the order used in reports
    pub const ALL: [Locus; 6] = [Locus::A, Locus::B, Locus::C, Locus::Dr, Locus::Dq, Locus::Dp];

    /// Field key as it appears in record files and match details
    pub fn key(&self) -> &'static str {
        match self {
            Locus::A => "hlaA",
            Locus::B => "hlaB",
            Locus::C => "hlaC",
            Locus::Dr => "hlaDR",
            Locus::Dq => "hlaDQ",
            Locus::Dp => "hlaDP",
        }
    }

    /// A, B and DR are the loci conventionally weighted in kidney matching;
    /// only their matches count toward the primary match total.
    pub fn is_primary(&self) -> bool {
        matches!(self, Locus::A | Locus::B | Locus::Dr)
    }
}

impl HlaTyping {
    /// Raw entry string for one locus
    pub fn locus(&self, locus: Locus) -> &str {
        match locus {
            Locus::A => &self.hla_a,
            Locus::B => &self.hla_b,
            Locus::C => &self.hla_c,
            Locus::Dr => &self.hla_dr,
            Locus::Dq => &self.hla_dq,
            Locus::Dp => &self.hla_dp,
        }
    }

    /// Normalized alleles for one locus
    pub fn alleles(&self, locus: Locus) -> Vec<String> {
        parse_alleles(self.locus(locus))
    }
}

impl HlaMatchDetails {
    pub fn locus(&self, locus: Locus) -> &LocusMatch {
        match locus {
            Locus::A => &self.hla_a,
            Locus::B => &self.hla_b,
            Locus::C => &self.hla_c,
            Locus::Dr => &self.hla_dr,
            Locus::Dq => &self.hla_dq,
            Locus::Dp => &self.hla_dp,
        }
    }

    pub fn locus_mut(&mut self, locus: Locus) -> &mut LocusMatch {
        match locus {
            Locus::A => &mut self.hla_a,
            Locus::B => &mut self.hla_b,
            Locus::C => &mut self.hla_c,
            Locus::Dr => &mut self.hla_dr,
            Locus::Dq => &mut self.hla_dq,
            Locus::Dp => &mut self.hla_dp,
        }
    }
}

/// Normalize one locus entry into a set of comparable allele codes.
///
/// Splits on commas, semicolons, slashes and whitespace; trims, uppercases
/// and drops empty tokens. Duplicates are removed (first occurrence wins) so
/// the result behaves as a set while keeping entry order. Malformed input
/// yields fewer tokens, never an error.
pub fn parse_alleles(raw: &str) -> Vec<String> {
    let mut alleles: Vec<String> = Vec::new();
    for token in raw.split(|c: char| c == ',' || c == ';' || c == '/' || c.is_whitespace()) {
        let normalized = token.trim().to_uppercase();
        if !normalized.is_empty() && !alleles.contains(&normalized) {
            alleles.push(normalized);
        }
    }
    alleles
}

/// Canonical display form: ", "-joined normalized alleles. Round-trips
/// through [`parse_alleles`] without change.
pub fn format_alleles(alleles: &[String]) -> String {
    alleles.join(", ")
}

/// Lenient shape check for typed-in HLA entries. Empty input is valid; a
/// non-empty entry is valid when every token looks like an allele code.
/// Ingestion warns on failures but never rejects the record.
pub fn is_valid_allele_list(raw: &str) -> bool {
    if raw.trim().is_empty() {
        return true;
    }
    parse_alleles(raw).iter().all(|a| ALLELE_CODE.is_match(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_all_separators() {
        assert_eq!(parse_alleles("A1,A2"), vec!["A1", "A2"]);
        assert_eq!(parse_alleles("A1; A2/ A3  A4"), vec!["A1", "A2", "A3", "A4"]);
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        assert_eq!(parse_alleles("  a1 , b7 "), vec!["A1", "B7"]);
    }

    #[test]
    fn test_parse_drops_duplicates_and_empties() {
        assert_eq!(parse_alleles("A1,,A1, a1 ,"), vec!["A1"]);
        assert!(parse_alleles("").is_empty());
        assert!(parse_alleles(" ,;/ ").is_empty());
    }

    #[test]
    fn test_parse_is_idempotent() {
        for raw in ["a1, a2", "B7;B27", "DR4 / DR15", "", "A1,,A1"] {
            let once = parse_alleles(raw);
            let twice = parse_alleles(&format_alleles(&once));
            assert_eq!(once, twice, "round-trip changed {:?}", raw);
        }
    }

    #[test]
    fn test_allele_validation() {
        assert!(is_valid_allele_list(""));
        assert!(is_valid_allele_list("A1, A2"));
        assert!(is_valid_allele_list("DQB1*06:02"));
        assert!(!is_valid_allele_list("A1, ???"));
    }

    #[test]
    fn test_locus_primary_set() {
        let primary: Vec<&str> = Locus::ALL
            .iter()
            .filter(|l| l.is_primary())
            .map(|l| l.key())
            .collect();
        assert_eq!(primary, vec!["hlaA", "hlaB", "hlaDR"]);
    }
}
