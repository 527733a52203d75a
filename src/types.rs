use serde::{Deserialize, Serialize};

/// ABO blood group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AboGroup {
    A,
    B,
    Ab,
    O,
}

/// Rh factor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RhFactor {
    Positive,
    Negative,
}

/// Parsed blood type, e.g. "A+", "O-", "AB"
///
/// The Rh factor is optional: a bare ABO group ("A") is a valid entry and is
/// treated as Rh-unspecified rather than rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BloodType {
    pub abo: AboGroup,
    pub rh: Option<RhFactor>,
}

impl BloodType {
    /// Parse a raw blood type entry. Returns `None` for anything that is not
    /// one of A/B/AB/O with an optional +/- suffix (fail closed).
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().to_uppercase();
        if trimmed.is_empty() {
            return None;
        }

        let (abo_str, rh) = if let Some(stripped) = trimmed.strip_suffix('+') {
            (stripped, Some(RhFactor::Positive))
        } else if let Some(stripped) = trimmed.strip_suffix('-') {
            (stripped, Some(RhFactor::Negative))
        } else {
            (trimmed.as_str(), None)
        };

        let abo = match abo_str {
            "A" => AboGroup::A,
            "B" => AboGroup::B,
            "AB" => AboGroup::Ab,
            "O" => AboGroup::O,
            _ => return None,
        };

        Some(Self { abo, rh })
    }

    /// O- donors are compatible with every recipient blood type.
    pub fn is_universal_donor(&self) -> bool {
        self.abo == AboGroup::O && self.rh == Some(RhFactor::Negative)
    }
}

/// HLA typing across the six loci, as entered: each locus holds a delimited
/// list of allele codes ("A1, A2"). Parsing into comparable allele sets
/// happens in [`crate::hla`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HlaTyping {
    pub hla_a: String,
    pub hla_b: String,
    pub hla_c: String,
    #[serde(rename = "hlaDR")]
    pub hla_dr: String,
    #[serde(rename = "hlaDQ")]
    pub hla_dq: String,
    #[serde(rename = "hlaDP")]
    pub hla_dp: String,
}

/// Donor-specific antibody lab result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DsaResult {
    pub detected: bool,
    pub specificities: String,
    pub strength: String,
}

/// Donor availability lifecycle. Registration leaves a donor `Available`;
/// the surrounding application flips it to `Utilized` after transplant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DonorStatus {
    #[default]
    Available,
    Utilized,
    #[serde(other)]
    Unknown,
}

/// A kidney donor candidate record, in the shape supplied by the external
/// record store. Identity fields are display-only; matching reads blood type,
/// HLA typing and the crossmatch/DSA lab results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    pub id: String,
    #[serde(default)]
    pub mrn: String,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub blood_type: String,
    #[serde(default)]
    pub hla_typing: HlaTyping,
    /// Actual lab crossmatch result. Absent or empty means no lab result was
    /// recorded; any non-empty value other than "Positive" counts as a
    /// compatible actual result.
    #[serde(default)]
    pub crossmatch_result: Option<String>,
    #[serde(default)]
    pub dsa_result: Option<DsaResult>,
    #[serde(default, deserialize_with = "crate::records::string_or_list")]
    pub donor_antibodies: Vec<String>,
    #[serde(default)]
    pub status: DonorStatus,
}

impl Donor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mrn: String::new(),
            national_id: String::new(),
            full_name: String::new(),
            age: None,
            blood_type: String::new(),
            hla_typing: HlaTyping::default(),
            crossmatch_result: None,
            dsa_result: None,
            donor_antibodies: Vec::new(),
            status: DonorStatus::Available,
        }
    }

    /// True when a DSA lab result is present and flagged as detected.
    pub fn dsa_detected(&self) -> bool {
        self.dsa_result.as_ref().map(|d| d.detected).unwrap_or(false)
    }

    /// The recorded actual crossmatch result, if any non-empty value exists.
    pub fn actual_crossmatch(&self) -> Option<&str> {
        self.crossmatch_result
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A kidney transplant candidate record. The HLA typing is the comparison
/// baseline; unacceptable antigens and PRA drive the exclusion rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: String,
    #[serde(default)]
    pub mrn: String,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub blood_type: String,
    #[serde(default)]
    pub hla_typing: HlaTyping,
    /// Allele codes that must never appear in an accepted donor.
    #[serde(default, deserialize_with = "crate::records::string_or_list")]
    pub unacceptable_antigens: Vec<String>,
    /// Panel Reactive Antibody percentage, clamped to [0, 100] at ingestion.
    #[serde(default)]
    pub pra: f32,
    #[serde(default)]
    pub crossmatch_requirement: String,
    #[serde(default, deserialize_with = "crate::records::string_or_list")]
    pub donor_antibodies: Vec<String>,
}

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mrn: String::new(),
            national_id: String::new(),
            full_name: String::new(),
            age: None,
            blood_type: String::new(),
            hla_typing: HlaTyping::default(),
            unacceptable_antigens: Vec::new(),
            pra: 0.0,
            crossmatch_requirement: String::new(),
            donor_antibodies: Vec::new(),
        }
    }

    pub fn is_pediatric(&self) -> bool {
        self.age.map(|a| a < 18).unwrap_or(false)
    }
}

/// How the effective crossmatch compatibility was determined
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CrossmatchMethod {
    /// An actual lab crossmatch result was on file
    Actual,
    /// No lab result; estimated from the recipient's PRA
    Virtual,
}

impl std::fmt::Display for CrossmatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrossmatchMethod::Actual => write!(f, "Actual Lab Result"),
            CrossmatchMethod::Virtual => write!(f, "Virtual (PRA-based)"),
        }
    }
}

/// Allele comparison detail for one locus
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocusMatch {
    pub donor_alleles: Vec<String>,
    pub recipient_alleles: Vec<String>,
    pub matched_alleles: Vec<String>,
}

/// Per-locus HLA comparison for all six loci plus the aggregate counts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HlaMatchDetails {
    pub hla_a: LocusMatch,
    pub hla_b: LocusMatch,
    pub hla_c: LocusMatch,
    pub hla_dr: LocusMatch,
    pub hla_dq: LocusMatch,
    pub hla_dp: LocusMatch,
    /// Matched alleles across the A, B and DR loci only (uncapped)
    pub primary_match_count: u32,
    /// Matched alleles across all six loci
    pub total_detailed_match_count: u32,
    /// Number of loci (0-6) with at least one matched allele
    pub loci_with_match_count: u32,
}

/// An unacceptable antigen found in the donor typing, with the locus it was
/// seen at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AntigenHit {
    pub antigen: String,
    pub locus: String,
}

/// Everything the evaluation observed about one donor, for reporting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    pub blood_type_match: bool,
    pub hla_matches: Option<HlaMatchDetails>,
    /// Primary match count (A, B, DR), duplicated here for consumers that do
    /// not read the per-locus detail
    pub hla_match_count: u32,
    pub hla_total_detailed_match_count: u32,
    pub hla_loci_match_count: u32,
    pub crossmatch_compatible: bool,
    pub has_unacceptable_antigens: bool,
    pub unacceptable_antigens_details: Vec<AntigenHit>,
    pub pra_compatible: bool,
    pub is_pediatric: bool,
    pub potential_positive_crossmatch: bool,
}

impl MatchDetails {
    /// Initial state before any check has run. Crossmatch and PRA start
    /// compatible; the exclusion checks and the resolver overwrite them.
    pub fn for_recipient(recipient: &Recipient) -> Self {
        Self {
            blood_type_match: false,
            hla_matches: None,
            hla_match_count: 0,
            hla_total_detailed_match_count: 0,
            hla_loci_match_count: 0,
            crossmatch_compatible: true,
            has_unacceptable_antigens: false,
            unacceptable_antigens_details: Vec::new(),
            pra_compatible: true,
            is_pediatric: recipient.is_pediatric(),
            potential_positive_crossmatch: false,
        }
    }
}

/// Outcome of evaluating one donor against the recipient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub donor: Donor,
    /// 0-100 integer scale
    pub compatibility_score: u32,
    pub is_compatible: bool,
    pub exclusion_reason: Option<String>,
    pub match_details: MatchDetails,
}
