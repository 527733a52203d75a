use rayon::prelude::*;
use tracing::debug;

use crate::hla::Locus;
use crate::policy::MatchPolicy;
use crate::types::*;

/// ABO/Rh compatibility between raw blood type entries.
///
/// Unparseable entries on either side are incompatible. O- donors pass for
/// every recipient; otherwise the standard ABO donation table applies and an
/// Rh-negative recipient rejects an Rh-positive donor.
pub fn is_blood_type_compatible(donor: &str, recipient: &str) -> bool {
    let donor = match BloodType::parse(donor) {
        Some(parsed) => parsed,
        None => return false,
    };
    let recipient = match BloodType::parse(recipient) {
        Some(parsed) => parsed,
        None => return false,
    };

    if donor.is_universal_donor() {
        return true;
    }

    let abo_compatible = match recipient.abo {
        AboGroup::O => donor.abo == AboGroup::O,
        AboGroup::A => matches!(donor.abo, AboGroup::A | AboGroup::O),
        AboGroup::B => matches!(donor.abo, AboGroup::B | AboGroup::O),
        AboGroup::Ab => true,
    };
    if !abo_compatible {
        return false;
    }

    if recipient.rh == Some(RhFactor::Negative) && donor.rh == Some(RhFactor::Positive) {
        return false;
    }
    true
}

/// Result of screening a donor typing against a recipient's unacceptable
/// antigen list
#[derive(Debug, Clone, Default)]
pub struct AntigenScreen {
    pub has_unacceptable: bool,
    pub details: Vec<AntigenHit>,
}

/// Check every donor locus for alleles on the recipient's unacceptable list.
/// Hits are deduplicated by (antigen, locus). An empty list never matches.
pub fn screen_unacceptable_antigens(
    donor_typing: &HlaTyping,
    unacceptable: &[String],
) -> AntigenScreen {
    let cleaned: Vec<String> = unacceptable
        .iter()
        .map(|ua| ua.trim().to_uppercase())
        .filter(|ua| !ua.is_empty())
        .collect();
    if cleaned.is_empty() {
        return AntigenScreen::default();
    }

    let mut details: Vec<AntigenHit> = Vec::new();
    for locus in Locus::ALL {
        for allele in donor_typing.alleles(locus) {
            if cleaned.contains(&allele) {
                let hit = AntigenHit {
                    antigen: allele,
                    locus: locus.key().to_string(),
                };
                if !details.contains(&hit) {
                    details.push(hit);
                }
            }
        }
    }

    AntigenScreen {
        has_unacceptable: !details.is_empty(),
        details,
    }
}

/// Compare donor and recipient typings locus by locus.
///
/// Matching is exact string equality after normalization; no per-locus cap is
/// applied, so a locus with three shared alleles contributes three.
pub fn match_hla(donor: &HlaTyping, recipient: &HlaTyping) -> HlaMatchDetails {
    let mut details = HlaMatchDetails::default();

    for locus in Locus::ALL {
        let recipient_alleles = recipient.alleles(locus);
        let donor_alleles = donor.alleles(locus);
        let matched_alleles: Vec<String> = recipient_alleles
            .iter()
            .filter(|allele| donor_alleles.contains(allele))
            .cloned()
            .collect();

        let matched = matched_alleles.len() as u32;
        if locus.is_primary() {
            details.primary_match_count += matched;
        }
        details.total_detailed_match_count += matched;
        if matched > 0 {
            details.loci_with_match_count += 1;
        }

        *details.locus_mut(locus) = LocusMatch {
            donor_alleles,
            recipient_alleles,
            matched_alleles,
        };
    }

    details
}

/// Effective crossmatch compatibility once the hard exclusions (DSA, actual
/// positive) have already been ruled out
#[derive(Debug, Clone, Copy)]
pub struct CrossmatchResolution {
    pub compatible: bool,
    pub method: CrossmatchMethod,
    pub pra_compatible: bool,
    pub potential_positive: bool,
}

/// Resolve the remaining crossmatch chain: a non-positive actual lab result
/// on file is compatible; with no lab result, fall back to the virtual
/// (PRA-based) estimate, compatible iff PRA is at or below the threshold.
pub fn resolve_crossmatch(
    actual_result: Option<&str>,
    pra: f32,
    pra_threshold: f32,
) -> CrossmatchResolution {
    match actual_result {
        Some(result) => CrossmatchResolution {
            compatible: !result.eq_ignore_ascii_case("positive"),
            method: CrossmatchMethod::Actual,
            pra_compatible: true,
            potential_positive: false,
        },
        None => {
            let pra_compatible = pra <= pra_threshold;
            CrossmatchResolution {
                compatible: pra_compatible,
                method: CrossmatchMethod::Virtual,
                pra_compatible,
                potential_positive: !pra_compatible,
            }
        }
    }
}

/// Combine the check outcomes into the 0-100 score: blood type contributes
/// 40, each primary HLA match 10, crossmatch +20 or -30, clamped.
pub fn compatibility_score(
    blood_type_match: bool,
    primary_hla_matches: u32,
    crossmatch_compatible: bool,
) -> u32 {
    if !blood_type_match {
        return 0;
    }

    let mut score: i32 = 40;
    score += primary_hla_matches as i32 * 10;
    score += if crossmatch_compatible { 20 } else { -30 };
    score.clamp(0, 100) as u32
}

/// Hard exclusion rules, evaluated per donor in this exact order. The first
/// rule that fires rejects the donor with score 0 and no later check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardExclusion {
    UnacceptableAntigen,
    BloodTypeIncompatible,
    ActualCrossmatchPositive,
    DsaDetected,
}

impl HardExclusion {
    pub const ORDER: [HardExclusion; 4] = [
        HardExclusion::UnacceptableAntigen,
        HardExclusion::BloodTypeIncompatible,
        HardExclusion::ActualCrossmatchPositive,
        HardExclusion::DsaDetected,
    ];

    /// Run one rule, recording what it observed in the details. Returns the
    /// exclusion reason when the rule fires.
    fn apply(
        self,
        recipient: &Recipient,
        donor: &Donor,
        details: &mut MatchDetails,
    ) -> Option<String> {
        match self {
            HardExclusion::UnacceptableAntigen => {
                let screen = screen_unacceptable_antigens(
                    &donor.hla_typing,
                    &recipient.unacceptable_antigens,
                );
                details.has_unacceptable_antigens = screen.has_unacceptable;
                details.unacceptable_antigens_details = screen.details;
                if details.has_unacceptable_antigens {
                    Some("Incompatible – Unacceptable Antigen Present".to_string())
                } else {
                    None
                }
            }
            HardExclusion::BloodTypeIncompatible => {
                details.blood_type_match =
                    is_blood_type_compatible(&donor.blood_type, &recipient.blood_type);
                if details.blood_type_match {
                    None
                } else {
                    Some("Blood type incompatible".to_string())
                }
            }
            HardExclusion::ActualCrossmatchPositive => {
                if let Some(result) = donor.actual_crossmatch() {
                    if result.eq_ignore_ascii_case("positive") {
                        details.crossmatch_compatible = false;
                        return Some("Actual crossmatch positive".to_string());
                    }
                    details.crossmatch_compatible = true;
                }
                None
            }
            HardExclusion::DsaDetected => {
                let dsa = donor.dsa_result.as_ref().filter(|d| d.detected)?;
                details.potential_positive_crossmatch = true;
                let specificities = match dsa.specificities.trim() {
                    "" => "N/A",
                    s => s,
                };
                let strength = match dsa.strength.trim() {
                    "" => "N/A",
                    s => s,
                };
                Some(format!(
                    "Donor-Specific Antibodies (DSA) detected. Specificities: {}, Strength: {}",
                    specificities, strength
                ))
            }
        }
    }
}

/// Donor-recipient match evaluator.
///
/// Runs every donor through the hard exclusion pipeline, HLA matching,
/// crossmatch resolution and scoring, then ranks the results. Evaluations
/// are pure and independent, so donors are processed in parallel.
pub struct MatchEvaluator {
    policy: MatchPolicy,
}

impl MatchEvaluator {
    pub fn new() -> Self {
        Self {
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Evaluate all donors against the recipient and return every result,
    /// compatible and incompatible both, sorted descending by score.
    pub fn evaluate(&self, recipient: &Recipient, donors: &[Donor]) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = donors
            .par_iter()
            .map(|donor| self.evaluate_donor(recipient, donor))
            .collect();

        // stable sort keeps donor order within equal scores
        results.sort_by(|a, b| b.compatibility_score.cmp(&a.compatibility_score));
        results
    }

    /// Evaluate a single donor in the fixed check order.
    pub fn evaluate_donor(&self, recipient: &Recipient, donor: &Donor) -> MatchResult {
        let mut details = MatchDetails::for_recipient(recipient);

        for rule in HardExclusion::ORDER {
            if let Some(reason) = rule.apply(recipient, donor, &mut details) {
                debug!(donor = %donor.id, rule = ?rule, "donor excluded");
                return MatchResult {
                    donor: donor.clone(),
                    compatibility_score: 0,
                    is_compatible: false,
                    exclusion_reason: Some(reason),
                    match_details: details,
                };
            }
        }

        let hla = match_hla(&donor.hla_typing, &recipient.hla_typing);
        let primary_matches = hla.primary_match_count;
        details.hla_match_count = hla.primary_match_count;
        details.hla_total_detailed_match_count = hla.total_detailed_match_count;
        details.hla_loci_match_count = hla.loci_with_match_count;
        details.hla_matches = Some(hla);

        let resolution = resolve_crossmatch(
            donor.actual_crossmatch(),
            recipient.pra,
            self.policy.virtual_crossmatch_pra_threshold,
        );
        if resolution.method == CrossmatchMethod::Virtual {
            details.pra_compatible = resolution.pra_compatible;
            details.crossmatch_compatible = resolution.compatible;
            if resolution.potential_positive {
                details.potential_positive_crossmatch = true;
            }
        }

        // blood type passed above, so it contributes its full 40 points
        let score = compatibility_score(
            details.blood_type_match,
            primary_matches,
            details.crossmatch_compatible,
        );

        let (is_compatible, exclusion_reason) = if primary_matches
            < self.policy.min_primary_hla_matches
        {
            (
                false,
                Some(format!(
                    "Insufficient primary HLA matches: {}/6 (A, B, DR). Minimum {} required.",
                    primary_matches, self.policy.min_primary_hla_matches
                )),
            )
        } else if !details.crossmatch_compatible {
            (
                false,
                Some(format!(
                    "Crossmatch incompatible (Method: {})",
                    resolution.method
                )),
            )
        } else if score < self.policy.min_compatibility_score {
            (false, Some("Compatibility score below threshold".to_string()))
        } else {
            (true, None)
        };

        debug!(
            donor = %donor.id,
            score,
            primary_matches,
            is_compatible,
            "donor evaluated"
        );

        MatchResult {
            donor: donor.clone(),
            compatibility_score: score,
            is_compatible,
            exclusion_reason,
            match_details: details,
        }
    }
}

impl Default for MatchEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
