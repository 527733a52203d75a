use kidney_match::{
    matching::MatchEvaluator, policy::MatchPolicy, registry::MatchRegistry,
    report::ReportGenerator, report::ReportFormat, types::*,
};
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

fn typing(a: &str, b: &str, c: &str, dr: &str, dq: &str, dp: &str) -> HlaTyping {
    HlaTyping {
        hla_a: a.to_string(),
        hla_b: b.to_string(),
        hla_c: c.to_string(),
        hla_dr: dr.to_string(),
        hla_dq: dq.to_string(),
        hla_dp: dp.to_string(),
    }
}

fn recipient_a_plus() -> Recipient {
    let mut recipient = Recipient::new("r-1");
    recipient.blood_type = "A+".to_string();
    recipient.hla_typing = typing("A1,A2", "B7", "", "DR4", "", "");
    recipient.pra = 10.0;
    recipient
}

// Universal O- donor, identical typing, low PRA: four primary matches give a
// clamped perfect score.
#[test]
fn test_ideal_universal_donor_scores_100() {
    let recipient = recipient_a_plus();
    let mut donor = Donor::new("d-1");
    donor.blood_type = "O-".to_string();
    donor.hla_typing = recipient.hla_typing.clone();

    let results = MatchEvaluator::new().evaluate(&recipient, &[donor]);
    assert_eq!(results.len(), 1);

    let result = &results[0];
    assert!(result.is_compatible);
    assert!(result.exclusion_reason.is_none());
    assert_eq!(result.compatibility_score, 100);

    let details = &result.match_details;
    assert!(details.blood_type_match);
    assert_eq!(details.hla_match_count, 4);
    assert_eq!(details.hla_total_detailed_match_count, 4);
    assert_eq!(details.hla_loci_match_count, 3);
    assert!(details.crossmatch_compatible);
    assert!(details.pra_compatible);
    assert!(!details.potential_positive_crossmatch);
}

// AB+ can never donate to O-: excluded on blood type with no HLA detail.
#[test]
fn test_blood_type_exclusion_short_circuits() {
    let mut recipient = Recipient::new("r-2");
    recipient.blood_type = "O-".to_string();
    let mut donor = Donor::new("d-2");
    donor.blood_type = "AB+".to_string();
    donor.hla_typing = typing("A1", "B7", "", "DR4", "", "");

    let results = MatchEvaluator::new().evaluate(&recipient, &[donor]);
    let result = &results[0];
    assert!(!result.is_compatible);
    assert_eq!(result.compatibility_score, 0);
    assert_eq!(
        result.exclusion_reason.as_deref(),
        Some("Blood type incompatible")
    );
    assert!(result.match_details.hla_matches.is_none());
}

// An unacceptable antigen in the donor typing trumps everything else.
#[test]
fn test_unacceptable_antigen_exclusion_has_precedence() {
    let mut recipient = recipient_a_plus();
    recipient.unacceptable_antigens = vec!["B7".to_string()];
    let mut donor = Donor::new("d-3");
    donor.blood_type = "O-".to_string();
    donor.hla_typing = typing("A1,A2", "B7,B27", "", "DR4", "", "");

    let results = MatchEvaluator::new().evaluate(&recipient, &[donor]);
    let result = &results[0];
    assert!(!result.is_compatible);
    assert_eq!(result.compatibility_score, 0);
    assert!(result
        .exclusion_reason
        .as_deref()
        .unwrap()
        .contains("Unacceptable Antigen"));
    assert_eq!(
        result.match_details.unacceptable_antigens_details,
        vec![AntigenHit {
            antigen: "B7".to_string(),
            locus: "hlaB".to_string()
        }]
    );
}

// PRA above the virtual crossmatch threshold fails the donor even with
// enough primary HLA matches.
#[test]
fn test_high_pra_virtual_crossmatch_exclusion() {
    let mut recipient = recipient_a_plus();
    recipient.pra = 90.0;
    recipient.hla_typing = typing("A1", "B7", "", "DR4", "", "");
    let mut donor = Donor::new("d-4");
    donor.blood_type = "A+".to_string();
    donor.hla_typing = recipient.hla_typing.clone();

    let results = MatchEvaluator::new().evaluate(&recipient, &[donor]);
    let result = &results[0];
    assert!(!result.is_compatible);
    assert!(result
        .exclusion_reason
        .as_deref()
        .unwrap()
        .contains("Crossmatch incompatible"));

    let details = &result.match_details;
    assert_eq!(details.hla_match_count, 3);
    assert!(!details.crossmatch_compatible);
    assert!(!details.pra_compatible);
    assert!(details.potential_positive_crossmatch);
    // 40 + 30 - 30
    assert_eq!(result.compatibility_score, 40);
}

// A recorded negative lab crossmatch overrides the PRA estimate.
#[test]
fn test_actual_crossmatch_overrides_high_pra() {
    let mut recipient = recipient_a_plus();
    recipient.pra = 95.0;
    recipient.hla_typing = typing("A1", "B7", "", "DR4", "", "");
    let mut donor = Donor::new("d-5");
    donor.blood_type = "A+".to_string();
    donor.hla_typing = recipient.hla_typing.clone();
    donor.crossmatch_result = Some("Negative".to_string());

    let results = MatchEvaluator::new().evaluate(&recipient, &[donor]);
    let result = &results[0];
    assert!(result.is_compatible, "{:?}", result.exclusion_reason);
    assert_eq!(result.compatibility_score, 90);
    assert!(result.match_details.crossmatch_compatible);
}

#[test]
fn test_empty_donor_pool_is_not_an_error() {
    let recipient = recipient_a_plus();
    let results = MatchEvaluator::new().evaluate(&recipient, &[]);
    assert!(results.is_empty());
}

#[test]
fn test_scores_stay_in_bounds_and_sorted_across_pool() {
    let recipient = recipient_a_plus();

    let blood_types = ["O-", "O+", "A+", "A-", "B+", "AB+", ""];
    let typings = [
        typing("A1,A2", "B7", "", "DR4", "", ""),
        typing("A1", "", "", "", "", ""),
        typing("", "", "", "", "", ""),
        typing("A1,A2", "B7", "CW4", "DR4", "DQ2", "DP1"),
    ];

    let mut donors = Vec::new();
    for (i, blood_type) in blood_types.iter().enumerate() {
        for (j, hla) in typings.iter().enumerate() {
            let mut donor = Donor::new(format!("d-{}-{}", i, j));
            donor.blood_type = blood_type.to_string();
            donor.hla_typing = hla.clone();
            if (i + j) % 3 == 0 {
                donor.crossmatch_result = Some("Negative".to_string());
            }
            donors.push(donor);
        }
    }

    let results = MatchEvaluator::new().evaluate(&recipient, &donors);
    assert_eq!(results.len(), donors.len());
    for result in &results {
        assert!(result.compatibility_score <= 100);
        assert_eq!(
            result.is_compatible,
            result.exclusion_reason.is_none(),
            "verdict and reason must agree for {}",
            result.donor.id
        );
    }
    for pair in results.windows(2) {
        assert!(pair[0].compatibility_score >= pair[1].compatibility_score);
    }
}

// Thresholds come from the policy; a stricter primary minimum flips the
// verdict without touching the score.
#[test]
fn test_policy_thresholds_are_configurable() {
    let recipient = recipient_a_plus();
    let mut donor = Donor::new("d-6");
    donor.blood_type = "A+".to_string();
    donor.hla_typing = typing("A1", "B7", "", "DR4", "", "");

    let default_result = MatchEvaluator::new().evaluate_donor(&recipient, &donor);
    assert!(default_result.is_compatible);

    let strict = MatchPolicy {
        min_primary_hla_matches: 4,
        ..Default::default()
    };
    let strict_result = MatchEvaluator::with_policy(strict).evaluate_donor(&recipient, &donor);
    assert!(!strict_result.is_compatible);
    assert_eq!(
        strict_result.compatibility_score,
        default_result.compatibility_score
    );
}

// Full flow: records on disk -> registry -> evaluation -> reports.
#[test]
fn test_end_to_end_from_record_files() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let records_dir = temp_dir.path().join("records");
    std::fs::create_dir(&records_dir)?;

    let mut recipient_file = File::create(records_dir.join("recipient.json"))?;
    write!(
        recipient_file,
        r#"{{
            "id": "r-100",
            "fullName": "Recipient 100",
            "bloodType": "A+",
            "age": 34,
            "hlaTyping": {{"hlaA": "A1, A2", "hlaB": "B7", "hlaDR": "DR4"}},
            "pra": 10,
            "unacceptableAntigens": "B27"
        }}"#
    )?;

    let mut donors_file = File::create(records_dir.join("donors.json"))?;
    write!(
        donors_file,
        r#"[
            {{"id": "d-ideal", "bloodType": "O-",
              "hlaTyping": {{"hlaA": "A1, A2", "hlaB": "B7", "hlaDR": "DR4"}}}},
            {{"id": "d-antigen", "bloodType": "A+",
              "hlaTyping": {{"hlaA": "A1", "hlaB": "B27", "hlaDR": "DR4"}}}},
            {{"id": "d-utilized", "bloodType": "A+", "status": "Utilized",
              "hlaTyping": {{"hlaA": "A1, A2", "hlaB": "B7", "hlaDR": "DR4"}}}},
            {{"id": "d-dsa", "bloodType": "A+",
              "hlaTyping": {{"hlaA": "A1, A2", "hlaB": "B7", "hlaDR": "DR4"}},
              "dsaResult": {{"detected": true, "specificities": "DQ7", "strength": "MFI 3000"}}}}
        ]"#
    )?;

    let registry = MatchRegistry::new();
    registry.load_paths(&[records_dir], true)?;

    let recipient = registry.recipient("r-100")?;
    assert!(registry.recipient("r-missing").is_err());

    let donors = registry.available_donors();
    // the utilized donor never enters the pool
    assert_eq!(donors.len(), 3);

    let results = MatchEvaluator::new().evaluate(&recipient, &donors);
    assert_eq!(results.len(), 3);

    assert_eq!(results[0].donor.id, "d-ideal");
    assert!(results[0].is_compatible);
    assert_eq!(results[0].compatibility_score, 100);

    let antigen = results
        .iter()
        .find(|r| r.donor.id == "d-antigen")
        .expect("antigen donor evaluated");
    assert!(antigen
        .exclusion_reason
        .as_deref()
        .unwrap()
        .contains("Unacceptable Antigen"));

    let dsa = results
        .iter()
        .find(|r| r.donor.id == "d-dsa")
        .expect("dsa donor evaluated");
    assert!(dsa.exclusion_reason.as_deref().unwrap().contains("DSA"));

    let reports_dir = temp_dir.path().join("reports");
    let generator = ReportGenerator::new(&reports_dir);
    generator.generate(&recipient, &results, ReportFormat::All)?;

    let extensions: Vec<String> = std::fs::read_dir(&reports_dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            e.path()
                .extension()
                .map(|ext| ext.to_string_lossy().to_string())
        })
        .collect();
    for expected in ["html", "csv", "json", "tsv"] {
        assert!(
            extensions.iter().any(|ext| ext == expected),
            "missing {} report",
            expected
        );
    }
    Ok(())
}
