use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::hla;
use crate::records::normalize_donor;
use crate::types::{Donor, DonorStatus, DsaResult, HlaTyping};

/// Parser for donor roster spreadsheets exported as CSV or TSV.
///
/// Column headers are matched case-insensitively against the common
/// spellings; rows missing an id are skipped with a warning rather than
/// failing the whole roster.
pub struct DonorRosterParser;

impl DonorRosterParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, path: &Path) -> Result<Vec<Donor>> {
        let delimiter = if path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case("tsv"))
            .unwrap_or(false)
        {
            b'\t'
        } else {
            b','
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open donor roster: {}", path.display()))?;

        let headers = reader.headers()?.clone();
        let columns = self.map_columns(&headers)?;

        let mut donors = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        row = index + 2,
                        error = %e,
                        "Skipping unreadable roster row"
                    );
                    continue;
                }
            };

            match self.parse_row(&row, &columns) {
                Some(mut donor) => {
                    normalize_donor(&mut donor);
                    donors.push(donor);
                }
                None => warn!(
                    file = %path.display(),
                    row = index + 2,
                    "Skipping roster row without a donor id"
                ),
            }
        }

        Ok(donors)
    }

    fn map_columns(&self, headers: &StringRecord) -> Result<HashMap<&'static str, usize>> {
        let mut mapping = HashMap::new();

        for (i, header) in headers.iter().enumerate() {
            let key = match header.trim().to_lowercase().as_str() {
                "id" | "donor_id" | "donorid" => "id",
                "mrn" => "mrn",
                "national_id" | "nationalid" => "national_id",
                "full_name" | "fullname" | "name" => "full_name",
                "age" => "age",
                "blood_type" | "bloodtype" => "blood_type",
                "hla_a" | "hlaa" => "hla_a",
                "hla_b" | "hlab" => "hla_b",
                "hla_c" | "hlac" => "hla_c",
                "hla_dr" | "hladr" => "hla_dr",
                "hla_dq" | "hladq" => "hla_dq",
                "hla_dp" | "hladp" => "hla_dp",
                "crossmatch_result" | "crossmatchresult" => "crossmatch_result",
                "dsa_detected" | "dsadetected" => "dsa_detected",
                "dsa_specificities" | "dsaspecificities" => "dsa_specificities",
                "dsa_strength" | "dsastrength" => "dsa_strength",
                "donor_antibodies" | "donorantibodies" => "donor_antibodies",
                "status" => "status",
                _ => continue,
            };
            mapping.insert(key, i);
        }

        if !mapping.contains_key("id") {
            return Err(anyhow!("Required donor roster column (id) not found"));
        }

        Ok(mapping)
    }

    fn parse_row(
        &self,
        row: &StringRecord,
        columns: &HashMap<&'static str, usize>,
    ) -> Option<Donor> {
        let field = |key: &str| -> &str {
            columns
                .get(key)
                .and_then(|&i| row.get(i))
                .unwrap_or("")
                .trim()
        };

        let id = field("id");
        if id.is_empty() {
            return None;
        }

        let crossmatch = field("crossmatch_result");
        let dsa_detected = parse_flag(field("dsa_detected"));
        let specificities = field("dsa_specificities").to_string();
        let strength = field("dsa_strength").to_string();
        let dsa_result = if dsa_detected || !specificities.is_empty() || !strength.is_empty() {
            Some(DsaResult {
                detected: dsa_detected,
                specificities,
                strength,
            })
        } else {
            None
        };

        Some(Donor {
            id: id.to_string(),
            mrn: field("mrn").to_string(),
            national_id: field("national_id").to_string(),
            full_name: field("full_name").to_string(),
            age: field("age").parse().ok(),
            blood_type: field("blood_type").to_string(),
            hla_typing: HlaTyping {
                hla_a: field("hla_a").to_string(),
                hla_b: field("hla_b").to_string(),
                hla_c: field("hla_c").to_string(),
                hla_dr: field("hla_dr").to_string(),
                hla_dq: field("hla_dq").to_string(),
                hla_dp: field("hla_dp").to_string(),
            },
            crossmatch_result: if crossmatch.is_empty() {
                None
            } else {
                Some(crossmatch.to_string())
            },
            dsa_result,
            donor_antibodies: hla::parse_alleles(field("donor_antibodies")),
            status: parse_status(field("status")),
        })
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_lowercase().as_str(),
        "true" | "yes" | "1" | "detected" | "positive"
    )
}

fn parse_status(raw: &str) -> DonorStatus {
    match raw.to_lowercase().as_str() {
        // missing status counts as available, matching the record store
        "available" | "" => DonorStatus::Available,
        "utilized" => DonorStatus::Utilized,
        _ => DonorStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parses_roster_and_skips_bad_rows() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            "id,full_name,blood_type,hla_a,hla_b,hla_dr,crossmatch_result,dsa_detected,status"
        )?;
        writeln!(file, "d-1,First Donor,O-,\"A1, A2\",B7,DR4,,no,Available")?;
        writeln!(file, ",No Id,A+,,,,Negative,no,Available")?;
        writeln!(file, "d-2,Second Donor,AB+,A3,B8,DR3,Positive,yes,Utilized")?;

        let donors = DonorRosterParser::new().parse(file.path())?;
        assert_eq!(donors.len(), 2);

        assert_eq!(donors[0].id, "d-1");
        assert_eq!(donors[0].blood_type, "O-");
        assert_eq!(donors[0].hla_typing.hla_a, "A1, A2");
        assert!(donors[0].crossmatch_result.is_none());
        assert_eq!(donors[0].status, DonorStatus::Available);

        assert_eq!(donors[1].crossmatch_result.as_deref(), Some("Positive"));
        assert!(donors[1].dsa_detected());
        assert_eq!(donors[1].status, DonorStatus::Utilized);
        Ok(())
    }

    #[test]
    fn test_missing_id_column_is_an_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "full_name,blood_type")?;
        writeln!(file, "Donor,A+")?;

        assert!(DonorRosterParser::new().parse(file.path()).is_err());
        Ok(())
    }
}
