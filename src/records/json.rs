use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::records::{normalize_donor, normalize_recipient};
use crate::types::{Donor, Recipient};

/// Records parsed out of one file, either kind
#[derive(Debug, Default)]
pub struct ParsedRecords {
    pub recipients: Vec<Recipient>,
    pub donors: Vec<Donor>,
}

/// Parser for JSON record files: a single donor or recipient object, or an
/// array mixing both.
pub struct JsonRecordParser;

impl JsonRecordParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, path: &Path) -> Result<ParsedRecords> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read record file: {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in record file: {}", path.display()))?;

        let mut records = ParsedRecords::default();
        match value {
            Value::Array(items) => {
                for item in items {
                    self.parse_record(item, &mut records)?;
                }
            }
            other => self.parse_record(other, &mut records)?,
        }
        Ok(records)
    }

    fn parse_record(&self, value: Value, records: &mut ParsedRecords) -> Result<()> {
        if is_recipient_record(&value) {
            let mut recipient: Recipient =
                serde_json::from_value(value).context("Invalid recipient record")?;
            normalize_recipient(&mut recipient);
            records.recipients.push(recipient);
        } else {
            let mut donor: Donor = serde_json::from_value(value).context("Invalid donor record")?;
            normalize_donor(&mut donor);
            records.donors.push(donor);
        }
        Ok(())
    }
}

// Recipients carry sensitization fields donors never have; anything without
// them is read as a donor.
fn is_recipient_record(value: &Value) -> bool {
    value.get("unacceptableAntigens").is_some()
        || value.get("pra").is_some()
        || value.get("crossmatchRequirement").is_some()
}
