//! Record ingestion: turns donor/recipient files into normalized domain
//! records. All defaulting for missing optional clinical fields happens
//! here, so the matching engine only ever sees complete structures.

use serde::de::{Deserializer, SeqAccess, Visitor};
use std::fmt;
use tracing::warn;

use crate::hla::{self, Locus};
use crate::types::{Donor, HlaTyping, Recipient};

mod csv;
mod json;

pub use self::csv::DonorRosterParser;
pub use self::json::{JsonRecordParser, ParsedRecords};

/// Deserialize a field that historically was stored either as a delimited
/// string ("B7, B27") or as a JSON array of strings. Both forms normalize to
/// the same canonical token list.
pub fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrList;

    impl<'de> Visitor<'de> for StringOrList {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a delimited string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E> {
            Ok(hla::parse_alleles(value))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut tokens = Vec::new();
            while let Some(value) = seq.next_element::<String>()? {
                for token in hla::parse_alleles(&value) {
                    if !tokens.contains(&token) {
                        tokens.push(token);
                    }
                }
            }
            Ok(tokens)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrList)
}

/// Clamp out-of-range values and flag suspicious typing entries. Never
/// rejects a record.
pub fn normalize_recipient(recipient: &mut Recipient) {
    if !(0.0..=100.0).contains(&recipient.pra) {
        warn!(
            recipient = %recipient.id,
            pra = recipient.pra,
            "PRA outside [0, 100], clamping"
        );
        recipient.pra = recipient.pra.clamp(0.0, 100.0);
    }
    warn_on_suspect_typing("recipient", &recipient.id, &recipient.hla_typing);
}

pub fn normalize_donor(donor: &mut Donor) {
    warn_on_suspect_typing("donor", &donor.id, &donor.hla_typing);
}

fn warn_on_suspect_typing(kind: &str, id: &str, typing: &HlaTyping) {
    for locus in Locus::ALL {
        let raw = typing.locus(locus);
        if !hla::is_valid_allele_list(raw) {
            warn!(
                kind,
                id,
                locus = locus.key(),
                entry = raw,
                "HLA entry does not look like an allele list"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{Donor, Recipient};

    #[test]
    fn test_string_or_list_accepts_both_shapes() {
        let as_string: Recipient =
            serde_json::from_str(r#"{"id": "r1", "unacceptableAntigens": "B7, B27"}"#).unwrap();
        let as_list: Recipient =
            serde_json::from_str(r#"{"id": "r1", "unacceptableAntigens": ["B7", "B27"]}"#).unwrap();
        assert_eq!(as_string.unacceptable_antigens, vec!["B7", "B27"]);
        assert_eq!(as_list.unacceptable_antigens, as_string.unacceptable_antigens);
    }

    #[test]
    fn test_string_or_list_handles_null_and_nested_delimiters() {
        let donor: Donor =
            serde_json::from_str(r#"{"id": "d1", "donorAntibodies": null}"#).unwrap();
        assert!(donor.donor_antibodies.is_empty());

        let donor: Donor =
            serde_json::from_str(r#"{"id": "d1", "donorAntibodies": ["a2; a3", "A2"]}"#).unwrap();
        assert_eq!(donor.donor_antibodies, vec!["A2", "A3"]);
    }
}
