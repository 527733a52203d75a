use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunable thresholds for the match evaluation.
///
/// The defaults reproduce the established clinical policy exactly; a TOML
/// policy file can override individual fields for what-if runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchPolicy {
    /// Minimum matched alleles across the A, B and DR loci for a donor to be
    /// considered compatible
    pub min_primary_hla_matches: u32,
    /// Minimum compatibility score (0-100) for the final verdict
    pub min_compatibility_score: u32,
    /// PRA percentage above which a virtual crossmatch is treated as positive
    pub virtual_crossmatch_pra_threshold: f32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            min_primary_hla_matches: 3,
            min_compatibility_score: 50,
            virtual_crossmatch_pra_threshold: 80.0,
        }
    }
}

impl MatchPolicy {
    /// Load a policy file; fields not present keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse policy file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_established_policy() {
        let policy = MatchPolicy::default();
        assert_eq!(policy.min_primary_hla_matches, 3);
        assert_eq!(policy.min_compatibility_score, 50);
        assert_eq!(policy.virtual_crossmatch_pra_threshold, 80.0);
    }

    #[test]
    fn test_partial_policy_file_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "min_primary_hla_matches = 4")?;

        let policy = MatchPolicy::from_file(file.path())?;
        assert_eq!(policy.min_primary_hla_matches, 4);
        assert_eq!(policy.min_compatibility_score, 50);
        assert_eq!(policy.virtual_crossmatch_pra_threshold, 80.0);
        Ok(())
    }
}
