use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::records::{DonorRosterParser, JsonRecordParser};
use crate::types::{Donor, DonorStatus, Recipient};

/// Hard failures at the record store boundary. Clinical field absences are
/// never errors; only a missing record is.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Recipient with ID {0} not found")]
    RecipientNotFound(String),
}

/// What a load pass brought in
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadSummary {
    pub files: usize,
    pub recipients: usize,
    pub donors: usize,
    pub skipped_files: usize,
}

/// In-memory record store standing in for the external record system.
///
/// Holds the latest version of each donor and recipient keyed by id and
/// answers the two queries the evaluator needs: recipient-by-id and the
/// available donor pool.
pub struct MatchRegistry {
    recipients: DashMap<String, Recipient>,
    donors: DashMap<String, Donor>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            recipients: DashMap::new(),
            donors: DashMap::new(),
        }
    }

    /// Load every record file found under the given paths. Files that fail
    /// to parse are skipped with a warning; the load itself only fails when
    /// a directory cannot be read at all.
    pub fn load_paths(&self, paths: &[PathBuf], recursive: bool) -> Result<LoadSummary> {
        let files = self.discover(paths, recursive)?;
        let mut summary = LoadSummary::default();

        let json_parser = JsonRecordParser::new();
        let roster_parser = DonorRosterParser::new();

        for file in files {
            summary.files += 1;
            let loaded = match extension_of(&file).as_str() {
                "json" => json_parser.parse(&file).map(|records| {
                    let counts = (records.recipients.len(), records.donors.len());
                    for recipient in records.recipients {
                        self.insert_recipient(recipient);
                    }
                    for donor in records.donors {
                        self.insert_donor(donor);
                    }
                    counts
                }),
                "csv" | "tsv" => roster_parser.parse(&file).map(|donors| {
                    let counts = (0, donors.len());
                    for donor in donors {
                        self.insert_donor(donor);
                    }
                    counts
                }),
                _ => continue,
            };

            match loaded {
                Ok((recipients, donors)) => {
                    summary.recipients += recipients;
                    summary.donors += donors;
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Skipping unreadable record file");
                    summary.skipped_files += 1;
                }
            }
        }

        info!(
            files = summary.files,
            recipients = summary.recipients,
            donors = summary.donors,
            skipped = summary.skipped_files,
            "Record load complete"
        );
        Ok(summary)
    }

    fn discover(&self, paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_file() {
                files.push(path.clone());
            } else if path.is_dir() {
                files.extend(self.discover_in_directory(path, recursive)?);
            } else {
                warn!(path = %path.display(), "Record path does not exist");
            }
        }

        // Remove duplicates while preserving order
        let mut seen = HashSet::new();
        files.retain(|path| seen.insert(path.clone()));
        files.retain(|path| is_record_file(path));
        Ok(files)
    }

    fn discover_in_directory(&self, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if recursive {
            for entry in WalkDir::new(dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.is_file() && is_record_file(path) {
                    files.push(path.to_path_buf());
                }
            }
        } else {
            let entries = fs::read_dir(dir)
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
            for entry in entries {
                let entry = entry.with_context(|| {
                    format!("Failed to read directory entry in: {}", dir.display())
                })?;
                let path = entry.path();
                if path.is_file() && is_record_file(&path) {
                    files.push(path);
                }
            }
            files.sort();
        }

        Ok(files)
    }

    pub fn insert_recipient(&self, recipient: Recipient) {
        if recipient.id.is_empty() {
            warn!("Dropping recipient record without an id");
            return;
        }
        self.recipients.insert(recipient.id.clone(), recipient);
    }

    pub fn insert_donor(&self, donor: Donor) {
        if donor.id.is_empty() {
            warn!("Dropping donor record without an id");
            return;
        }
        self.donors.insert(donor.id.clone(), donor);
    }

    /// Look up the evaluation baseline. A missing recipient is the one hard
    /// error the matching flow surfaces.
    pub fn recipient(&self, id: &str) -> Result<Recipient, MatchError> {
        self.recipients
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| MatchError::RecipientNotFound(id.to_string()))
    }

    /// All donors currently eligible for matching, in stable id order.
    pub fn available_donors(&self) -> Vec<Donor> {
        let mut donors: Vec<Donor> = self
            .donors
            .iter()
            .filter(|entry| entry.value().status == DonorStatus::Available)
            .map(|entry| entry.value().clone())
            .collect();
        donors.sort_by(|a, b| a.id.cmp(&b.id));
        donors
    }

    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    pub fn donor_count(&self) -> usize {
        self.donors.len()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn is_record_file(path: &Path) -> bool {
    matches!(extension_of(path).as_str(), "json" | "csv" | "tsv")
}
