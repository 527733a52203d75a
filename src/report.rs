use anyhow::{Context, Result};
use chrono::Local;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::fs;
use std::path::Path;

use crate::types::{MatchResult, Recipient};

/// Supported report formats
#[derive(Debug, Clone, Copy)]
pub enum ReportFormat {
    Html,
    Csv,
    Json,
    Tsv,
    All,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    generated_at: String,
    recipient: &'a Recipient,
    results: &'a [MatchResult],
}

/// Report generator for match evaluation runs
pub struct ReportGenerator {
    output_dir: String,
}

impl ReportGenerator {
    pub fn new(output_dir: &Path) -> Self {
        // Create output directory if it doesn't exist
        if !output_dir.exists() {
            fs::create_dir_all(output_dir).expect("Failed to create output directory");
        }

        Self {
            output_dir: output_dir.to_string_lossy().to_string(),
        }
    }

    /// Generate reports in specified format(s)
    pub fn generate(
        &self,
        recipient: &Recipient,
        results: &[MatchResult],
        format: ReportFormat,
    ) -> Result<()> {
        match format {
            ReportFormat::Html => self.generate_html_report(recipient, results)?,
            ReportFormat::Csv => self.generate_delimited_report(results, b',', "csv")?,
            ReportFormat::Json => self.generate_json_report(recipient, results)?,
            ReportFormat::Tsv => self.generate_delimited_report(results, b'\t', "tsv")?,
            ReportFormat::All => {
                self.generate_html_report(recipient, results)?;
                self.generate_delimited_report(results, b',', "csv")?;
                self.generate_json_report(recipient, results)?;
                self.generate_delimited_report(results, b'\t', "tsv")?;
            }
        }

        Ok(())
    }

    fn generate_html_report(&self, recipient: &Recipient, results: &[MatchResult]) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let filename = format!("{}/kidney_match_{}.html", self.output_dir, timestamp);

        let html_content = self.create_html_content(recipient, results);
        fs::write(&filename, html_content)
            .with_context(|| format!("Failed to write HTML report to {}", filename))?;

        Ok(())
    }

    fn create_html_content(&self, recipient: &Recipient, results: &[MatchResult]) -> String {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let compatible_count = results.iter().filter(|r| r.is_compatible).count();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Kidney Match Report</title>
    <style>
        body {{
            font-family: Arial, sans-serif;
            margin: 40px;
            background-color: #f5f5f5;
        }}
        .container {{
            max-width: 1200px;
            margin: 0 auto;
            background-color: white;
            padding: 30px;
            border-radius: 10px;
            box-shadow: 0 0 10px rgba(0,0,0,0.1);
        }}
        h1, h2, h3 {{
            color: #2c3e50;
        }}
        table {{
            width: 100%;
            border-collapse: collapse;
            margin: 20px 0;
        }}
        th, td {{
            border: 1px solid #ddd;
            padding: 12px;
            text-align: left;
        }}
        th {{
            background-color: #3498db;
            color: white;
        }}
        tr:nth-child(even) {{
            background-color: #f2f2f2;
        }}
        .section {{
            margin: 30px 0;
        }}
        .summary-box {{
            background-color: #e8f4f8;
            padding: 20px;
            border-radius: 5px;
            margin: 20px 0;
        }}
        .compatibility-high {{
            background-color: #d4edda;
        }}
        .compatibility-medium {{
            background-color: #fff3cd;
        }}
        .compatibility-low {{
            background-color: #f8d7da;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Kidney Match Report</h1>
        <p>Generated on: {}</p>

        <div class="summary-box">
            <h2>Recipient</h2>
            <p>ID: {} &middot; Blood type: {} &middot; PRA: {}% &middot; Unacceptable antigens: {}</p>
            <p>{} of {} evaluated donors are compatible.</p>
        </div>

        {}
        <p><em>All matches must be verified by laboratory testing before clinical use.</em></p>
    </div>
</body>
</html>"#,
            timestamp,
            recipient.id,
            if recipient.blood_type.is_empty() {
                "N/A"
            } else {
                &recipient.blood_type
            },
            recipient.pra,
            if recipient.unacceptable_antigens.is_empty() {
                "none".to_string()
            } else {
                recipient.unacceptable_antigens.join(", ")
            },
            compatible_count,
            results.len(),
            self.generate_results_html(results)
        )
    }

    fn generate_results_html(&self, results: &[MatchResult]) -> String {
        if results.is_empty() {
            return "<div class=\"section\"><h2>Donor Ranking</h2><p>No donors were available for evaluation.</p></div>".to_string();
        }

        let mut html = "<div class=\"section\"><h2>Donor Ranking</h2>\n<table>\n<tr><th>Donor</th><th>Blood Type</th><th>Score</th><th>Primary HLA (A, B, DR)</th><th>Loci Matched</th><th>Crossmatch</th><th>Verdict</th><th>Exclusion Reason</th></tr>\n".to_string();

        for result in results {
            let status_class = if result.is_compatible {
                "compatibility-high"
            } else if result.compatibility_score >= 50 {
                "compatibility-medium"
            } else {
                "compatibility-low"
            };

            let donor_label = if result.donor.full_name.is_empty() {
                result.donor.id.clone()
            } else {
                format!("{} ({})", result.donor.full_name, result.donor.id)
            };

            html.push_str(&format!(
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}/6</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                status_class,
                donor_label,
                result.donor.blood_type,
                result.compatibility_score,
                result.match_details.hla_match_count,
                result.match_details.hla_loci_match_count,
                if result.match_details.crossmatch_compatible {
                    "Compatible"
                } else {
                    "Incompatible"
                },
                if result.is_compatible {
                    "Compatible"
                } else {
                    "Incompatible"
                },
                result.exclusion_reason.as_deref().unwrap_or("-")
            ));
        }

        html.push_str("</table>\n</div>\n");
        html
    }

    fn generate_delimited_report(
        &self,
        results: &[MatchResult],
        delimiter: u8,
        extension: &str,
    ) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let filename = format!(
            "{}/kidney_match_{}.{}",
            self.output_dir, timestamp, extension
        );

        let mut wtr = WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&filename)
            .with_context(|| format!("Failed to create report writer for {}", filename))?;

        wtr.write_record([
            "donor_id",
            "donor_name",
            "blood_type",
            "compatibility_score",
            "is_compatible",
            "exclusion_reason",
            "primary_hla_matches",
            "total_hla_matches",
            "loci_with_match",
            "crossmatch_compatible",
            "pra_compatible",
            "unacceptable_antigen",
            "potential_positive_crossmatch",
        ])?;

        for result in results {
            let details = &result.match_details;
            wtr.write_record(&[
                result.donor.id.clone(),
                result.donor.full_name.clone(),
                result.donor.blood_type.clone(),
                result.compatibility_score.to_string(),
                result.is_compatible.to_string(),
                result.exclusion_reason.clone().unwrap_or_default(),
                details.hla_match_count.to_string(),
                details.hla_total_detailed_match_count.to_string(),
                details.hla_loci_match_count.to_string(),
                details.crossmatch_compatible.to_string(),
                details.pra_compatible.to_string(),
                details.has_unacceptable_antigens.to_string(),
                details.potential_positive_crossmatch.to_string(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    fn generate_json_report(&self, recipient: &Recipient, results: &[MatchResult]) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let filename = format!("{}/kidney_match_{}.json", self.output_dir, timestamp);

        let report = JsonReport {
            generated_at: Local::now().to_rfc3339(),
            recipient,
            results,
        };

        let json_content =
            to_string_pretty(&report).with_context(|| "Failed to serialize results to JSON")?;

        fs::write(&filename, json_content)
            .with_context(|| format!("Failed to write JSON report to {}", filename))?;

        Ok(())
    }
}
