use crate::errors::Result;
use crate::rewriter::{ChangedFile, FileFailure, RewriteReport, RewriteStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// Defines the possible output formats for a rewrite report.
#[derive(Debug, Clone)]
pub enum OutputFormat {
    /// The plain listing: `Updated files:` and one path per line.
    Text,
    /// JSON format, suitable for machine processing.
    Json,
    /// Comma-Separated Values format.
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Text,
        }
    }
}

/// Handles the formatting of rewrite reports into various output formats.
pub struct OutputFormatter {
    format: OutputFormat,
    include_summary: bool,
    tool_name: String,
    tool_version: String,
}

impl OutputFormatter {
    /// Creates a new `OutputFormatter`.
    ///
    /// `include_summary` only affects the `Text` format; JSON always carries stats.
    pub fn new(format: OutputFormat, include_summary: bool) -> Self {
        Self {
            format,
            include_summary,
            tool_name: "retoken".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Writes the formatted report to a given writer.
    pub fn write_output<W: Write>(&self, writer: &mut W, report: &RewriteReport) -> Result<()> {
        let output = match self.format {
            OutputFormat::Text => self.format_text(report),
            OutputFormat::Json => self.format_json(report)?,
            OutputFormat::Csv => self.format_csv(report)?,
        };

        writer.write_all(output.as_bytes())?;

        if self.include_summary && matches!(self.format, OutputFormat::Text) {
            writer.write_all(self.format_summary(&report.stats).as_bytes())?;
        }

        Ok(())
    }

    fn format_text(&self, report: &RewriteReport) -> String {
        if report.changed.is_empty() {
            return "No changes made.\n".to_string();
        }

        let mut output = String::from("Updated files:\n");
        for path in report.changed_paths() {
            output.push_str(&format!("{}\n", path.display()));
        }
        output
    }

    fn format_json(&self, report: &RewriteReport) -> Result<String> {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            tool: ToolInfo<'a>,
            run_time: DateTime<Utc>,
            changed: &'a [ChangedFile],
            failures: &'a [FileFailure],
            stats: &'a RewriteStats,
        }

        #[derive(Serialize)]
        struct ToolInfo<'a> {
            name: &'a str,
            version: &'a str,
        }

        let output = JsonOutput {
            tool: ToolInfo {
                name: &self.tool_name,
                version: &self.tool_version,
            },
            run_time: Utc::now(),
            changed: &report.changed,
            failures: &report.failures,
            stats: &report.stats,
        };

        let mut json = serde_json::to_string_pretty(&output)?;
        json.push('\n');
        Ok(json)
    }

    fn format_csv(&self, report: &RewriteReport) -> Result<String> {
        use csv::Writer;

        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(["Path", "Replacements"])?;

        for changed in &report.changed {
            wtr.write_record([
                changed.path.display().to_string(),
                changed.replacements.to_string(),
            ])?;
        }

        let data = wtr
            .into_inner()
            .map_err(|e| format!("CSV writer error: {}", e))?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    fn format_summary(&self, stats: &RewriteStats) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("\n{}\n", "-".repeat(50)));
        summary.push_str(&format!("Files seen       : {}\n", stats.files_seen));
        summary.push_str(&format!(
            "Excluded         : {} by extension, {} by directory\n",
            stats.excluded_by_extension, stats.excluded_by_directory
        ));
        summary.push_str(&format!("Undecodable      : {}\n", stats.undecodable));
        summary.push_str(&format!("Unchanged        : {}\n", stats.unchanged));
        summary.push_str(&format!("Files changed    : {}\n", stats.modified));
        summary.push_str(&format!("Total edits      : {}\n", stats.replacements));
        summary.push_str(&format!("Failed           : {}\n", stats.failed));
        if stats.roots_skipped > 0 {
            summary.push_str(&format!("Missing roots    : {}\n", stats.roots_skipped));
        }
        summary
    }
}
