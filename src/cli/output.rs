//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! reconciliation reports, guest facts and validation results in text or
//! JSON form.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::reconciler::ReconcileReport;
use crate::vsphere::GuestFacts;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Fact row for table display.
#[derive(Tabled)]
struct FactRow {
    #[tabled(rename = "Fact")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a reconciliation report for display.
    #[must_use]
    pub fn format_report(&self, report: &ReconcileReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &ReconcileReport) -> String {
        let mut output = String::new();

        if report.changed {
            let _ = writeln!(output, "{} Changed:", "~".yellow());
            for change in &report.changes {
                let _ = writeln!(output, "   - {change}");
            }
        } else {
            let _ = writeln!(
                output,
                "{} No change required - guest matches the desired state.",
                "✓".green()
            );
        }

        if let Some(facts) = &report.facts {
            output.push('\n');
            output.push_str(&Self::facts_table(facts));
            output.push('\n');
        }

        output
    }

    /// Formats guest facts for display.
    #[must_use]
    pub fn format_facts(&self, facts: &GuestFacts) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(facts).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = Self::facts_table(facts);
                output.push('\n');
                output
            }
        }
    }

    /// Renders the facts key/value table.
    fn facts_table(facts: &GuestFacts) -> String {
        let rows = vec![
            FactRow {
                field: String::from("Name"),
                value: facts.vm_name.clone(),
            },
            FactRow {
                field: String::from("UUID"),
                value: facts.vm_uuid.to_string(),
            },
            FactRow {
                field: String::from("Instance UUID"),
                value: facts.instance_uuid.to_string(),
            },
            FactRow {
                field: String::from("CPUs"),
                value: facts.num_cpus.to_string(),
            },
            FactRow {
                field: String::from("Memory"),
                value: format!("{} MB ({} GB)", facts.memory_mb, facts.memory_gb),
            },
            FactRow {
                field: String::from("Power state"),
                value: facts.power_state.to_string(),
            },
            FactRow {
                field: String::from("Tools status"),
                value: facts.vm_tools_status.to_string(),
            },
        ];

        Table::new(rows).to_string()
    }

    /// Formats a validation result for display.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "valid": result.errors.is_empty(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&value).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "{} Configuration is valid.", "✓".green());

                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }
}
