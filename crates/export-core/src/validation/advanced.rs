//! Unified advanced validation
//!
//! Pure composition of the template scan and the pre-deploy checks into the
//! single report the UI gate renders. This is the only validation entry
//! point the orchestrator trusts; no export step runs without it.

use super::{predeploy, template};
use export_types::{CampaignBlock, Destination, IssueKind, LeadExportInfo, ValidationIssue};
use serde::{Deserialize, Serialize};

/// Combined red/yellow/green validation report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationSummary {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// Run template and pre-deploy validation and merge the findings
///
/// Unknown variables and malformed syntax are always errors; everything else
/// keeps the pre-deploy classification.
pub fn validate(
    blocks: &[CampaignBlock],
    leads: &[LeadExportInfo],
    destination_accounts: &[String],
    destination: Destination,
) -> ValidationSummary {
    let templates = template::validate(blocks);
    let predeploy = predeploy::validate(blocks, leads, destination_accounts, destination);

    let mut errors = predeploy.errors;
    let warnings = predeploy.warnings;

    if !templates.unknown_variables.is_empty() {
        errors.push(
            ValidationIssue::new(
                IssueKind::UnknownVariable,
                format!(
                    "Unknown variable(s): {}",
                    templates.unknown_variables.join(", ")
                ),
            )
            .with_count(templates.unknown_variables.len())
            .with_action("Remove the tag or pick a variable from the list"),
        );
    }

    errors.extend(templates.malformed_syntax);

    ValidationSummary {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
