//! Pre-deploy validation
//!
//! Checks deployment preconditions and separates blocking errors from
//! non-blocking warnings. Every rule reports a count so the UI can render
//! "3 leads missing icebreaker" rather than a bare boolean.

use export_types::{CampaignBlock, Destination, IssueKind, LeadExportInfo, ValidationIssue};

/// Outcome of the precondition checks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreDeployValidation {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate deployment preconditions for the given destination
pub fn validate(
    blocks: &[CampaignBlock],
    leads: &[LeadExportInfo],
    destination_accounts: &[String],
    destination: Destination,
) -> PreDeployValidation {
    let mut result = PreDeployValidation {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let leads_with_email = leads.iter().filter(|l| l.has_email()).count();
    if leads_with_email == 0 {
        result.errors.push(
            ValidationIssue::new(
                IssueKind::MissingLeadEmail,
                format!(
                    "No leads with an email address ({} leads total)",
                    leads.len()
                ),
            )
            .with_count(leads.len())
            .with_action("Import leads with email addresses before exporting"),
        );
    }

    let email_blocks: Vec<_> = blocks.iter().filter_map(|b| b.as_email()).collect();
    let complete_blocks = email_blocks.iter().filter(|b| b.is_complete()).count();
    if complete_blocks == 0 {
        result.errors.push(
            ValidationIssue::new(
                IssueKind::IncompleteContent,
                format!(
                    "No email block has both subject and body ({} email blocks total)",
                    email_blocks.len()
                ),
            )
            .with_count(email_blocks.len())
            .with_action("Write at least one complete email step"),
        );
    }

    // Local outputs need no sending accounts; the rule passes vacuously.
    if destination.is_remote() && destination_accounts.is_empty() {
        result.errors.push(
            ValidationIssue::new(
                IssueKind::MissingAccount,
                format!("No {} sending account selected", destination),
            )
            .with_count(0)
            .with_action("Select at least one sending account"),
        );
    }

    let missing_icebreaker = leads
        .iter()
        .filter(|l| l.has_email() && !l.has_icebreaker())
        .count();
    if missing_icebreaker > 0 {
        result.warnings.push(
            ValidationIssue::new(
                IssueKind::MissingIcebreaker,
                format!(
                    "{} lead(s) have no icebreaker; the {{{{icebreaker}}}} tag will render empty",
                    missing_icebreaker
                ),
            )
            .with_count(missing_icebreaker),
        );
    }

    let partial_blocks = email_blocks.iter().filter(|b| b.is_partial()).count();
    if partial_blocks > 0 {
        result.warnings.push(
            ValidationIssue::new(
                IssueKind::PartialBlock,
                format!(
                    "{} email block(s) have only a subject or only a body and will be exported as-is",
                    partial_blocks
                ),
            )
            .with_count(partial_blocks),
        );
    }

    result.valid = result.errors.is_empty();
    result
}
