//! Template variable validation
//!
//! Scans email block content for double-brace placeholders and classifies
//! each against the variable registry. Delay blocks carry no content and are
//! ignored entirely.

use crate::registry;
use export_types::{CampaignBlock, IssueKind, ValidationIssue};
use once_cell::sync::Lazy;
use regex::Regex;

/// Well-formed placeholder: balanced markers with a bare identifier inside
static WELL_FORMED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").unwrap());

/// Any opening or closing marker, matched independently of balance
static ANY_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{|\}\}").unwrap());

/// Result of scanning all blocks of a campaign
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateValidation {
    /// Registry variable names found in well-formed placeholders
    pub valid_variables: Vec<String>,
    /// Well-formed placeholders whose name is not in the registry
    pub unknown_variables: Vec<String>,
    /// Isolated markers with no matching counterpart
    pub malformed_syntax: Vec<ValidationIssue>,
}

/// Scan every email block's subject and body against the registry
pub fn validate(blocks: &[CampaignBlock]) -> TemplateValidation {
    let mut result = TemplateValidation::default();

    for block in blocks {
        let email = match block.as_email() {
            Some(e) => e,
            None => continue,
        };

        scan_text(&email.subject, &mut result);
        scan_text(&email.body, &mut result);
    }

    result
}

fn scan_text(text: &str, result: &mut TemplateValidation) {
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for captures in WELL_FORMED.captures_iter(text) {
        let whole = captures.get(0).unwrap();
        spans.push((whole.start(), whole.end()));

        let name = &captures[1];
        if registry::find(name).is_some() {
            push_unique(&mut result.valid_variables, name);
        } else {
            push_unique(&mut result.unknown_variables, name);
        }
    }

    // Markers not covered by a well-formed placeholder have no counterpart:
    // an opener with no closer before end-of-text, or a closer with no
    // preceding opener.
    for marker in ANY_MARKER.find_iter(text) {
        if spans.iter().any(|&(s, e)| marker.start() >= s && marker.end() <= e) {
            continue;
        }

        let snippet = if marker.as_str() == "{{" {
            snippet_forward(text, marker.start())
        } else {
            snippet_backward(text, marker.end())
        };

        result.malformed_syntax.push(
            ValidationIssue::new(
                IssueKind::MalformedSyntax,
                format!("Unbalanced placeholder marker near \"{}\"", snippet),
            )
            .with_action("Close or remove the stray {{ / }} marker".to_string()),
        );
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

const SNIPPET_LEN: usize = 24;

fn snippet_forward(text: &str, start: usize) -> &str {
    let mut end = (start + SNIPPET_LEN).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}

fn snippet_backward(text: &str, end: usize) -> &str {
    let mut start = end.saturating_sub(SNIPPET_LEN);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_types::{DelayBlock, DelayUnit, EmailBlock};

    fn email(subject: &str, body: &str) -> CampaignBlock {
        CampaignBlock::Email(EmailBlock {
            id: "b1".to_string(),
            position: 1,
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }

    #[test]
    fn test_known_and_unknown_variables() {
        let blocks = vec![email(
            "Hello {{first_name}}",
            "I saw {{company_name}} uses {{crm_tool}}",
        )];

        let result = validate(&blocks);
        assert_eq!(result.valid_variables, vec!["first_name", "company_name"]);
        assert_eq!(result.unknown_variables, vec!["crm_tool"]);
        assert!(result.malformed_syntax.is_empty());
    }

    #[test]
    fn test_unclosed_marker_is_malformed() {
        // Scenario: "Olá {{first_name" carries one stray opener; the
        // truncated name never reaches the variable lists.
        let blocks = vec![email("Olá {{first_name", "")];

        let result = validate(&blocks);
        assert_eq!(result.malformed_syntax.len(), 1);
        assert!(result.valid_variables.is_empty());
        assert!(result.unknown_variables.is_empty());
        assert!(result.malformed_syntax[0].message.contains("{{first_name"));
    }

    #[test]
    fn test_stray_closer_is_malformed() {
        let blocks = vec![email("", "broken}} tail")];

        let result = validate(&blocks);
        assert_eq!(result.malformed_syntax.len(), 1);
        assert_eq!(result.malformed_syntax[0].kind, IssueKind::MalformedSyntax);
    }

    #[test]
    fn test_malformed_and_valid_are_independent() {
        // A well-formed unknown tag next to an unbalanced marker keeps both
        // classifications; neither suppresses the other.
        let blocks = vec![email("{{mystery}} and {{", "")];

        let result = validate(&blocks);
        assert_eq!(result.unknown_variables, vec!["mystery"]);
        assert_eq!(result.malformed_syntax.len(), 1);
    }

    #[test]
    fn test_no_placeholders_is_clean() {
        let blocks = vec![email("Plain subject", "Plain body, single {brace} ok")];

        let result = validate(&blocks);
        assert!(result.valid_variables.is_empty());
        assert!(result.unknown_variables.is_empty());
        assert!(result.malformed_syntax.is_empty());
    }

    #[test]
    fn test_dedup_across_blocks() {
        let blocks = vec![
            email("Hi {{first_name}}", "{{first_name}} again"),
            email("{{first_name}}", "{{ghost}} and {{ghost}}"),
        ];

        let result = validate(&blocks);
        assert_eq!(result.valid_variables, vec!["first_name"]);
        assert_eq!(result.unknown_variables, vec!["ghost"]);
    }

    #[test]
    fn test_delay_blocks_are_ignored() {
        let blocks = vec![CampaignBlock::Delay(DelayBlock {
            id: "d1".to_string(),
            position: 1,
            amount: 2,
            unit: DelayUnit::Days,
        })];

        let result = validate(&blocks);
        assert_eq!(result, TemplateValidation::default());
    }
}
