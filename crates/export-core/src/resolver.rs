//! Per-lead variable resolution
//!
//! Substitutes registry tags with the lead's field values. Tags the registry
//! does not know are left byte-for-byte untouched so destinations with their
//! own native placeholder syntax still receive them verbatim. Resolution is
//! total: missing lead fields resolve to empty string, never an error.

use crate::registry;
use export_types::LeadExportInfo;
use serde::{Deserialize, Serialize};

/// Subject/body template pair fed into resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

/// Resolve every registry tag in `content` against one lead
pub fn resolve(content: &EmailContent, lead: &LeadExportInfo) -> EmailContent {
    EmailContent {
        subject: resolve_text(&content.subject, lead),
        body: resolve_text(&content.body, lead),
    }
}

/// Resolve registry tags in a single text
pub fn resolve_text(text: &str, lead: &LeadExportInfo) -> String {
    let mut resolved = text.to_string();

    for variable in registry::variables() {
        if resolved.contains(&variable.template_tag) {
            let value = registry::lead_value(variable, lead);
            resolved = resolved.replace(&variable.template_tag, value);
        }
    }

    resolved
}
