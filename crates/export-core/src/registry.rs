//! Static catalog of personalization variables
//!
//! Single source of truth for what counts as a known placeholder. Every
//! other component (validators, resolver, destination adapters) consults
//! this catalog instead of keeping its own list.

use export_types::{LeadExportInfo, PersonalizationVariable};
use once_cell::sync::Lazy;

static VARIABLES: Lazy<Vec<PersonalizationVariable>> = Lazy::new(|| {
    [
        ("first_name", "First name", "first_name"),
        ("last_name", "Last name", "last_name"),
        ("company_name", "Company", "company_name"),
        ("title", "Job title", "title"),
        ("email", "Email address", "email"),
        ("phone", "Phone number", "phone"),
        ("icebreaker", "Icebreaker", "icebreaker_text"),
    ]
    .into_iter()
    .map(|(name, label, source_field)| PersonalizationVariable {
        name,
        label,
        source_field,
        template_tag: PersonalizationVariable::tag_for(name),
    })
    .collect()
});

/// The fixed variable catalog, defined at process start
pub fn variables() -> &'static [PersonalizationVariable] {
    &VARIABLES
}

/// Look up a variable by its stable name
pub fn find(name: &str) -> Option<&'static PersonalizationVariable> {
    VARIABLES.iter().find(|v| v.name == name)
}

/// Read the variable's source field off a lead; absent fields read as empty
pub fn lead_value<'a>(variable: &PersonalizationVariable, lead: &'a LeadExportInfo) -> &'a str {
    let field = match variable.source_field {
        "first_name" => lead.first_name.as_deref(),
        "last_name" => lead.last_name.as_deref(),
        "company_name" => lead.company_name.as_deref(),
        "title" => lead.title.as_deref(),
        "email" => lead.email.as_deref(),
        "phone" => lead.phone.as_deref(),
        "icebreaker_text" => lead.icebreaker_text.as_deref(),
        _ => None,
    };
    field.unwrap_or("")
}
