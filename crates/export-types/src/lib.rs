//! Shared types for the campaign export pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A personalization variable known to the registry
///
/// Defined at process start and never deserialized; the catalog itself is
/// the source of truth.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PersonalizationVariable {
    /// Stable identifier, unique across the registry
    pub name: &'static str,
    /// Human label shown in the builder UI
    pub label: &'static str,
    /// Lead attribute the variable draws from
    pub source_field: &'static str,
    /// Literal placeholder as it appears in authored content
    pub template_tag: String,
}

impl PersonalizationVariable {
    /// Template tags derive deterministically from the variable name
    pub fn tag_for(name: &str) -> String {
        format!("{{{{{}}}}}", name)
    }
}

/// Unit for delay blocks between emails in a sequence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Minutes,
    Hours,
    Days,
}

/// A single block of an email sequence campaign
///
/// Blocks are authored by the builder and arrive here read-only, ordered by
/// `position` (unique per campaign, not necessarily contiguous).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CampaignBlock {
    Email(EmailBlock),
    Delay(DelayBlock),
}

impl CampaignBlock {
    pub fn position(&self) -> i64 {
        match self {
            CampaignBlock::Email(b) => b.position,
            CampaignBlock::Delay(b) => b.position,
        }
    }

    pub fn as_email(&self) -> Option<&EmailBlock> {
        match self {
            CampaignBlock::Email(b) => Some(b),
            CampaignBlock::Delay(_) => None,
        }
    }
}

/// Email step with subject and body templates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailBlock {
    pub id: String,
    pub position: i64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl EmailBlock {
    /// Both subject and body populated
    pub fn is_complete(&self) -> bool {
        !self.subject.trim().is_empty() && !self.body.trim().is_empty()
    }

    /// Exactly one of subject/body populated
    pub fn is_partial(&self) -> bool {
        self.subject.trim().is_empty() != self.body.trim().is_empty()
    }
}

/// Wait step between two emails
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelayBlock {
    pub id: String,
    pub position: i64,
    pub amount: u32,
    pub unit: DelayUnit,
}

/// Minimal projection of a lead required for export
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeadExportInfo {
    pub email: Option<String>,
    pub icebreaker_text: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
}

impl LeadExportInfo {
    /// Leads without an email address are excluded from email-platform exports
    pub fn has_email(&self) -> bool {
        self.email.as_deref().map(|e| !e.trim().is_empty()).unwrap_or(false)
    }

    pub fn has_icebreaker(&self) -> bool {
        self.icebreaker_text
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Structural class of a validation finding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnknownVariable,
    MalformedSyntax,
    MissingLeadEmail,
    MissingIcebreaker,
    IncompleteContent,
    PartialBlock,
    MissingAccount,
    UploadFailure,
}

/// A single validation finding, surfaced to the UI as an error or warning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            count: None,
            suggested_action: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = Some(action.into());
        self
    }
}

/// Export target: a remote sending platform or a local output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Instantly,
    Smartlead,
    CsvFile,
    Clipboard,
}

impl Destination {
    /// Remote platforms require sending accounts and network calls
    pub fn is_remote(&self) -> bool {
        matches!(self, Destination::Instantly | Destination::Smartlead)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Instantly => "instantly",
            Destination::Smartlead => "smartlead",
            Destination::CsvFile => "csv_file",
            Destination::Clipboard => "clipboard",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instantly" => Ok(Destination::Instantly),
            "smartlead" => Ok(Destination::Smartlead),
            "csv_file" => Ok(Destination::CsvFile),
            "clipboard" => Ok(Destination::Clipboard),
            other => Err(format!("unknown destination: {}", other)),
        }
    }
}

/// Terminal status of an export run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Pending,
    Success,
    PartialFailure,
    Failed,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::Pending => "pending",
            ExportStatus::Success => "success",
            ExportStatus::PartialFailure => "partial_failure",
            ExportStatus::Failed => "failed",
        }
    }
}

/// Durable trace of the last export attempt for a campaign
///
/// Stored as four nullable fields attached to the campaign record. Invariant:
/// `external_id` and `destination` are both set or both null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRecord {
    pub campaign_id: String,
    pub external_id: Option<String>,
    pub destination: Option<Destination>,
    pub exported_at: Option<DateTime<Utc>>,
    pub status: Option<ExportStatus>,
}

impl ExportRecord {
    pub fn empty(campaign_id: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            external_id: None,
            destination: None,
            exported_at: None,
            status: None,
        }
    }

    /// True once any export attempt has been recorded
    pub fn is_exported(&self) -> bool {
        self.external_id.is_some()
    }
}

/// Partial update applied to an `ExportRecord`; only provided fields change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportRecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ExportStatus>,
}

/// Status of a single deployment step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Skipped,
}

/// Transient progress report for one stage of an orchestration run
///
/// Exists only for the duration of the run; streamed to the caller and never
/// persisted beyond the final roll-up into the `ExportRecord`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentStep {
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DeploymentStep {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            detail: None,
        }
    }

    pub fn in_progress(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::InProgress,
            detail: None,
        }
    }

    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Success,
            detail: None,
        }
    }

    pub fn failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Skipped,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
