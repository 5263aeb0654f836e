//! Validation modules for campaign export

pub mod advanced;
pub mod predeploy;
pub mod template;

// Re-export the result types consumers work with
pub use advanced::ValidationSummary;
pub use predeploy::PreDeployValidation;
pub use template::TemplateValidation;
