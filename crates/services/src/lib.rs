#![forbid(unsafe_code)]

pub mod app_services;
pub mod assessment_service;
pub mod batch_view;
pub mod content;
pub mod error;
pub mod gate_service;
pub mod locks;
pub mod progress_service;
pub mod remediation_service;
mod store;

pub use curriculum_core::Clock;

pub use app_services::EngineServices;
pub use assessment_service::{AssessmentService, RemediationStatus, TestSubmission};
pub use batch_view::{BatchOverview, ChapterOverview};
pub use content::{ContentGenerator, ContentStore};
pub use error::{
    AssessmentError, ContentGenerationError, EngineServicesError, GateError, ProgressError,
    RemediationError,
};
pub use gate_service::GateService;
pub use locks::BatchLocks;
pub use progress_service::ProgressService;
pub use remediation_service::{RemediationConfig, RemediationOutcome, RemediationService};
