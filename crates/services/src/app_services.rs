use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::assessment_service::AssessmentService;
use crate::content::{ContentGenerator, ContentStore, HttpContentGenerator};
use crate::error::EngineServicesError;
use crate::gate_service::GateService;
use crate::locks::BatchLocks;
use crate::progress_service::ProgressService;
use crate::remediation_service::{RemediationConfig, RemediationService};

/// Assembles the engine's services over one storage backend and one set of
/// batch locks.
#[derive(Clone)]
pub struct EngineServices {
    progress: Arc<ProgressService>,
    assessment: Arc<AssessmentService>,
    remediation: Arc<RemediationService>,
    gates: Arc<GateService>,
}

impl EngineServices {
    /// Build services backed by `SQLite` storage, with content generation and
    /// remediation timeout configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns `EngineServicesError` if storage initialization fails or the
    /// content generator client cannot be built.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, EngineServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let generator = HttpContentGenerator::from_env()?;
        if !generator.enabled() {
            tracing::info!("CURRICULUM_AI_API_KEY not set, content generation disabled");
        }
        Ok(Self::from_storage(
            &storage,
            clock,
            Arc::new(generator),
            RemediationConfig::from_env(),
        ))
    }

    /// Wire services over an existing storage and content generator.
    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        generator: Arc<dyn ContentGenerator>,
        config: RemediationConfig,
    ) -> Self {
        let locks = BatchLocks::new();
        let content = ContentStore::new(generator);

        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.batches),
            locks.clone(),
        ));
        let remediation = Arc::new(RemediationService::new(
            Arc::clone(&storage.batches),
            locks.clone(),
            content.clone(),
            config,
        ));
        let assessment = Arc::new(AssessmentService::new(
            clock,
            Arc::clone(&storage.batches),
            locks,
            content,
            Arc::clone(&remediation),
        ));
        let gates = Arc::new(GateService::new(Arc::clone(&storage.batches)));

        Self {
            progress,
            assessment,
            remediation,
            gates,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn assessment(&self) -> Arc<AssessmentService> {
        Arc::clone(&self.assessment)
    }

    #[must_use]
    pub fn remediation(&self) -> Arc<RemediationService> {
        Arc::clone(&self.remediation)
    }

    #[must_use]
    pub fn gates(&self) -> Arc<GateService> {
        Arc::clone(&self.gates)
    }
}
