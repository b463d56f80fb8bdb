use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use cohort_enroll::config::EnrollmentConfig;
use cohort_enroll::workflows::onboarding::{
    Cohort, CohortContext, CohortSource, CohortSourceError, EnrollmentAllocator,
    InMemoryEnrollmentRepository, InMemorySubmissionFlags, OnboardingService,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) cohorts: Arc<OperatorCohortSource>,
}

pub(crate) type AppService =
    OnboardingService<InMemoryEnrollmentRepository, OperatorCohortSource, InMemorySubmissionFlags>;

/// Cohort configuration an operator can switch at runtime. Until something is
/// published the source reports itself unavailable and allocation uses the fallback.
#[derive(Debug, Default, Clone)]
pub(crate) struct OperatorCohortSource {
    active: Arc<RwLock<Option<CohortContext>>>,
}

impl OperatorCohortSource {
    /// Stores `context` with type and number trimmed, matching how configuration
    /// and submitted hints are read.
    pub(crate) fn publish(&self, context: CohortContext) -> CohortContext {
        let context = CohortContext::new(
            Cohort::new(
                context.cohort.cohort_type.trim(),
                context.cohort.number.trim(),
            ),
            context.starting_number,
        );
        let mut guard = self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(context.clone());
        context
    }
}

impl CohortSource for OperatorCohortSource {
    fn active_cohort(&self) -> Result<CohortContext, CohortSourceError> {
        let guard = self
            .active
            .read()
            .map_err(|_| CohortSourceError::Unavailable("cohort lock poisoned".to_string()))?;

        match guard.as_ref() {
            None => Err(CohortSourceError::Unavailable(
                "no cohort published".to_string(),
            )),
            Some(context)
                if context.cohort.cohort_type.trim().is_empty()
                    || context.cohort.number.trim().is_empty() =>
            {
                Err(CohortSourceError::Malformed(
                    "cohort type and number are required".to_string(),
                ))
            }
            Some(context) => Ok(context.clone()),
        }
    }
}

pub(crate) fn build_service(
    config: &EnrollmentConfig,
    repository: Arc<InMemoryEnrollmentRepository>,
    cohorts: Arc<OperatorCohortSource>,
) -> Arc<AppService> {
    let allocator = EnrollmentAllocator::new(
        repository,
        cohorts,
        config.fallback.clone(),
        config.duplicate_policy,
    );

    Arc::new(OnboardingService::new(
        Arc::new(allocator),
        Arc::new(InMemorySubmissionFlags::default()),
        config.store_timeout,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpublished_source_is_unavailable() {
        let source = OperatorCohortSource::default();
        assert!(matches!(
            source.active_cohort(),
            Err(CohortSourceError::Unavailable(_))
        ));
    }

    #[test]
    fn blank_cohort_is_malformed() {
        let source = OperatorCohortSource::default();
        source.publish(CohortContext::new(Cohort::new("Placement", " "), 2501));
        assert!(matches!(
            source.active_cohort(),
            Err(CohortSourceError::Malformed(_))
        ));
    }

    #[test]
    fn published_cohort_is_trimmed() {
        let source = OperatorCohortSource::default();
        let stored = source.publish(CohortContext::new(Cohort::new(" Placement", "3.0 "), 3001));

        assert_eq!(stored.cohort, Cohort::new("Placement", "3.0"));
        assert_eq!(source.active_cohort().expect("published"), stored);
    }

    #[test]
    fn service_falls_back_until_operator_publishes() {
        let config = EnrollmentConfig::default();
        let cohorts = Arc::new(OperatorCohortSource::default());
        let service = build_service(
            &config,
            Arc::new(InMemoryEnrollmentRepository::default()),
            cohorts.clone(),
        );

        assert_eq!(service.active_cohort(), config.fallback);

        let next = CohortContext::new(Cohort::new("Placement", "3.0"), 3001);
        cohorts.publish(next.clone());
        assert_eq!(service.active_cohort(), next);
    }
}
