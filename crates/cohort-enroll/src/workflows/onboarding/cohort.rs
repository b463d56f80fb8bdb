use std::sync::Arc;

use tracing::warn;

use super::domain::CohortContext;

/// Configuration collaborator reporting which cohort is currently open.
pub trait CohortSource: Send + Sync {
    fn active_cohort(&self) -> Result<CohortContext, CohortSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CohortSourceError {
    #[error("cohort configuration unavailable: {0}")]
    Unavailable(String),
    #[error("cohort configuration malformed: {0}")]
    Malformed(String),
}

/// Source that always reports one fixed cohort.
#[derive(Debug, Clone)]
pub struct StaticCohortSource {
    context: CohortContext,
}

impl StaticCohortSource {
    pub fn new(context: CohortContext) -> Self {
        Self { context }
    }
}

impl CohortSource for StaticCohortSource {
    fn active_cohort(&self) -> Result<CohortContext, CohortSourceError> {
        Ok(self.context.clone())
    }
}

/// Resolves the cohort for one allocation attempt, degrading to a fixed fallback so a
/// configuration outage never blocks allocation on its own.
pub struct CohortResolver<S> {
    source: Arc<S>,
    fallback: CohortContext,
}

impl<S> CohortResolver<S>
where
    S: CohortSource,
{
    pub fn new(source: Arc<S>, fallback: CohortContext) -> Self {
        Self { source, fallback }
    }

    pub fn fallback(&self) -> &CohortContext {
        &self.fallback
    }

    pub fn resolve(&self) -> CohortContext {
        match self.source.active_cohort() {
            Ok(context) => context,
            Err(error) => {
                warn!(
                    %error,
                    fallback = %self.fallback.cohort,
                    starting_number = self.fallback.starting_number,
                    "cohort configuration lookup failed, using fallback cohort"
                );
                self.fallback.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::onboarding::domain::Cohort;

    struct OfflineSource;

    impl CohortSource for OfflineSource {
        fn active_cohort(&self) -> Result<CohortContext, CohortSourceError> {
            Err(CohortSourceError::Unavailable("config table offline".to_string()))
        }
    }

    #[test]
    fn resolve_prefers_the_configured_source() {
        let active = CohortContext::new(Cohort::new("Basic", "3.0"), 3001);
        let fallback = CohortContext::new(Cohort::new("Placement", "2.0"), 2501);
        let resolver = CohortResolver::new(
            Arc::new(StaticCohortSource::new(active.clone())),
            fallback,
        );

        assert_eq!(resolver.resolve(), active);
    }

    #[test]
    fn resolve_falls_back_when_source_fails() {
        let fallback = CohortContext::new(Cohort::new("Placement", "2.0"), 2501);
        let resolver = CohortResolver::new(Arc::new(OfflineSource), fallback.clone());

        assert_eq!(resolver.resolve(), fallback);
        assert_eq!(resolver.fallback(), &fallback);
    }
}
