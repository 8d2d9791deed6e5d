//! Quota interface consulted before a job is admitted.
//!
//! Cap bookkeeping (daily/monthly lead counts, billing) lives outside this
//! service; what belongs here is the yes/no answer for a concrete
//! submission.

use async_trait::async_trait;
use thiserror::Error;

use crate::kernel::jobs::{JobParams, ServiceTier};

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("plan does not allow this job: {0}")]
    PlanDenied(String),

    #[error("quota exhausted: {0}")]
    Exhausted(String),
}

#[async_trait]
pub trait QuotaService: Send + Sync {
    async fn authorize(&self, user_id: &str, params: &JobParams) -> Result<(), QuotaError>;
}

/// Tier rules: Basic is email-search only; elevated tiers can request
/// everything.
pub struct PlanQuota;

#[async_trait]
impl QuotaService for PlanQuota {
    async fn authorize(&self, _user_id: &str, params: &JobParams) -> Result<(), QuotaError> {
        if params.tier == ServiceTier::Basic {
            if params.include_map_stage {
                return Err(QuotaError::PlanDenied(
                    "map listing stage requires an elevated plan".to_string(),
                ));
            }
            if params.scrape_mode.wants_phones() {
                return Err(QuotaError::PlanDenied(
                    "phone scraping requires an elevated plan".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Admits everything. Used in tests and single-tenant deployments.
pub struct OpenQuota;

#[async_trait]
impl QuotaService for OpenQuota {
    async fn authorize(&self, _user_id: &str, _params: &JobParams) -> Result<(), QuotaError> {
        Ok(())
    }
}
