use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheStats, DecisionCache};
use crate::error::{FlagError, Result};
use crate::eval::{evaluate, RandomSampler, Sampler};
use crate::record::{CachedDecision, FlagInput, FlagRecord};
use crate::store::FlagStore;

/// How a [`FlagService::get_flag`] call was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
        }
    }
}

/// Orchestrates the store, the evaluator and the decision cache.
///
/// One mutex guards the cache. Writes hold it across the store upsert and
/// the invalidation; reads hold it across lookup and miss-fill. A decision
/// computed from a record can therefore never outlive a later write.
pub struct FlagService {
    store: Arc<dyn FlagStore>,
    cache: Mutex<DecisionCache>,
    sampler: Box<dyn Sampler>,
}

impl FlagService {
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self::with_sampler(store, Box::new(RandomSampler))
    }

    pub fn with_sampler(store: Arc<dyn FlagStore>, sampler: Box<dyn Sampler>) -> Self {
        Self {
            store,
            cache: Mutex::new(DecisionCache::new()),
            sampler,
        }
    }

    /// Validates and persists a flag, then clears every cached decision.
    ///
    /// A failed upsert leaves the cache as it was.
    pub async fn create_or_update_flag(&self, input: FlagInput) -> Result<FlagRecord> {
        let rollout = validate_rollout(input.rollout)?;
        let record = FlagRecord {
            name: input.name,
            enabled: input.enabled,
            rollout,
            environment: input.environment,
            updated_at: now_micros(),
        };

        let mut cache = self.cache.lock().await;
        if let Err(e) = self.store.upsert(&record).await {
            warn!(flag = %record.name, error = %e, "flag write failed");
            return Err(e.into());
        }
        let dropped = cache.len();
        cache.invalidate_all();
        drop(cache);

        info!(
            flag = %record.name,
            environment = %record.environment,
            enabled = record.enabled,
            rollout = record.rollout,
            dropped_decisions = dropped,
            "flag written"
        );
        Ok(record)
    }

    /// Returns the decision for `name` in `environment` (default `prod`).
    ///
    /// A cached decision is returned as-is; only a miss draws a new sample.
    pub async fn get_flag(&self, name: &str, environment: Option<&str>) -> Result<CachedDecision> {
        self.get_flag_traced(name, environment)
            .await
            .map(|(decision, _)| decision)
    }

    /// Like [`get_flag`](Self::get_flag) but also reports whether the cache
    /// answered.
    pub async fn get_flag_traced(
        &self,
        name: &str,
        environment: Option<&str>,
    ) -> Result<(CachedDecision, CacheOutcome)> {
        let environment = environment.unwrap_or(crate::DEFAULT_ENVIRONMENT);
        let key = cache_key(name, environment);

        let mut cache = self.cache.lock().await;
        if let Some(decision) = cache.get(name, environment) {
            debug!(key = %key, "decision cache hit");
            return Ok((decision, CacheOutcome::Hit));
        }

        let record = self
            .store
            .get(name, environment)
            .await?
            .ok_or_else(|| FlagError::NotFound {
                name: name.to_string(),
                environment: environment.to_string(),
            })?;

        let active = evaluate(record.enabled, record.rollout, self.sampler.as_ref());
        let decision = CachedDecision::from_record(&record, active);
        cache.put(name, environment, decision.clone());
        debug!(key = %key, active, "decision cache miss, evaluated");

        Ok((decision, CacheOutcome::Miss))
    }

    /// All stored records. Does not evaluate and does not touch the cache.
    pub async fn list_flags(&self) -> Result<Vec<FlagRecord>> {
        Ok(self.store.list().await?)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }
}

/// Current time truncated to the microsecond precision stores persist.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

fn validate_rollout(rollout: i64) -> Result<u8> {
    match u8::try_from(rollout) {
        Ok(r) if r <= 100 => Ok(r),
        _ => Err(FlagError::Validation { rollout }),
    }
}
