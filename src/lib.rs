pub mod cache;
pub mod error;
pub mod eval;
pub mod record;
pub mod service;
pub mod store;

pub use cache::{cache_key, CacheStats, DecisionCache};
pub use error::{FlagError, StoreError};
pub use eval::{evaluate, RandomSampler, Sampler};
pub use record::{
    CachedDecision, FlagInput, FlagRecord, StoredFlag, DEFAULT_ENVIRONMENT, DEFAULT_ROLLOUT,
};
pub use service::{CacheOutcome, FlagService};
pub use store::{FlagStore, MemoryStore};
