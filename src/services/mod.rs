pub mod aggregator;
pub mod kv_store;
pub mod refresh;

pub use aggregator::Aggregator;
pub use kv_store::CacheStore;
pub use refresh::{classify, Freshness, RefreshScheduler};
