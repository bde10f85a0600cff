pub mod broadcast;
pub mod cache;
pub mod candidates;
pub mod config;
pub mod errors;
pub mod html_fallback;
pub mod models;
pub mod overrides;
pub mod probe;
pub mod scoring;
pub mod service;
pub mod utils;

pub use broadcast::{IconSubscription, IconUpdateBroadcaster};
pub use cache::{FileKeyValueStore, IconCacheStore, KeyValueStore, MemoryKeyValueStore};
pub use config::Config;
pub use models::{IconCacheEntry, IconLoadState};
pub use service::IconResolverService;
