//! Rendered-fragment cache.
//!
//! Holds rendered HTML fragments (currently the home listing) for a fixed
//! time-to-live. Entries are never invalidated by writes; they expire on their
//! own or are dropped together by [`FragmentCache::clear`].
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 256
//! ```

mod config;
mod keys;
mod store;

pub use config::CacheConfig;
pub use keys::FragmentKey;
pub use store::FragmentCache;

pub const METRIC_FRAGMENT_HIT: &str = "yatube_fragment_cache_hit_total";
pub const METRIC_FRAGMENT_MISS: &str = "yatube_fragment_cache_miss_total";
pub const METRIC_FRAGMENT_EVICT: &str = "yatube_fragment_cache_evict_total";
