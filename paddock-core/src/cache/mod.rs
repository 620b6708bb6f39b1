pub mod entitlement_cache;
pub mod entry;
pub mod singleflight;

pub use entitlement_cache::{CachePolicy, EntitlementCache};
pub use entry::{CacheEntry, Freshness, LoadStatus, Resolved};
pub use singleflight::{SingleFlight, SingleFlightError};
