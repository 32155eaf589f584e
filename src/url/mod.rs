//! URL handling for Sumi-Harvest
//!
//! Normalization gives every address a single identity for the visited set
//! and cache fingerprints; host keys partition politeness state; the scope
//! decides which discovered links are worth following.

mod domain;
mod normalize;
mod scope;

pub use domain::{extract_domain, host_key, origin_of};
pub use normalize::{normalize_parsed, normalize_url};
pub use scope::{matches_pattern, DomainScope};
