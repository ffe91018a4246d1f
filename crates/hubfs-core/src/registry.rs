//! The server's table of live hubs: creation, lookup, and teardown.
//!
//! Mirrors `fscreate`/`unlinkhub`/`fsdestroyfile` from the source, but
//! replaces the linked list and linear name scan with a `HashMap` plus an
//! insertion-order `Vec` for directory listing, and swaps the fixed
//! `MAXHUBS`-sized array for a capacity check against the same constant.

use std::collections::HashMap;

use crate::config::{RateLimitParams, MAX_HUBS};
use crate::error::HubError;
use crate::flags::ServerFlags;
use crate::hub::Hub;
use crate::limiter::RateLimiter;

/// Owns every hub the server currently knows about.
pub struct HubRegistry {
    hubs: HashMap<String, Hub>,
    order: Vec<String>,
    bucket_size: usize,
    default_trunc: bool,
    default_rate_limit: Option<RateLimitParams>,
}

impl HubRegistry {
    pub fn new(bucket_size: usize, default_trunc: bool, default_rate_limit: Option<RateLimitParams>) -> Self {
        Self {
            hubs: HashMap::new(),
            order: Vec::new(),
            bucket_size,
            default_trunc,
            default_rate_limit,
        }
    }

    /// Creates a new hub named `name`, failing if the registry is at
    /// capacity or the name is already taken.
    ///
    /// A duplicate name isn't an error in the source (open-or-create
    /// semantics on the file tree), so callers that want create-only
    /// behavior should check [`HubRegistry::get`] first.
    pub fn create(&mut self, name: &str) -> Result<Hub, HubError> {
        if let Some(existing) = self.hubs.get(name) {
            return Ok(existing.clone());
        }
        if self.hubs.len() >= MAX_HUBS {
            return Err(HubError::TooManyHubs);
        }
        let limiter = self.default_rate_limit.map(RateLimiter::new);
        let hub = Hub::new(name, self.bucket_size, self.default_trunc, limiter);
        self.hubs.insert(name.to_string(), hub.clone());
        self.order.push(name.to_string());
        Ok(hub)
    }

    pub fn get(&self, name: &str) -> Option<Hub> {
        self.hubs.get(name).cloned()
    }

    /// Removes a hub from the registry. Returns `false` if it didn't
    /// exist. Existing open fids keep their `Hub` handle alive via `Arc`
    /// until they're dropped, matching `fsdestroyfile`'s deferred
    /// teardown.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.hubs.remove(name).is_some() {
            self.order.retain(|n| n != name);
            true
        } else {
            false
        }
    }

    /// Names of every hub currently registered, in creation order —
    /// the listing a directory read of the root sees.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_roundtrips() {
        let mut reg = HubRegistry::new(4096, false, None);
        reg.create("alpha").unwrap();
        assert!(reg.get("alpha").is_some());
        assert_eq!(reg.names(), &["alpha".to_string()]);
    }

    #[test]
    fn create_is_idempotent_for_existing_name() {
        let mut reg = HubRegistry::new(4096, false, None);
        let first = reg.create("alpha").unwrap();
        let second = reg.create("alpha").unwrap();
        assert_eq!(first.name(), second.name());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_drops_from_listing() {
        let mut reg = HubRegistry::new(4096, false, None);
        reg.create("alpha").unwrap();
        assert!(reg.remove("alpha"));
        assert!(reg.is_empty());
        assert!(!reg.remove("alpha"));
    }

    #[test]
    fn rejects_creation_past_capacity() {
        let mut reg = HubRegistry::new(4096, false, None);
        for i in 0..MAX_HUBS {
            reg.create(&format!("h{i}")).unwrap();
        }
        assert!(matches!(reg.create("overflow"), Err(HubError::TooManyHubs)));
    }
}
