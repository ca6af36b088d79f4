use crate::host::Rect;
use crate::model::{AdRecord, Identifier};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tokio::time::Instant;

/// Everything the scanner remembers for one page load. Reset on navigation.
#[derive(Debug)]
pub struct SessionState<N> {
    identity_cache: HashMap<Identifier, AdRecord>,
    seen_nodes: HashSet<N>,
    last_seen: HashMap<Identifier, (AdRecord, Rect)>,
    disclosure_blocked_until: Option<Instant>,
    scan_in_flight: bool,
}

impl<N> Default for SessionState<N> {
    fn default() -> Self {
        Self {
            identity_cache: HashMap::new(),
            seen_nodes: HashSet::new(),
            last_seen: HashMap::new(),
            disclosure_blocked_until: None,
            scan_in_flight: false,
        }
    }
}

impl<N: Eq + Hash> SessionState<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything except an in-flight scan marker.
    pub fn reset(&mut self) {
        let in_flight = self.scan_in_flight;
        *self = Self::default();
        self.scan_in_flight = in_flight;
    }

    pub fn cached(&self, key: &Identifier) -> Option<&AdRecord> {
        self.identity_cache.get(key)
    }

    /// First write wins; returns whether the record was stored.
    pub fn cache_ad(&mut self, key: Identifier, ad: AdRecord) -> bool {
        if self.identity_cache.contains_key(&key) {
            return false;
        }
        self.identity_cache.insert(key, ad);
        true
    }

    pub fn cached_count(&self) -> usize {
        self.identity_cache.len()
    }

    /// Returns false if the node had already been attempted.
    pub fn mark_seen(&mut self, node: N) -> bool {
        self.seen_nodes.insert(node)
    }

    /// Puts a node back in the unscanned pool.
    pub fn forget_seen(&mut self, node: &N) -> bool {
        self.seen_nodes.remove(node)
    }

    pub fn has_seen(&self, node: &N) -> bool {
        self.seen_nodes.contains(node)
    }

    pub fn seen_count(&self) -> usize {
        self.seen_nodes.len()
    }

    pub fn last_seen(&self, id: &Identifier) -> Option<&(AdRecord, Rect)> {
        self.last_seen.get(id)
    }

    pub fn remember(&mut self, id: Identifier, ad: AdRecord, rect: Rect) {
        self.last_seen.insert(id, (ad, rect));
    }

    pub fn block_disclosures_until(&mut self, until: Instant) {
        self.disclosure_blocked_until = Some(until);
    }

    pub fn disclosures_blocked(&self, now: Instant) -> bool {
        self.disclosure_blocked_until
            .is_some_and(|until| now < until)
    }

    /// Claims the single scan slot. Returns false if a scan is running.
    pub fn begin_scan(&mut self) -> bool {
        if self.scan_in_flight {
            return false;
        }
        self.scan_in_flight = true;
        true
    }

    pub fn end_scan(&mut self) {
        self.scan_in_flight = false;
    }

    pub fn scan_in_flight(&self) -> bool {
        self.scan_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_identity_cache_is_write_once() {
        let mut session: SessionState<u32> = SessionState::new();
        let key = Identifier::new("u_0_x");
        let mut first = AdRecord::new(1);
        first.title = Some("first".to_string());
        let mut second = AdRecord::new(2);
        second.title = Some("second".to_string());

        assert!(session.cache_ad(key.clone(), first));
        assert!(!session.cache_ad(key.clone(), second));
        assert_eq!(session.cached(&key).unwrap().title.as_deref(), Some("first"));
    }

    #[test]
    fn test_seen_nodes() {
        let mut session = SessionState::new();
        assert!(session.mark_seen(7u32));
        assert!(!session.mark_seen(7u32));
        assert!(session.has_seen(&7));
        assert_eq!(session.seen_count(), 1);

        assert!(session.forget_seen(&7));
        assert!(!session.has_seen(&7));
        assert!(session.mark_seen(7u32));
    }

    #[test]
    fn test_single_flight() {
        let mut session: SessionState<u32> = SessionState::new();
        assert!(session.begin_scan());
        assert!(!session.begin_scan());
        session.end_scan();
        assert!(session.begin_scan());
    }

    #[test]
    fn test_circuit_breaker_window() {
        let mut session: SessionState<u32> = SessionState::new();
        let now = Instant::now();
        assert!(!session.disclosures_blocked(now));

        session.block_disclosures_until(now + Duration::from_secs(240));
        assert!(session.disclosures_blocked(now + Duration::from_secs(239)));
        assert!(!session.disclosures_blocked(now + Duration::from_secs(240)));
    }

    #[test]
    fn test_reset_keeps_in_flight_marker() {
        let mut session = SessionState::new();
        session.mark_seen(1u32);
        session.cache_ad(Identifier::new("a"), AdRecord::new(0));
        assert!(session.begin_scan());

        session.reset();
        assert_eq!(session.seen_count(), 0);
        assert_eq!(session.cached_count(), 0);
        assert!(session.scan_in_flight());
    }
}
