use crate::classify;
use crate::disclosure::DisclosureFetcher;
use crate::error::{ExtractError, Result};
use crate::extractor::{self, Extracted, ExtractionTiming};
use crate::host::{HostDocument, Rect, Viewport};
use crate::model::{AdRecord, Identifier, Target};
use crate::session::SessionState;
use crate::store::AdStore;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Page events that ask for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    Scroll,
    Resize,
    Requested,
    /// A new page load; the session starts over.
    Navigated,
}

/// Candidate counts at each stage of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanCounts {
    pub all_posts: usize,
    pub visible: usize,
    pub unscanned: usize,
    pub nested_dropped: usize,
    pub ads: usize,
    pub not_ads: usize,
    pub timeouts: usize,
    pub missing_toggles: usize,
    pub missing_ids: usize,
    pub invariant_violations: usize,
    pub raw_new_ads: usize,
    pub deduped_new_ads: usize,
}

impl ScanCounts {
    fn record_failure(&mut self, error: ExtractError) {
        match error {
            ExtractError::NotAnAd => self.not_ads += 1,
            ExtractError::Timeout => self.timeouts += 1,
            ExtractError::NoToggle => self.missing_toggles += 1,
            ExtractError::NoId => self.missing_ids += 1,
            ExtractError::Invariant => self.invariant_violations += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub counts: ScanCounts,
    /// New ads emitted by this pass, in discovery order.
    pub ads: Vec<AdRecord>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// The monitor flag is off.
    Disabled,
    /// Another pass is still running.
    InFlight,
    Completed(ScanReport),
}

pub struct Scanner<H: HostDocument, F, S> {
    host: H,
    fetcher: F,
    store: S,
    session: SessionState<H::Node>,
    timing: ExtractionTiming,
    debounce: Duration,
    initial_delay: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl<H, F, S> Scanner<H, F, S>
where
    H: HostDocument,
    F: DisclosureFetcher,
    S: AdStore,
{
    pub fn new(host: H, fetcher: F, store: S) -> Self {
        Self {
            host,
            fetcher,
            store,
            session: SessionState::new(),
            timing: ExtractionTiming::default(),
            debounce: Duration::from_millis(100),
            initial_delay: Duration::from_secs(5),
            progress_callback: None,
        }
    }

    pub fn with_timing(mut self, timing: ExtractionTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Called with `(attempt, total)` before each candidate is extracted.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &SessionState<H::Node> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState<H::Node> {
        &mut self.session
    }

    pub fn reset_session(&mut self) {
        self.session.reset();
    }

    pub fn into_parts(self) -> (H, S) {
        (self.host, self.store)
    }

    /// Runs one scan pass over the candidates currently on the page.
    pub async fn scan(&mut self) -> Result<ScanOutcome> {
        if !self.store.is_monitor_enabled()? {
            debug!("Monitor disabled, skipping scan");
            return Ok(ScanOutcome::Disabled);
        }
        if !self.session.begin_scan() {
            debug!("Scan already in flight, dropping trigger");
            return Ok(ScanOutcome::InFlight);
        }

        let result = self.scan_pass().await;
        self.session.end_scan();
        result.map(ScanOutcome::Completed)
    }

    async fn scan_pass(&mut self) -> Result<ScanReport> {
        let started = Instant::now();
        let mut counts = ScanCounts::default();

        let all = find_candidates(&self.host);
        counts.all_posts = all.len();
        let visible = filter_visible(&self.host, all);
        counts.visible = visible.len();
        let unscanned = filter_unseen(&self.session, visible);
        counts.unscanned = unscanned.len();
        let candidates = filter_nested(&self.host, unscanned);
        counts.nested_dropped = counts.unscanned - candidates.len();

        info!(
            "Scanning {} candidates ({} posts on page, {} visible)",
            candidates.len(),
            counts.all_posts,
            counts.visible
        );

        let total = candidates.len();
        let mut found = Vec::new();
        let mut emitting = Vec::new();
        for (index, node) in candidates.into_iter().enumerate() {
            if let Some(ref callback) = self.progress_callback {
                callback(index + 1, total);
            }
            self.session.mark_seen(node.clone());

            let attempt = extractor::extract(
                &mut self.host,
                &mut self.session,
                &self.fetcher,
                node.clone(),
                &self.timing,
            )
            .await;
            match attempt {
                Ok(Extracted { ad, node: post }) => {
                    counts.ads += 1;
                    let rect = self.host.bounding_rect(&post);
                    found.push((ad, rect));
                    emitting.push(node);
                }
                Err(ExtractError::NotAnAd) => counts.record_failure(ExtractError::NotAnAd),
                Err(e) => {
                    debug!("Candidate {}/{} failed: {}", index + 1, total, e);
                    counts.record_failure(e);
                }
            }
        }

        counts.raw_new_ads = found.len();
        let kept = dedup_ads(&self.session, found);
        counts.deduped_new_ads = kept.len();
        let ads: Vec<AdRecord> = kept.iter().map(|(ad, _)| ad.clone()).collect();

        if !ads.is_empty() {
            let targets: Vec<Target> = ads
                .iter()
                .flat_map(|ad| ad.targets.iter().cloned())
                .collect();
            if let Err(e) = self.store.store_batch(&ads, &targets) {
                // Leave the emitting posts unscanned so the next pass retries them.
                warn!("Failed to store {} ads: {}", ads.len(), e);
                for node in &emitting {
                    self.session.forget_seen(node);
                }
                return Err(e);
            }
        }
        remember_ads(&mut self.session, &kept);

        info!(
            "Scan complete. {} new ads ({} before dedup)",
            counts.deduped_new_ads, counts.raw_new_ads
        );
        Ok(ScanReport {
            counts,
            ads,
            elapsed: started.elapsed(),
        })
    }

    /// Scans on page events until the trigger channel closes.
    ///
    /// The first pass runs after the initial delay; later triggers are
    /// debounced. Triggers that arrive while a pass is running are dropped,
    /// except that a navigation still resets the session. Returns the number
    /// of completed passes.
    pub async fn run(&mut self, mut triggers: mpsc::Receiver<ScanTrigger>) -> usize {
        let mut due = Some(Instant::now() + self.initial_delay);
        let mut open = true;
        let mut passes = 0;

        while open || due.is_some() {
            tokio::select! {
                trigger = triggers.recv(), if open => match trigger {
                    Some(ScanTrigger::Navigated) => {
                        info!("Page navigated, starting a new session");
                        self.reset_session();
                        due = Some(Instant::now() + self.initial_delay);
                    }
                    Some(trigger) => {
                        debug!("Scan trigger {:?}", trigger);
                        due = Some(Instant::now() + self.debounce);
                    }
                    None => open = false,
                },
                _ = tokio::time::sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {
                    due = None;
                    match self.scan().await {
                        Ok(ScanOutcome::Completed(_)) => passes += 1,
                        Ok(outcome) => debug!("Scan skipped: {:?}", outcome),
                        Err(e) => warn!("Scan failed: {}", e),
                    }

                    let mut dropped = 0;
                    while let Ok(trigger) = triggers.try_recv() {
                        dropped += 1;
                        if trigger == ScanTrigger::Navigated {
                            info!("Page navigated during scan, starting a new session");
                            self.reset_session();
                            due = Some(Instant::now() + self.initial_delay);
                        }
                    }
                    if dropped > 0 {
                        debug!("Dropped {} triggers received during the scan", dropped);
                    }
                }
            }
        }

        passes
    }
}

/// All timeline and sidebar candidates on the page, in document order.
pub fn find_candidates<H: HostDocument>(host: &H) -> Vec<H::Node> {
    let mut found = HashSet::new();
    let mut candidates: Vec<H::Node> = classify::TIMELINE_CLASSES
        .iter()
        .chain(std::iter::once(&classify::SIDEBAR_CLASS))
        .flat_map(|class| host.elements_by_class(class))
        .filter(|node| found.insert(node.clone()))
        .collect();
    candidates.sort_by(|a, b| host.compare_position(a, b));
    candidates
}

/// A box counts as visible while no more than one of its own widths or
/// heights lies outside the viewport.
pub fn is_in_viewport(rect: &Rect, viewport: &Viewport) -> bool {
    rect.top > -rect.height()
        && rect.left > -rect.width()
        && rect.bottom < viewport.height + rect.height()
        && rect.right < viewport.width + rect.width()
}

/// Touching edges count as overlap.
pub fn rects_overlap(a: &Rect, b: &Rect) -> bool {
    !(a.right < b.left || a.left > b.right || a.bottom < b.top || a.top > b.bottom)
}

pub fn filter_visible<H: HostDocument>(host: &H, nodes: Vec<H::Node>) -> Vec<H::Node> {
    let viewport = host.viewport();
    nodes
        .into_iter()
        .filter(|node| is_in_viewport(&host.bounding_rect(node), &viewport))
        .collect()
}

pub fn filter_unseen<N: Eq + Hash>(session: &SessionState<N>, nodes: Vec<N>) -> Vec<N> {
    nodes
        .into_iter()
        .filter(|node| !session.has_seen(node))
        .collect()
}

/// Drops every candidate that sits inside another candidate.
pub fn filter_nested<H: HostDocument>(host: &H, nodes: Vec<H::Node>) -> Vec<H::Node> {
    nodes
        .iter()
        .filter(|node| {
            let nested = nodes
                .iter()
                .any(|outer| outer != *node && host.contains(outer, *node));
            if nested {
                debug!("Dropping post nested in another post: {:?}", node);
            }
            !nested
        })
        .cloned()
        .collect()
}

/// Keeps a record unless an earlier one with the same identifier covered an
/// overlapping box. Records without an identifier are always kept.
///
/// The session is only read; call [`remember_ads`] once the kept records
/// have been stored.
pub fn dedup_ads<N: Eq + Hash>(
    session: &SessionState<N>,
    found: Vec<(AdRecord, Rect)>,
) -> Vec<(AdRecord, Rect)> {
    let mut pass_seen: HashMap<Identifier, Rect> = HashMap::new();
    let mut kept = Vec::with_capacity(found.len());
    for (ad, rect) in found {
        if let Some(id) = ad.id.clone() {
            let previous = pass_seen
                .get(&id)
                .or_else(|| session.last_seen(&id).map(|(_, rect)| rect));
            if let Some(previous) = previous
                && rects_overlap(previous, &rect)
            {
                debug!("Found duplicate ad {}", id);
                continue;
            }
            pass_seen.insert(id, rect);
        }
        kept.push((ad, rect));
    }
    kept
}

/// Records where each kept ad was last seen, for dedup in later passes.
pub fn remember_ads<N: Eq + Hash>(session: &mut SessionState<N>, kept: &[(AdRecord, Rect)]) {
    for (ad, rect) in kept {
        if let Some(id) = &ad.id {
            session.remember(id.clone(), ad.clone(), *rect);
        }
    }
}
