//! Drives a single candidate from classification to a finished ad record.
//!
//! [`Extraction`] is a plain state machine: `tick` advances it as far as it
//! can without waiting, and the disclosure response is fed back through
//! `complete_disclosure`. [`extract`] runs one machine on the tokio clock with
//! a fixed poll interval and a watchdog deadline.

use crate::advert;
use crate::classify::{self, CandidateKind};
use crate::disclosure::{self, DisclosureFetcher};
use crate::error::{self, ExtractError};
use crate::host::HostDocument;
use crate::model::{AdRecord, Identifier};
use crate::resolver::{IdentityResolver, ResolverProgress};
use crate::sanitize;
use crate::session::SessionState;
use crate::targeting;
use chrono::Utc;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionTiming {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// How long disclosure fetches stay paused after one fails.
    pub disclosure_cooldown: Duration,
}

impl Default for ExtractionTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            timeout: Duration::from_secs(10),
            disclosure_cooldown: Duration::from_secs(240),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionState {
    Initial,
    Timeline,
    Sidebar,
    TimelineId,
    SidebarId,
    Cached,
    Menu,
    Targeting,
    WaitTargeting,
    Done,
    Error(ExtractError),
}

#[derive(Debug, Clone)]
pub struct Extracted<N> {
    pub ad: AdRecord,
    /// The node the record was taken from (the innermost content wrapper
    /// for timeline posts).
    pub node: N,
}

enum Step {
    Continue,
    Yield,
    Fetch(String),
}

#[derive(Debug)]
pub struct Extraction<N> {
    node: N,
    state: ExtractionState,
    history: Vec<ExtractionState>,
    kind: Option<CandidateKind>,
    container: Option<N>,
    ad: Option<AdRecord>,
    cache_key: Option<Identifier>,
    resolver: Option<IdentityResolver<N>>,
    disclosure_url: Option<String>,
    cooldown: Duration,
}

impl<N: Clone + Eq + Hash + Debug> Extraction<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            state: ExtractionState::Initial,
            history: vec![ExtractionState::Initial],
            kind: None,
            container: None,
            ad: None,
            cache_key: None,
            resolver: None,
            disclosure_url: None,
            cooldown: ExtractionTiming::default().disclosure_cooldown,
        }
    }

    pub fn with_disclosure_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn state(&self) -> &ExtractionState {
        &self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[ExtractionState] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ExtractionState::Done | ExtractionState::Error(_))
    }

    /// Advances until the machine has to wait. Returns the action target to
    /// fetch when it has just moved into `WaitTargeting`.
    pub fn tick<H>(&mut self, host: &mut H, session: &mut SessionState<N>, now: Instant) -> Option<String>
    where
        H: HostDocument<Node = N>,
    {
        while !self.is_terminal() {
            match self.step(host, session, now) {
                Step::Continue => {}
                Step::Yield => return None,
                Step::Fetch(action) => return Some(action),
            }
        }
        None
    }

    /// Feeds the disclosure response back in. Ignored unless the machine is
    /// waiting for it.
    pub fn complete_disclosure(
        &mut self,
        response: error::Result<String>,
        session: &mut SessionState<N>,
        now: Instant,
    ) {
        if self.state != ExtractionState::WaitTargeting {
            debug!("Ignoring disclosure response in state {:?}", self.state);
            return;
        }

        match response.and_then(|body| disclosure::decode_payload(&body)) {
            Ok(html) => {
                let text = sanitize::disclosure_text(&html);
                match (targeting::parse_disclosure(&text), self.ad.as_mut()) {
                    (Some(found), Some(ad)) => ad.attach_disclosure(found),
                    (None, _) => debug!("No targeting template matched the disclosure"),
                    (Some(_), None) => {}
                }
            }
            Err(e) => {
                warn!(
                    "Disclosure fetch failed, pausing fetches for {:?}: {}",
                    self.cooldown, e
                );
                session.block_disclosures_until(now + self.cooldown);
            }
        }
        self.finish(session);
    }

    /// Watchdog expiry. A menu the machine opened is closed again.
    pub fn expire<H>(&mut self, host: &mut H)
    where
        H: HostDocument<Node = N>,
    {
        if self.is_terminal() {
            return;
        }
        if let Some(mut resolver) = self.resolver.take() {
            resolver.abandon(host, ExtractError::Timeout);
        }
        self.fail(ExtractError::Timeout);
    }

    pub fn into_result(self) -> Result<Extracted<N>, ExtractError> {
        match (self.state, self.ad) {
            (ExtractionState::Done, Some(ad)) => Ok(Extracted {
                ad,
                node: self.node,
            }),
            (ExtractionState::Error(e), _) => Err(e),
            _ => Err(ExtractError::Invariant),
        }
    }

    fn step<H>(&mut self, host: &mut H, session: &mut SessionState<N>, now: Instant) -> Step
    where
        H: HostDocument<Node = N>,
    {
        match self.state {
            ExtractionState::Initial => match classify::classify(&*host, &self.node) {
                Some(kind) => {
                    self.kind = Some(kind);
                    match kind {
                        CandidateKind::Timeline => self.promote(ExtractionState::Timeline),
                        CandidateKind::Sidebar => self.promote(ExtractionState::Sidebar),
                    }
                }
                None => self.fail(ExtractError::NotAnAd),
            },
            ExtractionState::Timeline => match classify::timeline_post(&*host, &self.node) {
                Ok((content, container)) => {
                    self.node = content;
                    self.capture(&*host, container);
                    self.promote(ExtractionState::TimelineId)
                }
                Err(e) => self.fail(e),
            },
            ExtractionState::Sidebar => match classify::sidebar_unit(&*host, &self.node) {
                Ok(section) => {
                    self.capture(&*host, section);
                    self.promote(ExtractionState::SidebarId)
                }
                Err(e) => self.fail(e),
            },
            ExtractionState::TimelineId | ExtractionState::SidebarId => {
                self.locate_control(&*host, session)
            }
            ExtractionState::Cached => {
                let cached = self
                    .cache_key
                    .as_ref()
                    .and_then(|key| session.cached(key))
                    .cloned();
                match cached {
                    Some(ad) => {
                        self.ad = Some(ad);
                        self.finish(session)
                    }
                    None => self.fail(ExtractError::Invariant),
                }
            }
            ExtractionState::Menu => {
                let Some(resolver) = self.resolver.as_mut() else {
                    return self.fail(ExtractError::Invariant);
                };
                match resolver.tick(host) {
                    ResolverProgress::Pending => Step::Yield,
                    ResolverProgress::Resolved(resolution) => {
                        if let Some(ad) = self.ad.as_mut() {
                            ad.id = Some(resolution.id);
                        }
                        self.disclosure_url = Some(resolution.disclosure_url);
                        self.resolver = None;
                        self.promote(ExtractionState::Targeting)
                    }
                    ResolverProgress::Failed(e) => self.fail(e),
                }
            }
            ExtractionState::Targeting => {
                let Some(action) = self.disclosure_url.clone() else {
                    return self.fail(ExtractError::Invariant);
                };
                if session.disclosures_blocked(now) {
                    debug!("Disclosure fetches paused, finishing without targeting");
                    return self.finish(session);
                }
                self.promote(ExtractionState::WaitTargeting);
                Step::Fetch(action)
            }
            ExtractionState::WaitTargeting
            | ExtractionState::Done
            | ExtractionState::Error(_) => Step::Yield,
        }
    }

    fn capture<H>(&mut self, host: &H, container: N)
    where
        H: HostDocument<Node = N>,
    {
        let html = host.outer_html(&self.node);
        self.ad = Some(advert::extract_ad(&html, Utc::now().timestamp_millis()));
        self.container = Some(container);
    }

    fn locate_control<H>(&mut self, host: &H, session: &SessionState<N>) -> Step
    where
        H: HostDocument<Node = N>,
    {
        let Some(container) = self.container.as_ref() else {
            return self.fail(ExtractError::Invariant);
        };

        let located = match self.kind {
            Some(CandidateKind::Timeline) => classify::timeline_control(host, container)
                .map(|control| {
                    let resolver = IdentityResolver::timeline(control.toggle, &control.key);
                    (control.key, resolver)
                }),
            Some(CandidateKind::Sidebar) => classify::sidebar_control(host, container)
                .map(|control| {
                    let resolver = IdentityResolver::sidebar(control.toggle, control.control);
                    (control.key, resolver)
                }),
            None => Err(ExtractError::Invariant),
        };

        match located {
            Ok((key, resolver)) => {
                let cached = session.cached(&key).is_some();
                self.cache_key = Some(key);
                if cached {
                    self.promote(ExtractionState::Cached)
                } else {
                    self.resolver = Some(resolver);
                    self.promote(ExtractionState::Menu)
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn finish(&mut self, session: &mut SessionState<N>) -> Step {
        match (self.cache_key.clone(), self.ad.clone()) {
            (Some(key), Some(ad)) => {
                session.cache_ad(key, ad);
                self.promote(ExtractionState::Done)
            }
            _ => self.fail(ExtractError::Invariant),
        }
    }

    fn fail(&mut self, error: ExtractError) -> Step {
        if error == ExtractError::Invariant {
            warn!("Extraction hit an impossible state after {:?}", self.history);
        }
        self.promote(ExtractionState::Error(error))
    }

    fn promote(&mut self, state: ExtractionState) -> Step {
        self.history.push(state.clone());
        self.state = state;
        Step::Continue
    }
}

/// Runs one extraction to completion.
///
/// The machine is ticked on a fixed interval until it finishes or the
/// watchdog fires. The disclosure request runs in its own task; a response
/// that arrives after the watchdog is dropped.
pub async fn extract<H, F>(
    host: &mut H,
    session: &mut SessionState<H::Node>,
    fetcher: &F,
    node: H::Node,
    timing: &ExtractionTiming,
) -> Result<Extracted<H::Node>, ExtractError>
where
    H: HostDocument,
    F: DisclosureFetcher + ?Sized,
{
    let mut machine = Extraction::new(node).with_disclosure_cooldown(timing.disclosure_cooldown);

    let deadline = tokio::time::sleep(timing.timeout);
    tokio::pin!(deadline);
    let mut poll = tokio::time::interval(timing.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let (tx, mut rx) = mpsc::channel(1);

    while !machine.is_terminal() {
        tokio::select! {
            biased;
            _ = &mut deadline => machine.expire(host),
            Some(response) = rx.recv() => {
                machine.complete_disclosure(response, session, Instant::now());
            }
            _ = poll.tick() => {
                if let Some(action) = machine.tick(host, session, Instant::now()) {
                    let request = fetcher.fetch(&action);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let _ = tx.send(request.await).await;
                    });
                }
            }
        }
    }

    debug!("Extraction finished: {:?}", machine.history());
    machine.into_result()
}
