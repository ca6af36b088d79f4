// Tests for scan passes, filtering, dedup and the trigger loop

mod common;

use adlens_scanner::error::Result as ScanResult;
use adlens_scanner::{
    AdRecord, AdStore, Identifier, MemoryStore, ScanError, ScanOutcome, ScanReport, ScanTrigger,
    Scanner, SnapshotDocument, Target,
};
use common::{FakeFetcher, page, payload};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn example_fetcher() -> FakeFetcher {
    FakeFetcher::replying(payload(&format!("<div>{}</div>", common::EXAMPLE_PANEL)))
}

fn new_scanner(
    html: &str,
    fetcher: &FakeFetcher,
) -> Scanner<SnapshotDocument, FakeFetcher, MemoryStore> {
    Scanner::new(SnapshotDocument::parse(html), fetcher.clone(), MemoryStore::new())
}

/// Rejects the first `failures` batches, then behaves like a memory store.
struct FlakyStore {
    inner: MemoryStore,
    failures: usize,
}

impl AdStore for FlakyStore {
    fn is_monitor_enabled(&self) -> ScanResult<bool> {
        self.inner.is_monitor_enabled()
    }

    fn store_ads(&mut self, ads: &[AdRecord]) -> ScanResult<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(ScanError::Storage("database is locked".to_string()));
        }
        self.inner.store_ads(ads)
    }

    fn store_targets(&mut self, targets: &[Target]) -> ScanResult<()> {
        self.inner.store_targets(targets)
    }
}

fn completed(outcome: ScanOutcome) -> ScanReport {
    match outcome {
        ScanOutcome::Completed(report) => report,
        other => panic!("expected a completed pass, got {other:?}"),
    }
}

fn mixed_page() -> String {
    page(&[
        common::timeline_ad(1, "101", 0.0),
        common::timeline_post(2, 320.0),
        common::timeline_ad(3, "103", 640.0),
        common::sidebar_ad(4, "104", 0.0),
    ])
}

// ============================================================================
// Single pass
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scan_emits_one_batch() {
    let fetcher = example_fetcher();
    let mut scanner = new_scanner(&mixed_page(), &fetcher);

    let report = completed(scanner.scan().await.unwrap());

    assert_eq!(report.counts.all_posts, 4);
    assert_eq!(report.counts.visible, 4);
    assert_eq!(report.counts.unscanned, 4);
    assert_eq!(report.counts.ads, 3);
    assert_eq!(report.counts.not_ads, 1);
    assert_eq!(report.counts.deduped_new_ads, 3);

    let ids: Vec<_> = report.ads.iter().filter_map(|ad| ad.id.clone()).collect();
    assert_eq!(
        ids,
        vec![
            Identifier::new("101"),
            Identifier::new("103"),
            Identifier::new("104")
        ]
    );

    let store = scanner.store();
    assert_eq!(store.batches, 1);
    assert_eq!(store.ads.len(), 3);
    let expected_targets: usize = report.ads.iter().map(|ad| ad.targets.len()).sum();
    assert_eq!(store.targets.len(), expected_targets);
    assert!(expected_targets > 0);
    assert!(!scanner.session().scan_in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_failed_store_is_retried_next_pass() {
    let fetcher = example_fetcher();
    let store = FlakyStore {
        inner: MemoryStore::new(),
        failures: 1,
    };
    let mut scanner = Scanner::new(SnapshotDocument::parse(&mixed_page()), fetcher.clone(), store);

    let err = scanner.scan().await.unwrap_err();
    assert!(matches!(err, ScanError::Storage(_)));
    assert!(!scanner.session().scan_in_flight());
    assert!(scanner.session().last_seen(&Identifier::new("101")).is_none());
    assert_eq!(scanner.store().inner.ads.len(), 0);

    let report = completed(scanner.scan().await.unwrap());
    assert_eq!(report.counts.unscanned, 3, "only the plain post stays scanned");
    assert_eq!(report.counts.deduped_new_ads, 3);

    let store = &scanner.store().inner;
    assert_eq!(store.batches, 1);
    assert_eq!(store.ads.len(), 3);
    assert!(!store.targets.is_empty());
    assert_eq!(fetcher.calls().len(), 3, "retried ads come from the identity cache");
    assert!(scanner.session().last_seen(&Identifier::new("101")).is_some());

    let report = completed(scanner.scan().await.unwrap());
    assert_eq!(report.counts.unscanned, 0);
}

#[tokio::test(start_paused = true)]
async fn test_offscreen_posts_are_skipped() {
    let fetcher = example_fetcher();
    let html = page(&[
        common::timeline_ad(1, "101", 0.0),
        common::timeline_ad(2, "102", 2400.0),
    ]);
    let mut scanner = new_scanner(&html, &fetcher);

    let report = completed(scanner.scan().await.unwrap());
    assert_eq!(report.counts.all_posts, 2);
    assert_eq!(report.counts.visible, 1);
    assert_eq!(fetcher.calls(), vec![common::action("101")]);
}

#[tokio::test(start_paused = true)]
async fn test_nested_post_keeps_outer_candidate() {
    let html = page(&[r##"<div id="hyperfeed_story_9">
        <div id="share" class="userContentWrapper" data-rect="0 0 500 600">
            <div class="clearfix"><a href="#">Sponsored</a></div>
            <div class="uiPopover"><a id="u_0_9" href="#">Options</a></div>
            <div id="inner" class="userContentWrapper" data-rect="0 100 500 300">
                <div class="userContent"><p>Inner ad</p></div>
            </div>
        </div>
    </div>
    <div class="uiLayer" data-ownerid="u_0_9"><ul>
        <li data-feed-option-name="FeedAdSeenReasonOption"><a ajaxify="/ads/preferences/dialog/?id=909">Why?</a></li>
    </ul></div>"##
        .to_string()]);
    let fetcher = example_fetcher();
    let mut scanner = new_scanner(&html, &fetcher);
    let share = scanner.host().element_by_id("share").unwrap();
    let inner = scanner.host().element_by_id("inner").unwrap();

    let report = completed(scanner.scan().await.unwrap());

    assert_eq!(report.counts.unscanned, 2);
    assert_eq!(report.counts.nested_dropped, 1);
    assert_eq!(report.ads.len(), 1);
    assert_eq!(report.ads[0].message.trim(), "Inner ad");
    assert!(scanner.session().has_seen(&share));
    assert!(!scanner.session().has_seen(&inner));
}

#[tokio::test(start_paused = true)]
async fn test_progress_callback_reports_each_attempt() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let fetcher = example_fetcher();
    let mut scanner = new_scanner(&mixed_page(), &fetcher).with_progress_callback(Arc::new(
        move |index: usize, total: usize| sink.lock().unwrap().push((index, total)),
    ));

    scanner.scan().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
}

// ============================================================================
// Dedup and at-most-once
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_same_id_overlapping_is_deduped() {
    let fetcher = example_fetcher();
    let html = page(&[
        common::timeline_ad(1, "555", 0.0),
        common::timeline_ad(2, "555", 100.0),
    ]);
    let mut scanner = new_scanner(&html, &fetcher);

    let report = completed(scanner.scan().await.unwrap());
    assert_eq!(report.counts.raw_new_ads, 2);
    assert_eq!(report.counts.deduped_new_ads, 1);
    assert_eq!(scanner.store().ads.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_id_apart_is_kept() {
    let fetcher = example_fetcher();
    let html = page(&[
        common::timeline_ad(1, "555", 0.0),
        common::timeline_ad(2, "555", 400.0),
    ]);
    let mut scanner = new_scanner(&html, &fetcher);

    let report = completed(scanner.scan().await.unwrap());
    assert_eq!(report.counts.deduped_new_ads, 2);
}

#[tokio::test(start_paused = true)]
async fn test_each_node_extracted_at_most_once() {
    let fetcher = example_fetcher();
    let mut scanner = new_scanner(&mixed_page(), &fetcher);

    completed(scanner.scan().await.unwrap());
    let clicks = scanner.host().total_clicks();

    for _ in 0..3 {
        let report = completed(scanner.scan().await.unwrap());
        assert_eq!(report.counts.unscanned, 0);
        assert!(report.ads.is_empty());
    }

    assert_eq!(fetcher.calls().len(), 3);
    assert_eq!(scanner.host().total_clicks(), clicks);
    assert_eq!(scanner.store().batches, 1);
    assert_eq!(scanner.session().seen_count(), 4);
}

// ============================================================================
// Gating
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_disabled_monitor_skips_pass() {
    let fetcher = example_fetcher();
    let mut scanner = Scanner::new(
        SnapshotDocument::parse(&mixed_page()),
        fetcher.clone(),
        MemoryStore::disabled(),
    );

    assert!(matches!(scanner.scan().await.unwrap(), ScanOutcome::Disabled));
    assert_eq!(scanner.session().seen_count(), 0);
    assert!(fetcher.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scan_in_flight_drops_trigger() {
    let fetcher = example_fetcher();
    let mut scanner = new_scanner(&mixed_page(), &fetcher);

    assert!(scanner.session_mut().begin_scan());
    assert!(matches!(scanner.scan().await.unwrap(), ScanOutcome::InFlight));
    assert_eq!(scanner.session().seen_count(), 0);

    scanner.session_mut().end_scan();
    completed(scanner.scan().await.unwrap());
}

// ============================================================================
// Trigger loop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_bursts_are_debounced() {
    let fetcher = example_fetcher();
    let mut scanner = new_scanner(&mixed_page(), &fetcher);
    let (tx, rx) = mpsc::channel(8);
    for trigger in [ScanTrigger::Scroll, ScanTrigger::Scroll, ScanTrigger::Resize] {
        tx.send(trigger).await.unwrap();
    }
    drop(tx);

    let started = Instant::now();
    let passes = scanner.run(rx).await;

    assert_eq!(passes, 1);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(scanner.store().batches, 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_scan_waits_for_initial_delay() {
    let fetcher = example_fetcher();
    let mut scanner = new_scanner(&mixed_page(), &fetcher).with_initial_delay(Duration::from_secs(2));
    let (tx, rx) = mpsc::channel::<ScanTrigger>(1);
    drop(tx);

    let started = Instant::now();
    assert_eq!(scanner.run(rx).await, 1);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_triggers_during_a_pass_are_dropped() {
    let fetcher = example_fetcher().with_delay(Duration::from_secs(1));
    let mut scanner = new_scanner(&mixed_page(), &fetcher);
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5200)).await;
        tx.send(ScanTrigger::Scroll).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    assert_eq!(scanner.run(rx).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_resets_session() {
    let fetcher = example_fetcher();
    let mut scanner = new_scanner(&mixed_page(), &fetcher);
    completed(scanner.scan().await.unwrap());
    assert_eq!(scanner.session().seen_count(), 4);

    let (tx, rx) = mpsc::channel(1);
    tx.send(ScanTrigger::Navigated).await.unwrap();
    drop(tx);

    assert_eq!(scanner.run(rx).await, 1);
    assert_eq!(fetcher.calls().len(), 6, "a new page load scans everything again");
    assert_eq!(scanner.store().batches, 2);
}
