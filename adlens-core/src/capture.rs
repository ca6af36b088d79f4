use crate::data::Database;
use adlens_scanner::scanner::ProgressCallback;
use adlens_scanner::{
    DisclosureFetcher, ExtractionTiming, ScanOutcome, Scanner, SnapshotDocument, Viewport,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Options for configuring a capture over a saved page
pub struct CaptureOptions {
    pub snapshot: PathBuf,
    pub viewport: Viewport,
    pub timing: ExtractionTiming,
    pub show_progress_bars: bool,
}

impl CaptureOptions {
    pub fn new(snapshot: impl Into<PathBuf>) -> Self {
        Self {
            snapshot: snapshot.into(),
            viewport: Viewport::default(),
            timing: ExtractionTiming::default(),
            show_progress_bars: false,
        }
    }
}

#[derive(Debug)]
pub struct CaptureSummary {
    pub session_id: String,
    pub outcome: ScanOutcome,
}

impl CaptureSummary {
    pub fn ads_found(&self) -> usize {
        match self.outcome {
            ScanOutcome::Completed(ref report) => report.ads.len(),
            _ => 0,
        }
    }
}

/// Runs one scan pass over a page snapshot and records it as a capture
/// session. Ads and targets go to the database through the scanner.
pub async fn execute_capture<F: DisclosureFetcher>(
    db: &mut Database,
    options: CaptureOptions,
    fetcher: F,
) -> Result<CaptureSummary, String> {
    let CaptureOptions {
        snapshot,
        viewport,
        timing,
        show_progress_bars,
    } = options;

    let html = fs::read_to_string(&snapshot)
        .map_err(|e| format!("Failed to read snapshot {}: {}", snapshot.display(), e))?;
    let document = SnapshotDocument::parse(&html).with_viewport(viewport);

    let source = snapshot.display().to_string();
    let session_id = db
        .create_session(&source)
        .map_err(|e| format!("Failed to create capture session: {}", e))?;
    db.init_start_date()
        .map_err(|e| format!("Failed to record start date: {}", e))?;
    db.attach_session(Some(session_id.clone()));

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Looking for ads...");
        Some(pb)
    } else {
        None
    };

    let mut scanner = Scanner::new(document, fetcher, &mut *db).with_timing(timing);
    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        let callback: ProgressCallback = Arc::new(move |current: usize, total: usize| {
            pb.set_message(format!("Extracting candidate {}/{}", current, total));
            pb.tick();
        });
        scanner = scanner.with_progress_callback(callback);
    }

    let outcome = scanner.scan().await;
    drop(scanner);
    db.attach_session(None);

    match outcome {
        Ok(outcome) => {
            let summary = CaptureSummary {
                session_id,
                outcome,
            };
            db.complete_session(&summary.session_id, summary.ads_found())
                .map_err(|e| format!("Failed to complete capture session: {}", e))?;

            if let Some(pb) = progress_bar {
                pb.finish_with_message(format!(
                    "Capture complete: {} new ads",
                    summary.ads_found()
                ));
            }
            info!("Capture {} stored {} ads", summary.session_id, summary.ads_found());
            Ok(summary)
        }
        Err(e) => {
            if let Err(db_err) = db.fail_session(&session_id) {
                warn!("Failed to mark session {} as failed: {}", session_id, db_err);
            }
            if let Some(pb) = progress_bar {
                pb.abandon_with_message("Capture failed");
            }
            Err(format!("Capture failed: {}", e))
        }
    }
}
