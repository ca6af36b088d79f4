// Report generation from database

use crate::data::Database;
use adlens_scanner::{AdRecord, Target};
use rusqlite::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const TOP_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    pub total_ads: usize,
    pub ads_with_targeting: usize,
    pub total_targets: usize,
    pub top_advertisers: Vec<AdvertiserCount>,
    pub target_counts: Vec<KindCount>,
    pub top_segments: Vec<SegmentCount>,
    pub ads: Vec<AdRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertiserCount {
    pub advertiser: String,
    pub ads: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCount {
    pub kind: String,
    pub segment: String,
    pub count: usize,
}

pub fn gather_report_data(db: &Database) -> Result<ReportData> {
    let ads = db.get_ads()?;
    let targets = db.get_targets()?;
    let ads_with_targeting = ads.iter().filter(|ad| ad.has_targeting()).count();

    // Advertiser ranking
    let top_advertisers = {
        let conn = db.get_connection();
        let mut stmt = conn.prepare(
            "SELECT advertiser, COUNT(*) AS n FROM ads
             WHERE advertiser IS NOT NULL
             GROUP BY advertiser
             ORDER BY n DESC, advertiser
             LIMIT ?1",
        )?;

        stmt.query_map([TOP_LIMIT as i64], |row| {
            Ok(AdvertiserCount {
                advertiser: row.get(0)?,
                ads: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?
    };

    let target_counts = db
        .get_target_counts_by_kind()?
        .into_iter()
        .map(|(kind, count)| KindCount { kind, count })
        .collect();

    Ok(ReportData {
        start_date: db.get_start_date()?,
        total_ads: ads.len(),
        ads_with_targeting,
        total_targets: targets.len(),
        top_advertisers,
        target_counts,
        top_segments: rank_segments(&targets, TOP_LIMIT),
        ads,
    })
}

/// Segments that occur most often, ties broken alphabetically.
pub fn rank_segments(targets: &[Target], limit: usize) -> Vec<SegmentCount> {
    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for target in targets {
        if let Some(segment) = target.segment.as_deref() {
            *counts.entry((target.kind.as_str(), segment)).or_default() += 1;
        }
    }

    let mut ranked: Vec<SegmentCount> = counts
        .into_iter()
        .map(|((kind, segment), count)| SegmentCount {
            kind: kind.to_string(),
            segment: segment.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.segment.cmp(&b.segment))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    ranked.truncate(limit);
    ranked
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data),
        ReportFormat::Csv => Ok(generate_csv_report(data)),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    // Header
    report.push_str(RULE);
    report.push_str("                           ADLENS TARGETING REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    if let Some(start) = data.start_date {
        report.push_str(&format!("Collecting since:  {}\n", format_timestamp(start)));
    }
    report.push_str(&format!("Ads captured:      {}\n", data.total_ads));
    report.push_str(&format!("With targeting:    {}\n", data.ads_with_targeting));
    report.push_str(&format!("Targeting entries: {}\n", data.total_targets));
    report.push('\n');

    if !data.top_advertisers.is_empty() {
        report.push_str(RULE);
        report.push_str("TOP ADVERTISERS\n");
        report.push_str(RULE);
        report.push('\n');
        for entry in &data.top_advertisers {
            report.push_str(&format!("  {:>5}  {}\n", entry.ads, entry.advertiser));
        }
        report.push('\n');
    }

    if !data.target_counts.is_empty() {
        report.push_str(RULE);
        report.push_str("TARGETING BY KIND\n");
        report.push_str(RULE);
        report.push('\n');
        for entry in &data.target_counts {
            report.push_str(&format!("  {:>5}  {}\n", entry.count, entry.kind));
        }
        report.push('\n');
    }

    if !data.top_segments.is_empty() {
        report.push_str(RULE);
        report.push_str("TOP SEGMENTS\n");
        report.push_str(RULE);
        report.push('\n');
        for entry in &data.top_segments {
            report.push_str(&format!("  {:>5}  {} ({})\n", entry.count, entry.segment, entry.kind));
        }
        report.push('\n');
    }

    let targeted: Vec<&AdRecord> = data.ads.iter().filter(|ad| ad.has_targeting()).collect();
    if !targeted.is_empty() {
        report.push_str(RULE);
        report.push_str("WHY YOU SAW THESE ADS\n");
        report.push_str(RULE);
        report.push('\n');

        for (idx, ad) in targeted.iter().enumerate() {
            let advertiser = ad.advertiser.as_deref().unwrap_or("Unknown advertiser");
            report.push_str(&format!("[{}] {}\n", idx + 1, advertiser));
            if let Some(ref title) = ad.title {
                report.push_str(&format!("Title:        {}\n", title));
            }
            if let Some(ref id) = ad.id {
                report.push_str(&format!("Ad ID:        {}\n", id));
            }
            report.push_str(&format!("Seen:         {}\n", format_timestamp_millis(ad.timestamp)));
            if !ad.message.is_empty() {
                report.push_str("\nMessage:\n");
                report.push_str(&wrap_text(&ad.message, 80, "  "));
            }
            report.push_str("\nTargeting:\n");
            for target in ad.targets.iter() {
                report.push_str(&format!("  - {}\n", describe_target(target)));
            }
            report.push('\n');
            report.push_str("────────────────────────────────────────────────────────────────────────────────\n\n");
        }
    }

    // Footer
    report.push_str(RULE);
    report.push_str("                                End of Report\n");
    report.push_str(RULE);
    report.push_str("\nGenerated by Adlens\n\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Adlens",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "summary": {
                "collecting_since": data.start_date.map(format_iso8601_timestamp),
                "total_ads": data.total_ads,
                "ads_with_targeting": data.ads_with_targeting,
                "total_targets": data.total_targets
            },
            "top_advertisers": data.top_advertisers,
            "target_counts": data.target_counts,
            "top_segments": data.top_segments,
            "ads": data.ads
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// One row per ad; targets are flattened into a single `;`-separated cell.
pub fn generate_csv_report(data: &ReportData) -> String {
    let mut report = String::from("ad_id,advertiser,title,captured_at,targets\n");

    for ad in &data.ads {
        let targets = ad
            .targets
            .iter()
            .map(describe_target)
            .collect::<Vec<_>>()
            .join("; ");

        let row = [
            ad.id.as_ref().map(|id| id.as_str().to_string()).unwrap_or_default(),
            ad.advertiser.clone().unwrap_or_default(),
            ad.title.clone().unwrap_or_default(),
            format_iso8601_timestamp(ad.timestamp / 1000),
            targets,
        ];
        report.push_str(
            &row.iter()
                .map(|cell| csv_escape(cell))
                .collect::<Vec<_>>()
                .join(","),
        );
        report.push('\n');
    }

    report
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::from("# Adlens Targeting Report\n\n");

    if let Some(start) = data.start_date {
        report.push_str(&format!("Collecting since {}.\n\n", format_timestamp(start)));
    }

    report.push_str("## Summary\n\n");
    report.push_str("| Metric | Value |\n|---|---|\n");
    report.push_str(&format!("| Ads captured | {} |\n", data.total_ads));
    report.push_str(&format!("| With targeting | {} |\n", data.ads_with_targeting));
    report.push_str(&format!("| Targeting entries | {} |\n\n", data.total_targets));

    if !data.top_advertisers.is_empty() {
        report.push_str("## Top advertisers\n\n| Advertiser | Ads |\n|---|---|\n");
        for entry in &data.top_advertisers {
            report.push_str(&format!("| {} | {} |\n", markdown_escape(&entry.advertiser), entry.ads));
        }
        report.push('\n');
    }

    if !data.target_counts.is_empty() {
        report.push_str("## Targeting by kind\n\n| Kind | Count |\n|---|---|\n");
        for entry in &data.target_counts {
            report.push_str(&format!("| {} | {} |\n", entry.kind, entry.count));
        }
        report.push('\n');
    }

    if !data.top_segments.is_empty() {
        report.push_str("## Top segments\n\n| Segment | Kind | Count |\n|---|---|---|\n");
        for entry in &data.top_segments {
            report.push_str(&format!(
                "| {} | {} | {} |\n",
                markdown_escape(&entry.segment),
                entry.kind,
                entry.count
            ));
        }
        report.push('\n');
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

// Helper functions
fn describe_target(target: &Target) -> String {
    match target.segment {
        Some(ref segment) => format!("{}: {}", target.kind, segment),
        None => target.kind.to_string(),
    }
}

fn csv_escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn markdown_escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_default();
    datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_timestamp_millis(millis: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
    datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_iso8601_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_default();
    datetime.to_rfc3339()
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.len() && !current_line.is_empty() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlens_scanner::TargetKind;

    #[test]
    fn test_wrap_text_breaks_long_lines() {
        let wrapped = wrap_text("one two three four five", 12, "  ");
        assert_eq!(wrapped, "  one two\n  three four\n  five\n");
    }

    #[test]
    fn test_csv_escape_quotes_separators() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("Smith, Sons"), "\"Smith, Sons\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_rank_segments_orders_by_count_then_name() {
        let targets = vec![
            Target::with_segment(TargetKind::Interest, "Cycling"),
            Target::with_segment(TargetKind::Interest, "Baking"),
            Target::with_segment(TargetKind::Interest, "Cycling"),
            Target::new(TargetKind::Age),
        ];

        let ranked = rank_segments(&targets, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].segment, "Cycling");
        assert_eq!(ranked[0].count, 2);
        assert_eq!(ranked[1].segment, "Baking");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(ReportFormat::from_str("MD"), Some(ReportFormat::Markdown));
        assert_eq!(ReportFormat::from_str("csv"), Some(ReportFormat::Csv));
        assert_eq!(ReportFormat::from_str("html"), None);
    }
}
