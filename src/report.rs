//! Plain-text coverage report built from the sample log and grid predictions.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::grid::GridPoint;
use crate::samples::RawSampleRow;

/// Signal level below which a predicted point counts as a weak zone.
pub const DEFAULT_WEAK_THRESHOLD_DBM: f64 = -80.0;
/// Number of weakest points listed in a report.
pub const DEFAULT_MAX_FINDINGS: usize = 5;

const TITLE: &str = "AI Wi-Fi Insights Report";
const TITLE_RULE: &str = "=========================";
const NO_PREDICTIONS: &str =
    "Insufficient data for predictions. Collect more points and retrain the model.";
const RECOMMENDATIONS: [&str; 3] = [
    "- Add or reposition access points near predicted weak areas.",
    "- Reduce obstructions (walls, metal) along client-to-AP paths.",
    "- Prefer 2.4 GHz for range, 5 GHz for speed as needed.",
];

/// Thresholds applied when summarizing predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    pub weak_threshold_dbm: f64,
    pub max_findings: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            weak_threshold_dbm: DEFAULT_WEAK_THRESHOLD_DBM,
            max_findings: DEFAULT_MAX_FINDINGS,
        }
    }
}

/// A predicted point below the weak-signal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageFinding {
    pub latitude: f64,
    pub longitude: f64,
    pub predicted_rssi: f64,
}

/// Aggregate numbers over the raw log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSummary {
    /// Rows in the log, valid or not.
    pub total: usize,
    /// Distinct network names; the empty name is its own category.
    pub unique_ssids: usize,
    /// Mean over rows with a numeric RSSI.
    pub mean_rssi: Option<f64>,
}

impl SampleSummary {
    pub fn from_rows(rows: &[RawSampleRow]) -> Self {
        let unique_ssids = rows
            .iter()
            .map(|row| row.ssid.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let readings: Vec<f64> = rows.iter().filter_map(RawSampleRow::rssi).collect();
        let mean_rssi =
            (!readings.is_empty()).then(|| readings.iter().sum::<f64>() / readings.len() as f64);
        Self {
            total: rows.len(),
            unique_ssids,
            mean_rssi,
        }
    }
}

/// Weakest predicted points below the threshold, weakest first.
pub fn weak_zones(points: &[GridPoint], options: &ReportOptions) -> Vec<CoverageFinding> {
    let mut findings: Vec<CoverageFinding> = points
        .iter()
        .filter(|point| point.predicted_rssi < options.weak_threshold_dbm)
        .map(|point| CoverageFinding {
            latitude: point.latitude,
            longitude: point.longitude,
            predicted_rssi: point.predicted_rssi,
        })
        .collect();
    findings.sort_by(|a, b| a.predicted_rssi.total_cmp(&b.predicted_rssi));
    findings.truncate(options.max_findings);
    findings
}

/// Number of predicted points strictly below `threshold_dbm`.
pub fn weak_count(points: &[GridPoint], threshold_dbm: f64) -> usize {
    points
        .iter()
        .filter(|point| point.predicted_rssi < threshold_dbm)
        .count()
}

/// Render the fixed-layout report.
///
/// dBm values use one decimal place and coordinates five.
pub fn summarize(rows: &[RawSampleRow], points: &[GridPoint], options: &ReportOptions) -> String {
    let summary = SampleSummary::from_rows(rows);
    let mut lines: Vec<String> = vec![
        TITLE.to_string(),
        TITLE_RULE.to_string(),
        String::new(),
        format!("Total readings: {}", summary.total),
        format!("Unique SSIDs: {}", summary.unique_ssids),
    ];
    if let Some(mean) = summary.mean_rssi {
        lines.push(format!("Average RSSI: {mean:.1} dBm"));
    }
    lines.push(String::new());

    if points.is_empty() {
        lines.push(NO_PREDICTIONS.to_string());
    } else {
        let findings = weak_zones(points, options);
        if findings.is_empty() {
            lines.push("No strong dead zones predicted. Coverage appears acceptable.".to_string());
        } else {
            lines.push("Predicted dead zones (weak signal):".to_string());
            for finding in &findings {
                lines.push(format!(
                    " - ({:.5}, {:.5}) around {:.1} dBm",
                    finding.latitude, finding.longitude, finding.predicted_rssi
                ));
            }
        }
    }
    lines.push(String::new());

    lines.push("Recommendations:".to_string());
    lines.extend(RECOMMENDATIONS.iter().map(|line| line.to_string()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64, rssi: f64) -> GridPoint {
        GridPoint {
            latitude: lat,
            longitude: lon,
            predicted_rssi: rssi,
        }
    }

    fn row(ssid: &str, rssi: Option<&str>) -> RawSampleRow {
        RawSampleRow {
            timestamp: "2024-03-03T12:00:00".into(),
            ssid: ssid.into(),
            rssi_dbm: rssi.map(String::from),
            latitude: Some("1.0".into()),
            longitude: Some("2.0".into()),
        }
    }

    #[test]
    fn empty_input_reports_missing_predictions() {
        let report = summarize(&[], &[], &ReportOptions::default());
        let expected = [
            "AI Wi-Fi Insights Report",
            "=========================",
            "",
            "Total readings: 0",
            "Unique SSIDs: 0",
            "",
            "Insufficient data for predictions. Collect more points and retrain the model.",
            "",
            "Recommendations:",
            "- Add or reposition access points near predicted weak areas.",
            "- Reduce obstructions (walls, metal) along client-to-AP paths.",
            "- Prefer 2.4 GHz for range, 5 GHz for speed as needed.",
        ]
        .join("\n");
        assert_eq!(report, expected);
        assert!(!report.contains("dead zones (weak signal)"));
    }

    #[test]
    fn lists_five_weakest_points_in_order() {
        let points: Vec<GridPoint> = (0..10)
            .map(|i| point(1.0 + i as f64 * 0.123456, 2.0, -75.0 - i as f64 * 2.0))
            .collect();
        let report = summarize(&[row("a", Some("-70"))], &points, &ReportOptions::default());
        let listed: Vec<&str> = report.lines().filter(|line| line.starts_with(" - ")).collect();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[0], " - (2.11110, 2.00000) around -93.0 dBm");
        assert_eq!(listed[4], " - (1.61728, 2.00000) around -85.0 dBm");
        assert!(report.contains("Average RSSI: -70.0 dBm"));
    }

    #[test]
    fn acceptable_coverage_message_when_nothing_is_weak() {
        let points = vec![point(1.0, 2.0, -60.0), point(1.1, 2.0, -80.0)];
        let report = summarize(&[], &points, &ReportOptions::default());
        assert!(report.contains("No strong dead zones predicted. Coverage appears acceptable."));
        assert!(!report.contains("Insufficient data"));
    }

    #[test]
    fn threshold_override_changes_findings() {
        let points = vec![point(1.0, 2.0, -60.0), point(1.1, 2.0, -70.0)];
        let options = ReportOptions {
            weak_threshold_dbm: -65.0,
            max_findings: 5,
        };
        let findings = weak_zones(&points, &options);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].predicted_rssi, -70.0);
        assert_eq!(weak_count(&points, -65.0), 1);
        assert_eq!(weak_count(&points, -50.0), 2);
    }

    #[test]
    fn summary_counts_empty_ssid_and_skips_bad_readings() {
        let rows = vec![
            row("home", Some("-50")),
            row("", Some("-70")),
            row("home", None),
            row("cafe", Some("weak")),
        ];
        let summary = SampleSummary::from_rows(&rows);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.unique_ssids, 3);
        assert_eq!(summary.mean_rssi, Some(-60.0));
    }
}
