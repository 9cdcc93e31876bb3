use std::fmt::Write as _;
use std::path::Path;

use chrono::SecondsFormat;

use super::RunSummary;
use crate::error::SurgeError;

// ---------------------------------------------------------------------------
// Text report
// ---------------------------------------------------------------------------

/// Render a summary as a plain-text console report.
pub fn export_text(s: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "surge run {} ({})", s.run_id.hyphenated(), s.scenario_name);
    let _ = writeln!(out, "  url ............... {}", s.url);
    let _ = writeln!(
        out,
        "  started ........... {}",
        s.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    let _ = writeln!(out, "  duration .......... {:.3}s", s.duration_ms as f64 / 1000.0);
    let _ = writeln!(out, "  peak vus .......... {}", s.peak_virtual_users);
    let _ = writeln!(out, "  requests .......... {}", s.total_requests);
    let _ = writeln!(out, "  succeeded ......... {}", s.successful_requests);
    let _ = writeln!(
        out,
        "  failed ............ {} ({:.2}%)",
        s.failed_requests,
        s.error_rate * 100.0
    );
    let _ = writeln!(out, "  throughput ........ {:.2} req/s", s.requests_per_second);
    let _ = writeln!(
        out,
        "  latency ........... min={:.2}ms mean={:.2}ms max={:.2}ms",
        s.min_ms, s.mean_ms, s.max_ms
    );
    let _ = writeln!(
        out,
        "  percentiles ....... p50={:.2}ms p90={:.2}ms p95={:.2}ms p99={:.2}ms",
        s.p50_ms, s.p90_ms, s.p95_ms, s.p99_ms
    );
    let _ = writeln!(out, "  received .......... {} bytes", s.total_bytes_received);
    if !s.status_codes.is_empty() {
        let codes: Vec<String> = s
            .status_codes
            .iter()
            .map(|(code, count)| {
                if *code == 0 {
                    format!("no response={count}")
                } else {
                    format!("{code}={count}")
                }
            })
            .collect();
        let _ = writeln!(out, "  status codes ...... {}", codes.join(" "));
    }
    out
}

// ---------------------------------------------------------------------------
// JSON export
// ---------------------------------------------------------------------------

/// Serialize a summary as pretty-printed JSON.
pub fn export_json(s: &RunSummary) -> Result<String, SurgeError> {
    Ok(serde_json::to_string_pretty(s)?)
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Export the per-second time series as CSV, preceded by `#` comment lines
/// holding the headline numbers.
pub fn export_csv(s: &RunSummary) -> Result<String, SurgeError> {
    let mut out = String::new();
    let _ = writeln!(out, "# surge run {} ({})", s.run_id.hyphenated(), s.scenario_name);
    let _ = writeln!(out, "# Total requests: {}", s.total_requests);
    let _ = writeln!(
        out,
        "# Failed: {} ({:.2}%)",
        s.failed_requests,
        s.error_rate * 100.0
    );
    let _ = writeln!(
        out,
        "# p50/p90/p99 (ms): {:.2}/{:.2}/{:.2}",
        s.p50_ms, s.p90_ms, s.p99_ms
    );

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["second", "requests", "errors", "avg_ms", "min_ms", "max_ms"])?;
    for entry in &s.time_series {
        writer.write_record([
            entry.second.to_string(),
            entry.requests.to_string(),
            entry.errors.to_string(),
            format!("{:.3}", entry.avg_ms),
            format!("{:.3}", entry.min_ms),
            format!("{:.3}", entry.max_ms),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| SurgeError::Internal(format!("CSV buffer flush failed: {e}")))?;
    out.push_str(&String::from_utf8_lossy(&bytes));
    Ok(out)
}

// ---------------------------------------------------------------------------
// File export
// ---------------------------------------------------------------------------

/// Write a summary to `path`: CSV for a `.csv` extension, JSON otherwise.
pub async fn write_summary(s: &RunSummary, path: impl AsRef<Path>) -> Result<(), SurgeError> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let content = if is_csv {
        export_csv(s)?
    } else {
        export_json(s)?
    };
    tokio::fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::TimeBucketEntry;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn make_summary() -> RunSummary {
        let mut status_codes = BTreeMap::new();
        status_codes.insert(0, 2);
        status_codes.insert(200, 98);
        RunSummary {
            run_id: Uuid::new_v4(),
            scenario_name: "healthcheck".to_string(),
            url: "http://localhost:8080/".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            duration_ms: 90_000,
            total_requests: 100,
            successful_requests: 98,
            failed_requests: 2,
            error_rate: 0.02,
            min_ms: 1.0,
            mean_ms: 4.5,
            max_ms: 30.0,
            p50_ms: 4.0,
            p90_ms: 8.0,
            p95_ms: 10.0,
            p99_ms: 25.0,
            requests_per_second: 1.11,
            total_bytes_received: 200,
            peak_virtual_users: 10,
            status_codes,
            time_series: vec![
                TimeBucketEntry {
                    second: 0,
                    requests: 60,
                    errors: 2,
                    avg_ms: 5.0,
                    min_ms: 1.0,
                    max_ms: 30.0,
                },
                TimeBucketEntry {
                    second: 1,
                    requests: 40,
                    errors: 0,
                    avg_ms: 3.75,
                    min_ms: 2.0,
                    max_ms: 9.0,
                },
            ],
        }
    }

    #[test]
    fn text_report_contains_headline_numbers() {
        let text = export_text(&make_summary());
        assert!(text.contains("healthcheck"));
        assert!(text.contains("requests .......... 100"));
        assert!(text.contains("failed ............ 2 (2.00%)"));
        assert!(text.contains("p99=25.00ms"));
        assert!(text.contains("no response=2"));
        assert!(text.contains("200=98"));
    }

    #[test]
    fn json_export_parses_back() {
        let s = make_summary();
        let json = export_json(&s).unwrap();
        let parsed: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, s.run_id);
        assert_eq!(parsed.total_requests, 100);
        assert_eq!(parsed.status_codes.get(&200), Some(&98));
    }

    #[test]
    fn csv_export_has_comment_header_and_rows() {
        let csv = export_csv(&make_summary()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].starts_with("# surge run"));
        let header_idx = lines
            .iter()
            .position(|l| *l == "second,requests,errors,avg_ms,min_ms,max_ms")
            .expect("header row present");
        assert_eq!(lines[header_idx + 1], "0,60,2,5.000,1.000,30.000");
        assert_eq!(lines[header_idx + 2], "1,40,0,3.750,2.000,9.000");
        assert_eq!(lines.len(), header_idx + 3);
    }

    #[tokio::test]
    async fn write_summary_picks_format_by_extension() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let s = make_summary();

        let json_path = dir.path().join("summary.json");
        write_summary(&s, &json_path).await.unwrap();
        let json = std::fs::read_to_string(&json_path).unwrap();
        assert!(json.trim_start().starts_with('{'));

        let csv_path = dir.path().join("summary.CSV");
        write_summary(&s, &csv_path).await.unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("# surge run"));
    }
}
