use std::time::Duration;

use super::*;
use crate::error::{AppError, AppResult};

fn check_u64(label: &'static str, actual: u64, expected: u64) -> AppResult<()> {
    if actual != expected {
        return Err(AppError::validation(format!(
            "{}: expected {}, got {}",
            label, expected, actual
        )));
    }
    Ok(())
}

#[test]
fn rounds_response_times_to_two_significant_digits() -> AppResult<()> {
    check_u64("exact below 100", round_response_time(57), 57)?;
    check_u64("nearest 10", round_response_time(147), 150)?;
    check_u64("nearest 100", round_response_time(3432), 3400)?;
    check_u64("nearest 1000", round_response_time(58_760), 59_000)?;
    check_u64("already rounded", round_response_time(700), 700)?;
    Ok(())
}

#[test]
fn median_of_histogram_uses_rank_rule() -> AppResult<()> {
    let mut histogram = ResponseTimeHistogram::default();
    for value in [100, 800, 700] {
        histogram.record(value);
    }
    check_u64("median", histogram.percentile(0.5), 700)?;
    check_u64("p100", histogram.percentile(1.0), 800)?;
    check_u64("p0", histogram.percentile(0.0), 100)?;
    check_u64("empty", ResponseTimeHistogram::default().percentile(0.5), 0)?;
    Ok(())
}

#[test]
fn merged_median_matches_direct_logging() -> AppResult<()> {
    let mut worker_one = RequestStats::new();
    worker_one.log_request("GET", "/", 100, 23_455);
    worker_one.log_request("GET", "/", 800, 23_455);
    let mut worker_two = RequestStats::new();
    worker_two.log_request("GET", "/", 700, 23_455);

    let mut coordinator = RequestStats::new();
    coordinator.merge(&worker_two.take_report());
    coordinator.merge(&worker_one.take_report());

    let entry = coordinator
        .get("GET", "/")
        .ok_or_else(|| AppError::validation("merged entry missing"))?;
    check_u64("entry median", entry.median_response_time(), 700)?;
    check_u64("total median", coordinator.total().median_response_time(), 700)?;
    check_u64("requests", entry.num_requests(), 3)?;
    check_u64("max", entry.max_response_time(), 800)?;
    if entry.min_response_time() != Some(100) {
        return Err(AppError::validation("merged min should be 100"));
    }
    Ok(())
}

#[test]
fn merge_is_order_independent() -> AppResult<()> {
    let mut first = RequestStats::new();
    first.log_request("GET", "/a", 10, 1);
    first.log_failure("GET", "/a", 40, "timeout");
    let mut second = RequestStats::new();
    second.log_request("POST", "/b", 2_500, 10);
    second.log_failure("GET", "/a", 20, "timeout");
    let first_report = first.take_report();
    let second_report = second.take_report();

    let mut forward = RequestStats::new();
    forward.merge(&first_report);
    forward.merge(&second_report);
    let mut backward = RequestStats::new();
    backward.merge(&second_report);
    backward.merge(&first_report);

    let forward_report = forward.report();
    let backward_report = backward.report();
    if forward_report.stats != backward_report.stats {
        return Err(AppError::validation("entries depend on merge order"));
    }
    if forward_report.request_errors != backward_report.request_errors {
        return Err(AppError::validation("errors depend on merge order"));
    }
    let timeout = forward_report
        .request_errors
        .first()
        .ok_or_else(|| AppError::validation("missing request error"))?;
    check_u64("error occurrences", timeout.occurrences, 2)?;
    check_u64("total failures", forward.total().num_failures(), 2)?;
    Ok(())
}

#[test]
fn clear_all_keeps_keys() -> AppResult<()> {
    let mut stats = RequestStats::new();
    stats.log_request("GET", "/kept", 120, 5);
    stats.log_failure("GET", "/kept", 120, "boom");
    stats.clear_all();

    let entry = stats
        .get("GET", "/kept")
        .ok_or_else(|| AppError::validation("key should survive clear_all"))?;
    check_u64("requests", entry.num_requests(), 0)?;
    check_u64("failures", entry.num_failures(), 0)?;
    check_u64("total", stats.total().num_requests(), 0)?;
    if !stats.request_errors().is_empty() {
        return Err(AppError::validation("request errors should be cleared"));
    }
    if !stats.serialize_stats().is_empty() {
        return Err(AppError::validation("empty entries are not reported"));
    }
    Ok(())
}

#[test]
fn take_report_does_not_resend() -> AppResult<()> {
    let handle = StatsHandle::new();
    handle.log_request("GET", "/", 50, 0);
    let first = handle.take_report();
    let second = handle.take_report();
    check_u64("first report", first.stats_total.num_requests, 1)?;
    check_u64("second report", second.stats_total.num_requests, 0)?;
    Ok(())
}

#[test]
fn averages_and_fail_ratio() -> AppResult<()> {
    let mut stats = RequestStats::new();
    stats.log_request("GET", "/", 100, 10);
    stats.log_request("GET", "/", 300, 30);
    stats.log_failure("GET", "/", 200, "500 Internal Server Error");
    let entry = stats
        .get("GET", "/")
        .ok_or_else(|| AppError::validation("entry missing"))?;
    if (entry.avg_response_time() - 200.0).abs() > f64::EPSILON {
        return Err(AppError::validation(format!(
            "avg response time {}",
            entry.avg_response_time()
        )));
    }
    if (entry.avg_content_length() - 40.0 / 3.0).abs() > 1e-9 {
        return Err(AppError::validation("avg content length"));
    }
    if (entry.fail_ratio() - 1.0 / 3.0).abs() > 1e-9 {
        return Err(AppError::validation("fail ratio"));
    }
    Ok(())
}

#[test]
fn current_rps_skips_newest_seconds() -> AppResult<()> {
    let start = 1_000;
    let mut entry = StatsEntry::new("GET", "/", start);
    let now = tokio::time::Instant::now();
    for second in start..start.saturating_add(12) {
        entry.log(10, 0, now, second);
        entry.log(10, 0, now, second);
    }
    let rps = entry.current_rps(start.saturating_add(11));
    if (rps - 2.0).abs() > 1e-9 {
        return Err(AppError::validation(format!("current rps {}", rps)));
    }
    if entry.current_rps(start) > 0.0 {
        return Err(AppError::validation("no complete seconds yet"));
    }
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn coordinator_window_only_sees_recent_reports() -> AppResult<()> {
    let mut coordinator = RequestStats::new();

    let mut stats = RequestStats::new();
    stats.log_request("GET", "/1", 100, 3_546);
    stats.log_request("GET", "/1", 800, 56_743);
    coordinator.merge(&stats.take_report());
    tokio::time::advance(Duration::from_secs(1)).await;

    let mut stats_two = RequestStats::new();
    stats_two.log_request("GET", "/2", 400, 2_201);
    coordinator.merge(&stats_two.take_report());
    tokio::time::advance(Duration::from_secs(4)).await;

    check_u64(
        "p50 before expiry",
        coordinator.total().current_response_time_percentile(0.5),
        400,
    )?;
    check_u64(
        "p95 before expiry",
        coordinator.total().current_response_time_percentile(0.95),
        800,
    )?;

    tokio::time::advance(Duration::from_secs(10)).await;
    stats.log_request("GET", "/1", 20, 1);
    stats.log_request("GET", "/1", 30, 1);
    stats.log_request("GET", "/1", 3_000, 1);
    coordinator.merge(&stats.take_report());

    check_u64(
        "p50 after expiry",
        coordinator.total().current_response_time_percentile(0.5),
        30,
    )?;
    check_u64(
        "p95 after expiry",
        coordinator.total().current_response_time_percentile(0.95),
        3_000,
    )?;
    check_u64("all-time count", coordinator.total().num_requests(), 6)?;
    Ok(())
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn window_evicts_only_samples_older_than_window() -> AppResult<()> {
    let mut window = SampleWindow::new(Duration::from_secs(10));
    let start = tokio::time::Instant::now();
    window.push(start, 100, 1);
    tokio::time::advance(Duration::from_secs(10)).await;
    check_u64("at boundary", window.live_count(tokio::time::Instant::now()), 1)?;
    tokio::time::advance(Duration::from_millis(1)).await;
    check_u64("past boundary", window.live_count(tokio::time::Instant::now()), 0)?;
    Ok(())
}
