use crate::exceptions::ExceptionReport;
use crate::stats::{RequestStats, StatsEntry, StatsHandle};

const HEADER: [&str; 9] = [
    "Type", "Name", "# reqs", "# fails", "Avg", "Min", "Max", "Median", "req/s",
];

/// Renders the per-entry stats table, aggregate row last.
pub(crate) fn stats_table(stats: &RequestStats, now_secs: i64) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format_row(&HEADER.map(str::to_owned)));
    for entry in stats.entries() {
        lines.push(format_row(&entry_cells(entry, now_secs)));
    }
    lines.push(format_row(&entry_cells(stats.total(), now_secs)));
    lines
}

/// Renders the deduplicated request failures, most frequent first.
pub(crate) fn error_table(stats: &RequestStats) -> Vec<String> {
    let mut errors = stats.request_errors();
    errors.sort_by(|left, right| right.occurrences.cmp(&left.occurrences));
    errors
        .iter()
        .map(|error| {
            format!(
                "{:>8}  {} {}: {}",
                error.occurrences, error.method, error.name, error.error
            )
        })
        .collect()
}

pub(crate) fn print_stats(stats: &StatsHandle) {
    let now_secs = chrono::Utc::now().timestamp();
    let lines = stats.read(|stats| stats_table(stats, now_secs));
    for line in lines {
        println!("{}", line);
    }
    println!();
}

pub(crate) fn print_final_report(stats: &StatsHandle, exceptions: &[ExceptionReport]) {
    print_stats(stats);
    let errors = stats.read(error_table);
    if !errors.is_empty() {
        println!("Request errors:");
        for line in errors {
            println!("{}", line);
        }
        println!();
    }
    if !exceptions.is_empty() {
        eprintln!("User exceptions:");
        for report in exceptions {
            let nodes: Vec<&str> = report.nodes.iter().map(String::as_str).collect();
            if nodes.is_empty() {
                eprintln!("{:>8}  {}: {}", report.count, report.class, report.message);
            } else {
                eprintln!(
                    "{:>8}  {}: {} (nodes: {})",
                    report.count,
                    report.class,
                    report.message,
                    nodes.join(", ")
                );
            }
        }
    }
}

fn entry_cells(entry: &StatsEntry, now_secs: i64) -> [String; 9] {
    [
        entry.method().to_owned(),
        entry.name().to_owned(),
        entry.num_requests().to_string(),
        format!(
            "{}({:.2}%)",
            entry.num_failures(),
            entry.fail_ratio() * 100.0
        ),
        format!("{:.0}", entry.avg_response_time()),
        entry.min_response_time().unwrap_or(0).to_string(),
        entry.max_response_time().to_string(),
        entry.median_response_time().to_string(),
        format!("{:.2}", entry.current_rps(now_secs)),
    ]
}

fn format_row(cells: &[String; 9]) -> String {
    let [kind, name, reqs, fails, avg, min, max, median, rps] = cells;
    format!(
        " {:<7} {:<40} {:>8} {:>14} {:>7} {:>7} {:>7} {:>7} {:>8}",
        kind, name, reqs, fails, avg, min, max, median, rps
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};

    #[test]
    fn table_lists_entries_then_total() -> AppResult<()> {
        let mut stats = RequestStats::new();
        stats.log_request("GET", "/items", 120, 10);
        stats.log_request("GET", "/items", 80, 10);
        stats.log_failure("POST", "/cart", 300, "HTTP 500");

        let lines = stats_table(&stats, chrono::Utc::now().timestamp());
        if lines.len() != 4 {
            return Err(AppError::validation(format!(
                "Expected header, 2 entries and total, got {:?}",
                lines
            )));
        }
        let header = lines.first().map_or("", String::as_str);
        if !header.contains("Median") {
            return Err(AppError::validation("Missing header row"));
        }
        let total = lines.last().map_or("", String::as_str);
        if !total.contains("Total") || !total.contains("1(33.33%)") {
            return Err(AppError::validation(format!("Unexpected total row '{}'", total)));
        }
        Ok(())
    }

    #[test]
    fn error_table_orders_by_occurrences() -> AppResult<()> {
        let mut stats = RequestStats::new();
        stats.log_failure("GET", "/a", 10, "timeout");
        stats.log_failure("GET", "/b", 10, "HTTP 502");
        stats.log_failure("GET", "/b", 10, "HTTP 502");

        let lines = error_table(&stats);
        let first = lines.first().map_or("", String::as_str);
        if lines.len() != 2 || !first.contains("HTTP 502") || !first.trim_start().starts_with('2') {
            return Err(AppError::validation(format!("Unexpected error table {:?}", lines)));
        }
        Ok(())
    }
}
