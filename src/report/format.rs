//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the measurement code stays clean and testable
//! - output changes are localized

use std::time::Duration;

use crate::batch::{BatchResult, IndexResultTable};
use crate::fit::FitResult;

/// Counts, timing and the failure list of a batch.
pub fn format_batch_summary(result: &BatchResult, workers: usize, elapsed: Duration) -> String {
    let mut out = String::new();

    out.push_str("=== cmost - batch ===\n");
    out.push_str(&format!(
        "Units: {}/{} completed on {workers} worker(s) in {:.2}s\n",
        result.progress.completed,
        result.progress.total,
        elapsed.as_secs_f64()
    ));
    out.push_str(&format!(
        "OK: {} | failed: {} | cancelled: {}\n",
        result.rows.len(),
        result.failures.len(),
        result.cancelled.len()
    ));

    if !result.failures.is_empty() {
        let counts: Vec<String> = result
            .failure_counts()
            .iter()
            .map(|(kind, n)| format!("{kind}={n}"))
            .collect();
        out.push_str(&format!("\nFailures ({}):\n", counts.join(", ")));
        for f in &result.failures {
            out.push_str(&format!("- {} [{}] {}\n", truncate(&f.id, 40), f.kind, f.message));
        }
    }
    for id in &result.cancelled {
        out.push_str(&format!("  (cancelled) {id}\n"));
    }

    out
}

/// Index values with spectra down and index names across.
pub fn format_index_table(table: &IndexResultTable) -> String {
    let mut out = String::new();

    let mut header = format!("{:<24}", "id");
    let mut rule = format!("{:-<24}", "");
    for name in &table.columns {
        header.push_str(&format!(" {:>10}", truncate(name, 10)));
        rule.push_str(&format!(" {:-<10}", ""));
    }
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(rule.trim_end());
    out.push('\n');

    for (id, values) in &table.rows {
        let mut line = format!("{:<24}", truncate(id, 24));
        for v in values {
            line.push_str(&format!(" {v:>10.4}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Coefficients, domain and convergence of a continuum fit.
pub fn format_continuum_summary(source: &str, fit: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("=== cmost - continuum ===\n");
    out.push_str(&format!("Spectrum: {source}\n"));
    out.push_str(&format!(
        "Points: grid={} | candidates={} | fitted={} | retained={}\n",
        fit.wavelength.len(),
        fit.candidates,
        fit.fitted,
        fit.retained
    ));
    out.push_str(&format!(
        "Iterations: {} ({})\n",
        fit.iterations,
        if fit.converged() { "converged" } else { "not converged" }
    ));
    if let Some(w) = &fit.warning {
        out.push_str(&format!("Warning: {w}\n"));
    }
    out.push_str(&format!(
        "Domain: [{:.3}, {:.3}]\n",
        fit.polynomial.domain.0, fit.polynomial.domain.1
    ));
    out.push_str(&format!("Coefficients: {}\n", fmt_vec(&fit.polynomial.coefficients)));

    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
