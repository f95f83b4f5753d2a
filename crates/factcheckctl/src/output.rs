//! Terminal output for reports and plans. ASCII only.

use factcheck_common::{RunReport, SourceMatchStatus, Verdict, VerificationResult};
use owo_colors::OwoColorize;

const SEPARATOR: &str = "------------------------------------------------------------";

pub fn display_report(report: &RunReport) {
    println!();
    match report.source_match.status {
        SourceMatchStatus::Matched => println!(
            "[SOURCE] {} ({})",
            report.source_match.canonical_url.cyan(),
            report.source_match.source.as_deref().unwrap_or("wire")
        ),
        SourceMatchStatus::NotFound => println!("[SOURCE] {}", "no wire-service match".yellow()),
        SourceMatchStatus::Skipped => {}
    }

    for result in &report.claims {
        println!("{}", SEPARATOR.dimmed());
        display_result(result);
    }

    println!("{}", SEPARATOR.dimmed());
    println!(
        "{} claim(s), {} queries, {} ms",
        report.claims.len(),
        report.meta.queries_count,
        report.meta.runtime_ms
    );
}

fn display_result(result: &VerificationResult) {
    let label = format!("[{}]", result.verdict.to_string().to_uppercase());
    let label = match result.verdict {
        Verdict::Supported => label.bright_green().to_string(),
        Verdict::Contradicted => label.bright_red().to_string(),
        Verdict::Unverified => label.yellow().to_string(),
    };

    println!("{} {}  confidence {}", label, result.claim.bold(), result.confidence);
    if !result.reasoning_short.is_empty() {
        println!("  {}", result.reasoning_short);
    }
    for evidence in &result.key_evidence {
        println!("  * [source: {}] {}", evidence.source_domain.cyan(), evidence.url);
    }
    if !result.notes.is_empty() {
        println!("  [NOTE] {}", result.notes.yellow());
    }
}

pub fn display_plan(claim_id: &str, text: &str, queries: &[String]) {
    println!("{} {}", format!("[{}]", claim_id).cyan(), text);
    if queries.is_empty() {
        println!("  {}", "(no queries)".dimmed());
    }
    for (i, query) in queries.iter().enumerate() {
        println!("  {}. {}", i + 1, query);
    }
}
