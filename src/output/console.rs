use std::fmt::Write as _;

use crate::analyze::{FileAnalysis, PageInfo};
use crate::bypass::{BypassOutcome, BypassResults};
use crate::utils::truncate_chars;

const RED: &str = "\x1b[1;91m";
const GREEN: &str = "\x1b[1;92m";
const YELLOW: &str = "\x1b[1;93m";
const RESET: &str = "\x1b[0m";

/// Print the bypass section and the success count.
pub fn print_bypass_report(results: &BypassResults) {
    print!("{}", render_bypass_report(results, true));
}

/// Text report of every successful bypass. `color` toggles ANSI codes.
pub fn render_bypass_report(results: &BypassResults, color: bool) -> String {
    let paint = |code: &str, text: &str| {
        if color {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    };

    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "=".repeat(60));
    let _ = writeln!(out, "              ACCESS CONTROL BYPASSES");
    let _ = writeln!(out, "{}", "=".repeat(60));

    for (url, outcome) in results.iter().filter(|(_, o)| o.bypassed) {
        let _ = writeln!(out, "\n  [!] {}", paint(RED, url));
        write_outcome(&mut out, url, outcome, &paint);
    }

    let successes = results.successful_bypasses();
    if successes == 0 {
        let _ = writeln!(out, "  [OK] No successful bypasses");
    }
    let _ = writeln!(out, "\n[*] Summary:");
    let _ = writeln!(out, "   Restricted URLs: {}", results.len());
    let _ = writeln!(out, "   Access Control Bypassed: {}", paint(RED, &successes.to_string()));
    out
}

fn write_outcome(out: &mut String, url: &str, outcome: &BypassOutcome, paint: &dyn Fn(&str, &str) -> String) {
    let _ = writeln!(out, "    Original Status: {}", outcome.original_status);
    if let Some(technique) = &outcome.technique {
        let _ = writeln!(out, "    Bypassed with: {}", paint(GREEN, technique));
    }
    if let Some(status) = outcome.final_status {
        let _ = writeln!(out, "    New Status: {}", status);
    }
    if let Some(bypass_url) = outcome.bypass_url.as_deref().filter(|u| *u != url) {
        let _ = writeln!(out, "    Bypass URL: {}", bypass_url);
    }
    if let Some(info) = &outcome.page_info {
        write_page_info(out, info, paint);
    }
}

fn write_list(out: &mut String, heading: &str, items: &[String], limit: usize) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "      {}:", heading);
    for item in items.iter().take(limit) {
        let _ = writeln!(out, "        - {}", item);
    }
}

fn write_file_analysis(out: &mut String, analysis: &FileAnalysis) {
    let _ = writeln!(out, "      File Type Analysis:");
    if analysis.file_type == "unknown" {
        let _ = writeln!(out, "        File Type: unknown");
    } else {
        let _ = writeln!(out, "        File Type: .{}", analysis.file_type);
    }
    let _ = writeln!(out, "        Lines: {}", analysis.line_count);
    write_list(out, "  Apache Directives", &analysis.directives, 10);
    write_list(out, "  Configuration Entries", &analysis.configurations, 10);
    write_list(out, "  Comments", &analysis.comments, 5);
    write_list(out, "  File Content Preview", &analysis.preview_lines, 15);
}

fn write_page_info(out: &mut String, info: &PageInfo, paint: &dyn Fn(&str, &str) -> String) {
    let _ = writeln!(out, "\n    Bypassed Page Content Analysis:");

    if info.is_likely_false_positive {
        let _ = writeln!(out, "      {}", paint(RED, "[!] WARNING: Possible False Positive!"));
        if let Some(reason) = &info.false_positive_reason {
            let _ = writeln!(out, "      {}", paint(YELLOW, reason));
        }
    }
    if let Some(analysis) = &info.file_type_analysis {
        write_file_analysis(out, analysis);
    }
    if let Some(title) = &info.title {
        let _ = writeln!(out, "      Title: {}", title);
    }
    let _ = writeln!(out, "      Content Length: {} bytes", info.content_length);
    let _ = writeln!(out, "      Content Type: {}", info.content_type);
    if info.server != "unknown" {
        let _ = writeln!(out, "      Server: {}", info.server);
    }
    if !info.sensitive_keywords.is_empty() {
        let keywords: Vec<&str> = info.sensitive_keywords.iter().take(10).map(String::as_str).collect();
        let _ = writeln!(out, "      [!] Sensitive Keywords: {}", keywords.join(", "));
    }
    if !info.emails.is_empty() {
        let _ = writeln!(out, "      Emails Found: {}", info.emails.join(", "));
    }
    if !info.interesting_patterns.is_empty() {
        let _ = writeln!(out, "      [!!] Security Findings: {}", info.interesting_patterns.join(", "));
    }
    write_list(out, "Configuration Variables", &info.config_vars, 5);
    write_list(out, "Database Information", &info.database_info, 3);
    write_list(out, "Secrets/Tokens Found", &info.secrets, 5);
    write_list(out, "File Paths Exposed", &info.file_paths, 5);
    if !info.preview.is_empty() {
        let _ = writeln!(out, "      Content Preview:");
        let _ = writeln!(out, "        {}", truncate_chars(info.preview.trim(), 100));
    }
    if let Some(error) = &info.analysis_error {
        let _ = writeln!(out, "      Analysis note: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bypass::{BypassHit, BypassTarget, OutcomeBuilder};

    fn results_with(outcomes: Vec<BypassOutcome>) -> BypassResults {
        outcomes.into_iter().collect()
    }

    #[test]
    fn report_lists_only_bypassed_targets() {
        let mut builder = OutcomeBuilder::new(BypassTarget::new("http://x/admin", 403));
        builder.record_attempt();
        let hit = builder
            .bypassed(BypassHit {
                technique: "X-Forwarded-For: 127.0.0.1".into(),
                status: 200,
                url: "http://x/admin".into(),
                page_info: Some(PageInfo {
                    title: Some("Admin".into()),
                    server: "unknown".into(),
                    is_likely_false_positive: true,
                    false_positive_reason: Some("Requested .env file but received HTML content".into()),
                    ..Default::default()
                }),
            })
            .build();
        let miss = BypassOutcome::not_bypassed(&BypassTarget::new("http://x/secret", 401));

        let text = render_bypass_report(&results_with(vec![hit, miss]), false);
        assert!(text.contains("http://x/admin"));
        assert!(!text.contains("http://x/secret"));
        assert!(text.contains("Bypassed with: X-Forwarded-For: 127.0.0.1"));
        assert!(!text.contains("Bypass URL:"));
        assert!(text.contains("Possible False Positive"));
        assert!(text.contains("Title: Admin"));
        assert!(!text.contains("Server:"));
        assert!(text.contains("Access Control Bypassed: 1"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn file_type_without_extension_has_no_dot() {
        let mut text = String::new();
        let unknown = FileAnalysis { file_type: "unknown".into(), ..Default::default() };
        write_file_analysis(&mut text, &unknown);
        assert!(text.contains("File Type: unknown"));
        assert!(!text.contains(".unknown"));

        let mut text = String::new();
        let env = FileAnalysis { file_type: "env".into(), ..Default::default() };
        write_file_analysis(&mut text, &env);
        assert!(text.contains("File Type: .env"));
    }

    #[test]
    fn report_without_successes() {
        let miss = BypassOutcome::not_bypassed(&BypassTarget::new("http://x/secret", 401));
        let text = render_bypass_report(&results_with(vec![miss]), false);
        assert!(text.contains("No successful bypasses"));
        assert!(text.contains("Access Control Bypassed: 0"));
    }
}
