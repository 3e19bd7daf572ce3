//! Terminal rendering for claims and verification records.
//!
//! Everything renders into a `String` first so the layout can be tested;
//! the `print_*` wrappers write it to stdout.

use std::fmt::Write;

use verinews_core::{Claim, RecordState, VerdictKind, VerificationRecord};
use verinews_pipeline::{AnalysisOutcome, DisplayState, PipelineError, Theme};

const MAX_EVIDENCE_ITEMS: usize = 10;
const MAX_SNIPPET_CHARS: usize = 240;
const MAX_CLAIM_CHARS: usize = 100;

/// Colour settings for verdict labels.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub theme: Theme,
    pub color: bool,
}

impl Style {
    pub fn plain() -> Self {
        Self {
            theme: Theme::Light,
            color: false,
        }
    }

    fn label(&self, kind: VerdictKind, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        // Dark backgrounds get the bright variants.
        let base = match kind {
            VerdictKind::Supported => 32,
            VerdictKind::Contradicted => 31,
            VerdictKind::Unverified => 33,
            VerdictKind::Other => 36,
        };
        let code = match self.theme {
            Theme::Light => base,
            Theme::Dark => base + 60,
        };
        format!("\x1b[1;{code}m{text}\x1b[0m")
    }
}

// ── Public API ──

pub fn print_outcome(outcome: &AnalysisOutcome) {
    print!("{}", render_outcome(outcome));
}

pub fn print_record_card(claim: &Claim, record: Option<&VerificationRecord>, style: Style) {
    print!("{}", render_record_card(claim, record, style));
}

pub fn print_display_state(state: &DisplayState, style: Style) {
    match &state.selected {
        Some(claim) => print_record_card(claim, state.record.as_ref(), style),
        None => println!("(no claim selected)"),
    }
}

pub fn print_check_result(
    claim: &Claim,
    result: &Result<VerificationRecord, PipelineError>,
    style: Style,
) {
    match result {
        Ok(record) => print_record_card(claim, Some(record), style),
        Err(e) => {
            println!("=== Claim {} ===", claim.id);
            println!("{}", claim.text);
            println!();
            println!("  {:<14} {}", "error", e);
            println!();
        }
    }
}

// ── Rendering ──

pub fn render_outcome(outcome: &AnalysisOutcome) -> String {
    let mut out = String::new();
    match outcome {
        AnalysisOutcome::NoClaims => {
            let _ = writeln!(out, "No checkable claims found in this text.");
        }
        AnalysisOutcome::Found(claims) => {
            let noun = if claims.len() == 1 { "claim" } else { "claims" };
            let _ = writeln!(out, "Found {} {noun}:", claims.len());
            for claim in claims {
                let _ = writeln!(out, "  [{}] {}", claim.id, truncate(&claim.text, MAX_CLAIM_CHARS));
            }
        }
    }
    out
}

pub fn render_record_card(claim: &Claim, record: Option<&VerificationRecord>, style: Style) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Claim {} ===", claim.id);
    let _ = writeln!(out, "{}", claim.text);
    let _ = writeln!(out);

    let Some(record) = record else {
        let _ = writeln!(out, "  {:<14} {}", "status", RecordState::NotStarted.as_str());
        let _ = writeln!(out);
        return out;
    };

    let _ = writeln!(out, "  {:<14} {}", "status", record.state.as_str());
    if record.attempts > 1 {
        let _ = writeln!(out, "  {:<14} {}", "attempts", record.attempts);
    }
    if let (Some(start), Some(end)) = (record.started_at, record.finished_at) {
        let ms = (end - start).num_milliseconds();
        let _ = writeln!(out, "  {:<14} {ms} ms", "took");
    }
    if let Some(e) = &record.error {
        let _ = writeln!(out, "  {:<14} {e}", "error");
        if e.is_retryable() {
            let _ = writeln!(out, "  {:<14} select the claim again to retry", "");
        }
    }

    if let Some(verdict) = &record.verdict {
        let _ = writeln!(out);
        let _ = writeln!(out, "Verdict");
        let _ = writeln!(
            out,
            "  {:<14} {}",
            "label",
            style.label(verdict.kind(), &verdict.label)
        );
        match verdict.confidence {
            Some(c) => {
                let _ = writeln!(out, "  {:<14} {c:.0}%", "confidence");
            }
            None => {
                let _ = writeln!(out, "  {:<14} not reported", "confidence");
            }
        }
        if !verdict.reason.is_empty() {
            let _ = writeln!(out, "  {:<14} {}", "reason", verdict.reason);
        }
    }

    if record.state == RecordState::Done {
        let _ = writeln!(out);
        let len = record.evidence.len();
        let _ = writeln!(out, "Evidence ({len})");
        if len == 0 {
            let _ = writeln!(out, "  (none found)");
        }
        for item in record.evidence.iter().take(MAX_EVIDENCE_ITEMS) {
            match &item.source {
                Some(source) => {
                    let _ = writeln!(out, "  - {} [{source}]", item.title);
                }
                None => {
                    let _ = writeln!(out, "  - {}", item.title);
                }
            }
            let _ = writeln!(out, "    {}", item.url);
            if !item.snippet.is_empty() {
                let _ = writeln!(out, "    {}", truncate(&item.snippet, MAX_SNIPPET_CHARS));
            }
        }
        if len > MAX_EVIDENCE_ITEMS {
            let _ = writeln!(out, "  ... and {} more", len - MAX_EVIDENCE_ITEMS);
        }
    }
    let _ = writeln!(out);
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut short: String = s.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
