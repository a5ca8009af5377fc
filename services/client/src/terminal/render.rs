//! services/client/src/terminal/render.rs
//!
//! Turns a view snapshot into the text printed after every command.

use chrono::Local;
use open_blinkist_core::controller::{ViewMode, ViewState};
use open_blinkist_core::domain::{AnalysisRecord, SummaryRequest};

pub fn render(view: &ViewState, form: &SummaryRequest) -> String {
    let mut out = String::new();
    match view.mode() {
        ViewMode::Input => render_input(&mut out, form),
        ViewMode::Loading => out.push_str("LOADING... generating insights\n"),
        ViewMode::Summary => render_summary(&mut out, view),
    }
    if let Some(error) = &view.error {
        out.push_str(&format!("\nERROR: {}\n", error));
        if view.mode() == ViewMode::Input {
            out.push_str("Type 'retry' to try again or 'dismiss' to hide this message.\n");
        }
    }
    out
}

fn render_input(out: &mut String, form: &SummaryRequest) {
    out.push_str("== OPEN BLINKIST ==\n");
    let title = if form.book_name.trim().is_empty() {
        "(not set)"
    } else {
        form.book_name.as_str()
    };
    out.push_str(&format!("BOOK TITLE: {}\n", title));
    out.push_str(&format!("PROFESSION: {}\n", form.role.to_uppercase()));
    out.push_str(&format!("INSIGHTS:   {}\n", form.num_insights));
    if form.is_submittable() {
        out.push_str("Type 'submit' to get insights.\n");
    } else {
        out.push_str("Set a title with 'book <title>'.\n");
    }
}

fn render_summary(out: &mut String, view: &ViewState) {
    let Some(summary) = &view.book_summary else {
        return;
    };
    out.push_str(&format!("== {} ==\n", summary.book_name));
    out.push_str(&format!("BY {} | FOR {}\n", summary.author, summary.role.to_uppercase()));
    if let Some(theme) = &summary.key_theme {
        out.push_str(&format!("THEME: {}\n", theme));
    }
    let audio = if view.is_playing {
        "PLAYING... ('stop' or 'play' to stop)"
    } else if view.audio_loading {
        "LOADING AUDIO..."
    } else {
        "'play' to listen"
    };
    out.push_str(&format!("AUDIO: {}\n", audio));

    let index = view.carousel.current_index();
    if let Some(insight) = summary.key_insights.get(index) {
        out.push_str(&format!("\n[{}] {}\n", index + 1, insight.heading.to_uppercase()));
        for point in &insight.bullet_points {
            out.push_str(&format!("  -> {}\n", point));
        }
        if let Some(application) = &insight.application {
            out.push_str(&format!("  APPLY: {}\n", application));
        }
    }
    let dots: String = (0..view.carousel.len())
        .map(|i| if i == index { '●' } else { '○' })
        .collect();
    out.push_str(&format!("\n{}  {}\n", dots, view.carousel.position_label()));
}

pub fn render_history(records: &[AnalysisRecord]) -> String {
    if records.is_empty() {
        return "No analyses yet.\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        let when = record
            .created_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "#{} {} {:<9} {} ({}, {} insights)",
            record.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
            when,
            record.status,
            record.book_name,
            record.role,
            record.num_insights
        ));
        if let Some(ms) = record.processing_time_ms {
            out.push_str(&format!(" in {} ms", ms));
        }
        if let Some(error) = &record.error_message {
            out.push_str(&format!(" - {}", error));
        }
        out.push('\n');
    }
    out
}
