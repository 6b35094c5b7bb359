//! Terminal output for pitchctl.
//!
//! `format_*` functions build plain text so they can be tested; the `print_*`
//! helpers add color around section headers only.

use crate::session::SessionReport;
use pitch_shared::achievements::{self, CATALOG};
use pitch_shared::leaderboard::RankedEntry;
use pitch_shared::{FeedbackReport, GameMode, LevelTable, OnboardingProgress, ProgressSnapshot};

/// ANSI colors
pub mod colors {
    pub const HEADER: &str = "\x1b[38;2;255;210;120m";
    pub const OK: &str = "\x1b[38;2;120;255;120m";
    pub const DIM: &str = "\x1b[38;2;140;140;140m";
    pub const RESET: &str = "\x1b[0m";
}

/// Horizontal rule
pub const HR: &str = "────────────────────────────────────────────────────────────";

const BAR_WIDTH: usize = 20;
const KEY_WIDTH: usize = 16;

pub fn print_header(title: &str) {
    println!();
    println!("{}{}{}", colors::HEADER, title, colors::RESET);
    println!("{}{}{}", colors::DIM, HR, colors::RESET);
}

/// `[#####.....]` style bar for a 0-100 percentage
pub fn progress_bar(percent: u8) -> String {
    let filled = (percent.min(100) as usize * BAR_WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn kv(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!("{:width$} {}\n", key, value, width = KEY_WIDTH));
}

pub fn format_status(
    user_id: &str,
    snap: &ProgressSnapshot,
    table: &LevelTable,
    onboarding: &OnboardingProgress,
) -> String {
    let mut out = String::new();
    kv(&mut out, "user", user_id);
    kv(&mut out, "level", &format!("{} ({})", snap.level, snap.title()));

    let percent = snap.progress_percent(table);
    let next = if snap.level >= table.max_level() {
        "max level".to_string()
    } else {
        format!("{} XP to level {}", snap.xp_to_next_level(table), snap.level + 1)
    };
    kv(&mut out, "xp", &format!("{} {} {}%  {}", snap.xp, progress_bar(percent), percent, next));

    kv(
        &mut out,
        "stats",
        &format!(
            "charisma {:.1}  persuasion {:.1}  confidence {:.1}",
            snap.stats.charisma, snap.stats.persuasion, snap.stats.confidence
        ),
    );
    kv(
        &mut out,
        "games",
        &format!(
            "{} played, {} won, best streak {}",
            snap.total_games, snap.games_won, snap.highest_streak
        ),
    );
    kv(&mut out, "badges", &achievements::format_badges(&snap.achievements, 6));

    let onboarding_line = match onboarding.next_step() {
        Some(step) => format!("{}% done, next: {}", onboarding.percent_complete(), step.label()),
        None => "complete".to_string(),
    };
    kv(&mut out, "onboarding", &onboarding_line);
    out
}

/// Catalog with unlock markers, unlocked first in unlock order
pub fn format_achievements(snap: &ProgressSnapshot) -> String {
    let mut out = String::new();
    for unlocked in snap.achievements.iter() {
        match achievements::definition(&unlocked.id) {
            Some(def) => out.push_str(&format!(
                "  [x] {} {:16} {}  ({})\n",
                def.icon,
                def.name,
                def.description,
                unlocked.unlocked_at.format("%Y-%m-%d")
            )),
            None => out.push_str(&format!("  [x] {}\n", unlocked.id)),
        }
    }
    for def in CATALOG.iter().filter(|d| !snap.has_achievement(d.id)) {
        out.push_str(&format!("  [ ] {} {:16} {}\n", def.icon, def.name, def.hint));
    }
    out.push_str(&format!("\n{}/{} unlocked\n", snap.achievements.len(), CATALOG.len()));
    out
}

pub fn format_leaderboard(rows: &[RankedEntry]) -> String {
    if rows.is_empty() {
        return "No scores yet.\n".to_string();
    }

    let mut out = format!("  {:>4}  {:20} {:14} {:>7}  {}\n", "#", "player", "mode", "score", "date");
    for row in rows {
        let e = &row.entry;
        out.push_str(&format!(
            "  {:>4}  {:20} {:14} {:>7}  {}\n",
            row.rank,
            e.display_name,
            e.mode.as_str(),
            e.score,
            e.achieved_at.format("%Y-%m-%d")
        ));
    }
    out
}

pub fn format_totals(totals: &[(String, u64)]) -> String {
    let mut out = String::new();
    for (i, (user, total)) in totals.iter().enumerate() {
        out.push_str(&format!("  {:>4}  {:20} {:>9}\n", i + 1, user, total));
    }
    out
}

pub fn format_modes(modes: &[GameMode]) -> String {
    let mut out = String::new();
    for mode in modes {
        out.push_str(&format!(
            "  {:14} {:16} {:?}\n      {}\n",
            mode.kind.as_str(),
            mode.name,
            mode.difficulty,
            mode.description
        ));
        if mode.is_timed() {
            out.push_str(&format!("      {}s on the clock\n", mode.time_limit_secs));
        }
    }
    out
}

pub fn format_feedback(report: &FeedbackReport) -> String {
    let mut out = String::new();
    kv(&mut out, "overall", &format!("{}/100", report.total_score));
    for cat in &report.category_scores {
        kv(&mut out, &cat.name.to_lowercase(), &format!("{}/100", cat.score));
    }
    for s in &report.strengths {
        out.push_str(&format!("  + {}\n", s));
    }
    for s in &report.improvements {
        out.push_str(&format!("  - {}\n", s));
    }
    for s in &report.recommendations {
        out.push_str(&format!("  > {}\n", s));
    }
    out
}

pub fn format_session_report(report: &SessionReport, table: &LevelTable) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    for n in report.notifications.iter().chain(&summary.notifications) {
        out.push_str(&format!("  * {}\n", n));
    }
    if !out.is_empty() {
        out.push('\n');
    }

    kv(&mut out, "session", &summary.session_id.to_string());
    kv(&mut out, "mode", summary.entry.mode.as_str());
    kv(&mut out, "score", &summary.entry.score.to_string());
    kv(&mut out, "result", if summary.entry.won { "won" } else { "not won" });
    kv(
        &mut out,
        "round",
        &format!(
            "{} correct, best streak {}, {}s left, round level {}",
            summary.metrics.correct_responses,
            summary.metrics.streak_count,
            summary.metrics.time_remaining,
            summary.round_level
        ),
    );

    let snap = &summary.snapshot;
    let percent = snap.progress_percent(table);
    kv(
        &mut out,
        "progress",
        &format!("level {} ({}) {} xp {}", snap.level, snap.title(), snap.xp, progress_bar(percent)),
    );
    out
}
