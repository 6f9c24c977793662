//! System status dashboard command.

use anyhow::Result;
use console::style;

use relaydesk_infra::archive::FsArchiveSink;

use crate::state::AppState;

/// Display system status dashboard.
///
/// Shows visit totals, stored sessions, presence counts, and archive size.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let (total_visits, online_count) = state.relay.presence().await;
    let sessions = state.relay.session_summaries().await;
    let total_lines: usize = sessions.iter().map(|s| s.history.len()).sum();
    let archived = FsArchiveSink::new(state.archive_dir()).artifact_count().await;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "total_visits": total_visits,
            "sessions": {
                "stored": sessions.len(),
                "online": online_count,
                "transcript_lines": total_lines,
            },
            "archived_sessions": archived,
            "max_file_bytes": state.config.max_file_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Relaydesk v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Sessions ──").dim());
    println!("  Stored:  {}", style(sessions.len()).bold());
    println!("  Online:  {}", style(online_count).green());
    println!("  Lines:   {}", total_lines);
    println!();

    println!("  {}", style("── Visits ──").dim());
    println!("  Lifetime: {}", style(total_visits).bold());
    println!();

    println!("  {}", style("── Archive ──").dim());
    println!("  Closed sessions: {}", style(archived).bold());
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!(
        "  File limit: {}",
        style(format_bytes(state.config.max_file_bytes)).dim()
    );
    println!();

    // Dormant sessions are worth calling out: someone may be waiting on a reply.
    let dormant = sessions
        .iter()
        .filter(|s| !s.connected)
        .count();
    if dormant > 0 {
        println!(
            "  {} {} session(s) offline with retained history",
            style("!").yellow().bold(),
            dormant
        );
        println!();
    }

    Ok(())
}

fn format_bytes(n: u64) -> String {
    if n >= 1024 * 1024 * 1024 {
        format!("{:.1} GiB", n as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if n >= 1024 * 1024 {
        format!("{:.0} MiB", n as f64 / (1024.0 * 1024.0))
    } else if n >= 1024 {
        format!("{:.0} KiB", n as f64 / 1024.0)
    } else {
        format!("{n} B")
    }
}
