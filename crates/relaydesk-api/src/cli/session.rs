//! Session listing command.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::state::AppState;

/// List every stored visitor session with its presence and transcript size.
pub async fn list_sessions(state: &AppState, json: bool) -> Result<()> {
    let sessions = state.relay.session_summaries().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!("  No stored sessions. Visitors appear here once they identify.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Identity").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Presence").fg(Color::White),
        Cell::new("Email").fg(Color::White),
        Cell::new("Lines").fg(Color::White),
    ]);

    for session in &sessions {
        let presence = if session.connected {
            Cell::new("● online").fg(Color::Green)
        } else {
            Cell::new("○ offline").fg(Color::DarkGrey)
        };
        let email = session.contact_email.as_deref().unwrap_or("-");

        table.add_row(vec![
            Cell::new(session.identity.as_str()).fg(Color::Cyan),
            Cell::new(&session.display_name).fg(Color::White),
            presence,
            Cell::new(email),
            Cell::new(session.history.len()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  {}",
        style(format!("{} session(s)", sessions.len())).dim()
    );
    println!();

    Ok(())
}
