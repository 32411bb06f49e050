//! Text formatting for the terminal game view.

use crate::{connection::ConnectionState, roster::Roster};

const RULE: &str = "============================================================";

/// Formatter for the terminal game view
pub struct RosterFormatter;

impl RosterFormatter {
    /// Format the roster, one player per line, in first-seen order
    ///
    /// # Arguments
    ///
    /// * `roster` - Current roster snapshot
    /// * `own_connection_id` - This client's connection ID (to mark as "me"), if known
    ///
    /// # Returns
    ///
    /// A formatted multi-line string framed by rules
    pub fn format_roster(roster: &Roster, own_connection_id: Option<&str>) -> String {
        let mut output = String::new();
        output.push_str("\n\n");
        output.push_str(RULE);
        output.push_str("\nPlayers:\n");

        if roster.is_empty() {
            output.push_str("(No players yet)\n");
        } else {
            for (index, player) in roster.iter().enumerate() {
                let me_suffix = if Some(player.connection_id.as_str()) == own_connection_id {
                    " (me)"
                } else {
                    ""
                };
                let activity = if player.is_active { "active" } else { "inactive" };
                output.push_str(&format!(
                    "{}. {}{} - {} - {}\n",
                    index + 1,
                    player.display_name,
                    me_suffix,
                    Self::format_elapsed(player.total_elapsed_time),
                    activity
                ));
            }
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format elapsed seconds as `mm:ss` (`h:mm:ss` from one hour on)
    pub fn format_elapsed(total_seconds: u64) -> String {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Format a connection state change
    pub fn format_connection(state: ConnectionState) -> String {
        let flag = if state == ConnectionState::Connected {
            "online"
        } else {
            "offline"
        };
        format!("\n* connection {} ({})\n", state, flag)
    }

    /// Format the status message set by a lifecycle action
    pub fn format_status(message: &str) -> String {
        format!("\n>> {}\n", message)
    }

    /// Format the list of prompt commands
    pub fn format_help() -> String {
        "commands: start | click <n> | end | time <seconds> | players | quit\n".to_string()
    }
}
