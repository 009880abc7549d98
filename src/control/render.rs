use crate::{state::StoreSnapshot, stats::format_stat};
use std::fmt::Write;

pub const HELP_TEXT: &str = "
Available Commands:
  filter <type>  - Show logs only for the specified sensor type (e.g., filter Temperature)
  filter all     - Show logs for all sensor types (default)
  stats          - Print current statistics for all sensor types
  export <file>  - Export current statistics to a JSON file (default: sensor_stats_export.json)
  quit / exit    - Stop the service
  help           - Show this help message

";

pub const PROMPT: &str = "> ";

/// Text block for the `stats` command, categories in name order
pub fn render_stats(snapshot: &StoreSnapshot) -> String {
    let mut out = String::from("\n--- Current Sensor Statistics ---\n");

    if snapshot.is_empty() {
        out.push_str("  No statistics calculated yet.\n");
    }

    for (category, window) in snapshot {
        // Writing into a String cannot fail
        let _ = writeln!(out, "  {}:", category);
        let _ = writeln!(out, "    Count: {}", window.count());
        let _ = writeln!(out, "    Window (last {}): {:?}", window.len(), window.to_vec());
        let _ = writeln!(out, "    Mean:  {}", format_stat(window.mean()));
        let _ = writeln!(out, "    StDev: {}", format_stat(window.stdev()));
    }

    out.push_str("---------------------------------\n\n");
    out
}
