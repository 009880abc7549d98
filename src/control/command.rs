use std::path::PathBuf;

/// One operator console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `None` clears the filter
    Filter(Option<String>),
    Stats,
    /// `None` uses the configured default path
    Export(Option<PathBuf>),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    /// Parse a console line. The keyword is case-insensitive; the rest of the
    /// line is the argument.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }

        let (keyword, args) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        match keyword.to_lowercase().as_str() {
            "filter" => {
                if args.is_empty() || args.eq_ignore_ascii_case("all") {
                    Command::Filter(None)
                } else {
                    Command::Filter(Some(normalize_sensor_type(args)))
                }
            }
            "stats" => Command::Stats,
            "export" => {
                if args.is_empty() {
                    Command::Export(None)
                } else {
                    Command::Export(Some(PathBuf::from(args)))
                }
            }
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// `temperature` → `Temperature`
fn normalize_sensor_type(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
