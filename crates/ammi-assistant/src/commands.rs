/// The closed set of slash commands. Unknown tokens are rejected at parse
/// time; there is no string-keyed dispatch table behind this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Trends,
    Records,
    Medications,
}

impl Command {
    /// Parse a slash command, case-insensitively. `/menu` is an alias for
    /// `/help`. Returns None for anything unrecognized.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "/help" | "/menu" => Some(Command::Help),
            "/status" => Some(Command::Status),
            "/trends" => Some(Command::Trends),
            "/records" => Some(Command::Records),
            "/medications" => Some(Command::Medications),
            _ => None,
        }
    }

    /// Map a bare menu digit (as shown in the help menu) to its command.
    pub fn from_menu_digit(digit: u32) -> Option<Self> {
        match digit {
            1 => Some(Command::Status),
            2 => Some(Command::Trends),
            3 => Some(Command::Records),
            4 => Some(Command::Medications),
            _ => None,
        }
    }
}
