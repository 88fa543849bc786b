//! Line commands read from stdin

use std::str::FromStr;
use thiserror::Error;

/// Rows printed by `show` when no count is given
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try: select, clear, brush, unbrush, show, stats, quit)")]
    Unknown(String),

    #[error("{command}: {message}")]
    Usage { command: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Choose a menu option
    Select(String),
    /// Reset the menu to "all"
    Clear,
    Brush(f64, f64),
    Unbrush,
    /// Print the filtered rows
    Show(usize),
    Stats,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        match name {
            "select" => {
                if args.is_empty() {
                    return Err(usage("select", "expected an option"));
                }
                Ok(Command::Select(args.join(" ")))
            }
            "clear" => no_args("clear", &args, Command::Clear),
            "brush" => match args.as_slice() {
                [a, b] => Ok(Command::Brush(number("brush", a)?, number("brush", b)?)),
                _ => Err(usage("brush", "expected two numbers")),
            },
            "unbrush" => no_args("unbrush", &args, Command::Unbrush),
            "show" => match args.as_slice() {
                [] => Ok(Command::Show(DEFAULT_PREVIEW_ROWS)),
                [n] => n
                    .parse()
                    .map(Command::Show)
                    .map_err(|_| usage("show", format!("'{n}' is not a row count"))),
                _ => Err(usage("show", "expected at most one row count")),
            },
            "stats" => no_args("stats", &args, Command::Stats),
            "quit" | "exit" => no_args("quit", &args, Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn usage(command: &'static str, message: impl Into<String>) -> CommandError {
    CommandError::Usage { command, message: message.into() }
}

fn no_args(command: &'static str, args: &[&str], parsed: Command) -> Result<Command, CommandError> {
    if args.is_empty() {
        Ok(parsed)
    } else {
        Err(usage(command, "takes no arguments"))
    }
}

fn number(command: &'static str, text: &str) -> Result<f64, CommandError> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(usage(command, format!("'{text}' is not a number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("select rain".parse(), Ok(Command::Select("rain".to_string())));
        assert_eq!("select light rain".parse(), Ok(Command::Select("light rain".to_string())));
        assert_eq!("  clear ".parse(), Ok(Command::Clear));
        assert_eq!("brush 10 -2.5".parse(), Ok(Command::Brush(10.0, -2.5)));
        assert_eq!("unbrush".parse(), Ok(Command::Unbrush));
        assert_eq!("show".parse(), Ok(Command::Show(DEFAULT_PREVIEW_ROWS)));
        assert_eq!("show 3".parse(), Ok(Command::Show(3)));
        assert_eq!("stats".parse(), Ok(Command::Stats));
        assert_eq!("exit".parse(), Ok(Command::Quit));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(matches!("select".parse::<Command>(), Err(CommandError::Usage { command: "select", .. })));
        assert!(matches!("brush 1".parse::<Command>(), Err(CommandError::Usage { command: "brush", .. })));
        assert!(matches!("brush 1 warm".parse::<Command>(), Err(CommandError::Usage { .. })));
        assert!(matches!("brush NaN 2".parse::<Command>(), Err(CommandError::Usage { .. })));
        assert!(matches!("show -1".parse::<Command>(), Err(CommandError::Usage { command: "show", .. })));
        assert!(matches!("clear now".parse::<Command>(), Err(CommandError::Usage { .. })));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!("zoom 2".parse::<Command>(), Err(CommandError::Unknown("zoom".to_string())));
    }
}
