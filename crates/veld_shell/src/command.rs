//! Shell command parsing.

use veld_sim::{FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_US};

/// Femtoseconds per second.
const FS_PER_S: u64 = FS_PER_MS * 1_000;

/// A parsed shell command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    /// Reset the simulation to its post-elaboration state.
    Reset,
    /// Run for a duration, or to completion when none is given.
    Run {
        /// Duration in femtoseconds, if given.
        duration_fs: Option<u64>,
    },
    /// Continue running to completion.
    Continue,
    /// Print the values of one or more signals.
    Examine {
        /// Signal names to examine.
        names: Vec<String>,
    },
    /// Force a signal to a value until released.
    Force {
        /// The signal name.
        name: String,
        /// The value text, parsed against the signal.
        value: String,
    },
    /// Release a forced signal.
    Release {
        /// The signal name.
        name: String,
    },
    /// Watch a signal, reporting changes through the handler vector.
    Watch {
        /// The signal name.
        name: String,
    },
    /// Stop watching a signal.
    Unwatch {
        /// The signal name.
        name: String,
    },
    /// Print the command summary.
    Help,
    /// Leave the shell.
    Quit,
}

/// Parses one input line into a [`ShellCommand`].
pub fn parse_command(input: &str) -> Result<ShellCommand, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty command".to_string());
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    let cmd = parts[0].to_lowercase();
    let args = &parts[1..];

    match cmd.as_str() {
        "reset" => Ok(ShellCommand::Reset),
        "run" | "r" => {
            let duration_fs = match args.first() {
                Some(text) => {
                    Some(parse_duration(text).map_err(|e| format!("invalid duration: {e}"))?)
                }
                None => None,
            };
            Ok(ShellCommand::Run { duration_fs })
        }
        "continue" | "c" => Ok(ShellCommand::Continue),
        "examine" | "e" => {
            if args.is_empty() {
                return Err("examine requires signal name(s)".to_string());
            }
            Ok(ShellCommand::Examine {
                names: args.iter().map(|s| s.to_string()).collect(),
            })
        }
        "force" => match args {
            [name, value] => Ok(ShellCommand::Force {
                name: name.to_string(),
                value: value.to_string(),
            }),
            _ => Err("force requires a signal name and a value".to_string()),
        },
        "release" => match args {
            [name] => Ok(ShellCommand::Release {
                name: name.to_string(),
            }),
            _ => Err("release requires a signal name".to_string()),
        },
        "watch" | "w" => match args {
            [name] => Ok(ShellCommand::Watch {
                name: name.to_string(),
            }),
            _ => Err("watch requires a signal name".to_string()),
        },
        "unwatch" => match args {
            [name] => Ok(ShellCommand::Unwatch {
                name: name.to_string(),
            }),
            _ => Err("unwatch requires a signal name".to_string()),
        },
        "help" | "h" => Ok(ShellCommand::Help),
        "quit" | "q" | "exit" => Ok(ShellCommand::Quit),
        _ => Err(format!("unknown command: '{}'", parts[0])),
    }
}

/// Parses a duration like `100ns` or `2us` into femtoseconds.
pub fn parse_duration(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digit_end == 0 {
        return Err(format!("no numeric value in '{s}'"));
    }

    let number: u64 = s[..digit_end]
        .parse()
        .map_err(|_| format!("invalid number in '{s}'"))?;

    let unit = s[digit_end..].trim();
    let multiplier = match unit {
        "fs" => 1,
        "ps" => FS_PER_PS,
        "ns" => FS_PER_NS,
        "us" => FS_PER_US,
        "ms" => FS_PER_MS,
        "s" => FS_PER_S,
        "" => return Err(format!("missing unit in '{s}'")),
        _ => return Err(format!("unknown unit '{unit}'")),
    };

    Ok(number * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_duration() {
        assert_eq!(
            parse_command("run 100ns").unwrap(),
            ShellCommand::Run {
                duration_fs: Some(100 * FS_PER_NS)
            }
        );
    }

    #[test]
    fn parse_run_without_duration() {
        assert_eq!(
            parse_command("run").unwrap(),
            ShellCommand::Run { duration_fs: None }
        );
    }

    #[test]
    fn parse_shortcuts() {
        assert_eq!(
            parse_command("r 1us").unwrap(),
            ShellCommand::Run {
                duration_fs: Some(FS_PER_US)
            }
        );
        assert_eq!(parse_command("c").unwrap(), ShellCommand::Continue);
        assert_eq!(parse_command("q").unwrap(), ShellCommand::Quit);
        assert_eq!(parse_command("h").unwrap(), ShellCommand::Help);
    }

    #[test]
    fn parse_examine() {
        assert_eq!(
            parse_command("examine top.clk top.count").unwrap(),
            ShellCommand::Examine {
                names: vec!["top.clk".to_string(), "top.count".to_string()]
            }
        );
        assert!(parse_command("examine").is_err());
    }

    #[test]
    fn parse_force_release() {
        assert_eq!(
            parse_command("force top.s 1").unwrap(),
            ShellCommand::Force {
                name: "top.s".to_string(),
                value: "1".to_string()
            }
        );
        assert_eq!(
            parse_command("release top.s").unwrap(),
            ShellCommand::Release {
                name: "top.s".to_string()
            }
        );
        assert!(parse_command("force top.s").is_err());
    }

    #[test]
    fn parse_watch_unwatch() {
        assert_eq!(
            parse_command("watch top.count").unwrap(),
            ShellCommand::Watch {
                name: "top.count".to_string()
            }
        );
        assert_eq!(
            parse_command("unwatch top.count").unwrap(),
            ShellCommand::Unwatch {
                name: "top.count".to_string()
            }
        );
    }

    #[test]
    fn parse_reset_and_case() {
        assert_eq!(parse_command("RESET").unwrap(), ShellCommand::Reset);
        assert_eq!(parse_command("Run 1ns").unwrap(), ShellCommand::Run {
            duration_fs: Some(FS_PER_NS)
        });
    }

    #[test]
    fn unknown_and_empty_commands() {
        assert!(parse_command("frobnicate").is_err());
        assert!(parse_command("").is_err());
        assert!(parse_command("   ").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("42fs").unwrap(), 42);
        assert_eq!(parse_duration("250ps").unwrap(), 250 * FS_PER_PS);
        assert_eq!(parse_duration("100ns").unwrap(), 100 * FS_PER_NS);
        assert_eq!(parse_duration("5us").unwrap(), 5 * FS_PER_US);
        assert_eq!(parse_duration("10ms").unwrap(), 10 * FS_PER_MS);
        assert_eq!(parse_duration("1s").unwrap(), FS_PER_S);
    }

    #[test]
    fn duration_requires_unit() {
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("5 parsecs").is_err());
        assert!(parse_duration("").is_err());
    }
}
