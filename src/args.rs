//! Command-line argument parsing and processing.
//!
//! Global flags (`--debug`, `--config`, `--log`, `--help`, `--version`) may
//! appear anywhere; the first bare word selects the command. Without a command
//! the daemon runs.

use chrono::NaiveDate;

use crate::commands::simulate::DEFAULT_MULTIPLIER;
use crate::commands::test_audio::TestAudioOptions;
use crate::commands::times::TimesOptions;
use crate::prayer::PrayerKind;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
    },
    /// Print prayer times and exit
    Times {
        config_dir: Option<String>,
        options: TimesOptions,
    },
    /// Replay a time window on a simulated clock
    Simulate {
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
        start_time: String,
        end_time: String,
        multiplier: f64,
    },
    /// Play a short adhan preview and exit
    TestAudio {
        debug_enabled: bool,
        config_dir: Option<String>,
        options: TestAudioOptions,
    },
    /// `vakitd help [COMMAND]`
    HelpCommand { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

/// Global flags, collected before the command is interpreted.
#[derive(Default)]
struct GlobalFlags {
    debug_enabled: bool,
    display_help: bool,
    display_version: bool,
    config_dir: Option<String>,
    log_file: Option<String>,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped. Problems are logged
    /// as warnings and turn into [`CliAction::ShowHelpDueToError`].
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut flags = GlobalFlags::default();
        let mut positional: Vec<String> = Vec::new();
        let mut command_flags: Vec<(String, Option<String>)> = Vec::new();
        let mut unknown_arg_found = false;

        let mut i = 0;
        while i < args_vec.len() {
            let arg = args_vec[i].as_str();
            match arg {
                "--help" | "-h" => flags.display_help = true,
                "--version" | "-V" | "-v" => flags.display_version = true,
                "--debug" | "-d" => flags.debug_enabled = true,
                "--config" | "-c" => match args_vec.get(i + 1) {
                    Some(dir) if !dir.starts_with('-') => {
                        flags.config_dir = Some(dir.clone());
                        i += 1;
                    }
                    _ => {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        unknown_arg_found = true;
                    }
                },
                "--log" | "-l" => match args_vec.get(i + 1) {
                    Some(file) if !file.starts_with('-') => {
                        flags.log_file = Some(file.clone());
                        i += 1;
                    }
                    _ => {
                        log_warning!("Missing file for --log. Usage: --log <file>");
                        unknown_arg_found = true;
                    }
                },
                "--json" => command_flags.push((arg.to_string(), None)),
                "--date" | "--days" | "--lat" | "--lng" | "--volume" | "--duration"
                | "--prayer" => match args_vec.get(i + 1) {
                    // Negative coordinates look like flags, so take the value as-is
                    Some(value) => {
                        command_flags.push((arg.to_string(), Some(value.clone())));
                        i += 1;
                    }
                    None => {
                        log_warning!("Missing value for {arg}");
                        unknown_arg_found = true;
                    }
                },
                _ if arg.starts_with('-') && arg.len() > 1 => {
                    log_warning!("Unknown option: {arg}");
                    unknown_arg_found = true;
                }
                _ => positional.push(arg.to_string()),
            }
            i += 1;
        }

        if flags.display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if unknown_arg_found {
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }
        if flags.display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let command = positional.first().map(String::as_str).unwrap_or("run");
        let rest = positional.get(1..).unwrap_or_default();

        let action = match command {
            "run" => {
                if !rest.is_empty() || !command_flags.is_empty() {
                    log_warning!("'run' takes no arguments");
                    CliAction::ShowHelpDueToError
                } else {
                    CliAction::Run {
                        debug_enabled: flags.debug_enabled,
                        config_dir: flags.config_dir,
                        log_file: flags.log_file,
                    }
                }
            }
            "times" | "t" => {
                if !rest.is_empty() {
                    log_warning!("Unexpected argument for times: {}", rest[0]);
                    CliAction::ShowHelpDueToError
                } else {
                    match parse_times_options(&command_flags) {
                        Some(options) => CliAction::Times {
                            config_dir: flags.config_dir,
                            options,
                        },
                        None => CliAction::ShowHelpDueToError,
                    }
                }
            }
            "simulate" | "S" => {
                if !command_flags.is_empty() {
                    log_warning!("simulate does not accept {}", command_flags[0].0);
                    CliAction::ShowHelpDueToError
                } else {
                    parse_simulate(rest, flags)
                }
            }
            "test-audio" => {
                if !rest.is_empty() {
                    log_warning!("Unexpected argument for test-audio: {}", rest[0]);
                    CliAction::ShowHelpDueToError
                } else {
                    match parse_test_audio_options(&command_flags) {
                        Some(options) => CliAction::TestAudio {
                            debug_enabled: flags.debug_enabled,
                            config_dir: flags.config_dir,
                            options,
                        },
                        None => CliAction::ShowHelpDueToError,
                    }
                }
            }
            "help" | "h" => {
                if rest.len() > 1 {
                    log_warning!("help takes at most one command name");
                    CliAction::ShowHelpDueToError
                } else {
                    CliAction::HelpCommand {
                        command: rest.first().cloned(),
                    }
                }
            }
            unknown => {
                log_warning!("Unknown command: {unknown}");
                CliAction::ShowHelpDueToError
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn parse_times_options(command_flags: &[(String, Option<String>)]) -> Option<TimesOptions> {
    let mut options = TimesOptions {
        days: 1,
        ..Default::default()
    };
    let mut latitude = None;
    let mut longitude = None;

    for (flag, value) in command_flags {
        let value = value.as_deref().unwrap_or_default();
        match flag.as_str() {
            "--json" => options.json = true,
            "--date" => match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                Ok(date) => options.date = Some(date),
                Err(_) => {
                    log_warning!("Invalid date: '{value}'. Use YYYY-MM-DD");
                    return None;
                }
            },
            "--days" => match value.parse::<u32>() {
                Ok(days) => options.days = days,
                Err(_) => {
                    log_warning!("Invalid number of days: '{value}'");
                    return None;
                }
            },
            "--lat" => match value.parse::<f64>() {
                Ok(lat) => latitude = Some(lat),
                Err(_) => {
                    log_warning!("Invalid latitude: '{value}'");
                    return None;
                }
            },
            "--lng" => match value.parse::<f64>() {
                Ok(lng) => longitude = Some(lng),
                Err(_) => {
                    log_warning!("Invalid longitude: '{value}'");
                    return None;
                }
            },
            other => {
                log_warning!("times does not accept {other}");
                return None;
            }
        }
    }

    match (latitude, longitude) {
        (Some(lat), Some(lng)) => options.coordinates = Some((lat, lng)),
        (None, None) => {}
        _ => {
            log_warning!("--lat and --lng must be given together");
            return None;
        }
    }
    Some(options)
}

fn parse_test_audio_options(
    command_flags: &[(String, Option<String>)],
) -> Option<TestAudioOptions> {
    let mut options = TestAudioOptions::default();

    for (flag, value) in command_flags {
        let value = value.as_deref().unwrap_or_default();
        match flag.as_str() {
            "--volume" => match value.parse::<u8>() {
                Ok(volume) => options.volume = Some(volume),
                Err(_) => {
                    log_warning!("Invalid volume: '{value}'. Use 0-100");
                    return None;
                }
            },
            "--duration" => match value.parse::<u64>() {
                Ok(seconds) => options.duration_secs = seconds,
                Err(_) => {
                    log_warning!("Invalid duration: '{value}'. Use whole seconds");
                    return None;
                }
            },
            "--prayer" => match value.parse::<PrayerKind>() {
                Ok(prayer) => options.prayer = Some(prayer),
                Err(_) => {
                    log_warning!("Unknown prayer: '{value}'");
                    return None;
                }
            },
            other => {
                log_warning!("test-audio does not accept {other}");
                return None;
            }
        }
    }

    if let Err(e) = options.validate() {
        log_warning!("{e}");
        return None;
    }
    Some(options)
}

fn parse_simulate(rest: &[String], flags: GlobalFlags) -> CliAction {
    let (start, end) = match rest {
        [start, end] | [start, end, _] => (start, end),
        _ => {
            log_warning!(
                "Usage: vakitd simulate \"YYYY-MM-DD HH:MM:SS\" \"YYYY-MM-DD HH:MM:SS\" [multiplier]"
            );
            return CliAction::ShowHelpDueToError;
        }
    };

    for (label, value) in [("start", start), ("end", end)] {
        if !looks_like_datetime(value) {
            log_error!("Invalid {label} time format: '{value}'. Use YYYY-MM-DD HH:MM:SS");
            return CliAction::ShowHelpDueToError;
        }
    }

    let multiplier = match rest.get(2) {
        None => DEFAULT_MULTIPLIER,
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => value,
            _ => {
                log_error!("Invalid multiplier: {raw}. Use 0 to fast-forward or a positive number");
                return CliAction::ShowHelpDueToError;
            }
        },
    };

    CliAction::Simulate {
        debug_enabled: flags.debug_enabled,
        config_dir: flags.config_dir,
        log_file: flags.log_file,
        start_time: start.clone(),
        end_time: end.clone(),
        multiplier,
    }
}

/// Shape check only; the simulate command parses the value in the location's timezone.
fn looks_like_datetime(s: &str) -> bool {
    let bytes = s.as_bytes();
    s.len() == 19
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b' '
        && bytes[13] == b':'
        && bytes[16] == b':'
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("vakitd [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-l, --log <file>       Also write output to a file");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("run                    Run the daemon (default)");
    log_indented!("times, t [OPTIONS]     Print prayer times and exit");
    log_indented!("simulate, S <start> <end> [multiplier]");
    log_indented!("                       Replay a time window without playing audio");
    log_indented!("test-audio [OPTIONS]   Play a short adhan preview");
    log_indented!("help, h [COMMAND]      Show detailed help for a command");
    log_block_start!("Signals:");
    log_indented!("SIGHUP, SIGUSR2        Reload configuration");
    log_indented!("SIGUSR1                Stop the adhan that is playing");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        ParsedArgs::parse(std::iter::once("vakitd").chain(args.iter().copied())).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
                log_file: None,
            }
        );
    }

    #[test]
    fn test_parse_run_with_global_flags() {
        assert_eq!(
            parse(&["-d", "run", "--config", "/tmp/vakit", "--log", "/tmp/vakit.log"]),
            CliAction::Run {
                debug_enabled: true,
                config_dir: Some("/tmp/vakit".into()),
                log_file: Some("/tmp/vakit.log".into()),
            }
        );
    }

    #[test]
    fn test_parse_help_and_version_flags() {
        assert_eq!(parse(&["--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-h"]), CliAction::ShowHelp);
        assert_eq!(parse(&["--version"]), CliAction::ShowVersion);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
        assert_eq!(parse(&["-v"]), CliAction::ShowVersion);
    }

    #[test]
    fn test_version_takes_precedence() {
        assert_eq!(parse(&["--version", "--help", "--debug"]), CliAction::ShowVersion);
    }

    #[test]
    fn test_parse_unknown_flag_and_command() {
        assert_eq!(parse(&["--unknown"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--debug", "--invalid"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["pray"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["--config"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_times_defaults() {
        assert_eq!(
            parse(&["times"]),
            CliAction::Times {
                config_dir: None,
                options: TimesOptions {
                    days: 1,
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn test_parse_times_options() {
        let action = parse(&[
            "t", "--date", "2024-06-21", "--days", "7", "--lat", "-33.8688", "--lng", "151.2093",
            "--json",
        ]);
        let CliAction::Times { options, .. } = action else {
            panic!("expected times, got {action:?}");
        };
        assert_eq!(options.date, NaiveDate::from_ymd_opt(2024, 6, 21));
        assert_eq!(options.days, 7);
        assert_eq!(options.coordinates, Some((-33.8688, 151.2093)));
        assert!(options.json);
    }

    #[test]
    fn test_parse_times_rejects_bad_values() {
        assert_eq!(parse(&["times", "--date", "21/06/2024"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["times", "--days", "many"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["times", "--lat", "41.0"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["times", "tomorrow"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_times_flags_need_times_command() {
        assert_eq!(parse(&["--json"]), CliAction::ShowHelpDueToError);
        assert_eq!(
            parse(&["simulate", "2024-06-21 00:00:00", "2024-06-22 00:00:00", "--json"]),
            CliAction::ShowHelpDueToError
        );
    }

    #[test]
    fn test_parse_simulate() {
        assert_eq!(
            parse(&["simulate", "2024-06-21 00:00:00", "2024-06-22 00:00:00", "--debug"]),
            CliAction::Simulate {
                debug_enabled: true,
                config_dir: None,
                log_file: None,
                start_time: "2024-06-21 00:00:00".into(),
                end_time: "2024-06-22 00:00:00".into(),
                multiplier: DEFAULT_MULTIPLIER,
            }
        );

        let action = parse(&["S", "2024-06-21 00:00:00", "2024-06-21 06:00:00", "60"]);
        let CliAction::Simulate { multiplier, .. } = action else {
            panic!("expected simulate, got {action:?}");
        };
        assert_eq!(multiplier, 60.0);
    }

    #[test]
    fn test_parse_simulate_rejects_bad_input() {
        assert_eq!(parse(&["simulate", "2024-06-21"]), CliAction::ShowHelpDueToError);
        assert_eq!(
            parse(&["simulate", "2024-06-21T00:00:00", "2024-06-22 00:00:00"]),
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            parse(&["simulate", "2024-06-21 00:00:00", "2024-06-22 00:00:00", "fast"]),
            CliAction::ShowHelpDueToError
        );
        assert_eq!(
            parse(&["simulate", "2024-06-21 00:00:00", "2024-06-22 00:00:00", "-5"]),
            CliAction::ShowHelpDueToError
        );
    }

    #[test]
    fn test_parse_test_audio() {
        assert_eq!(
            parse(&["test-audio"]),
            CliAction::TestAudio {
                debug_enabled: false,
                config_dir: None,
                options: TestAudioOptions::default(),
            }
        );

        let action = parse(&[
            "test-audio", "--volume", "35", "--duration", "5", "--prayer", "yatsi", "-d",
        ]);
        let CliAction::TestAudio {
            debug_enabled,
            options,
            ..
        } = action
        else {
            panic!("expected test-audio, got {action:?}");
        };
        assert!(debug_enabled);
        assert_eq!(options.volume, Some(35));
        assert_eq!(options.duration_secs, 5);
        assert_eq!(options.prayer, Some(PrayerKind::Isha));
    }

    #[test]
    fn test_parse_test_audio_rejects_bad_values() {
        assert_eq!(parse(&["test-audio", "--volume", "150"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["test-audio", "--volume", "loud"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["test-audio", "--duration", "0"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["test-audio", "--prayer", "sunrise"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["test-audio", "--prayer", "teatime"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["test-audio", "--json"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["times", "--volume", "35"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["test-audio", "now"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_help_command() {
        assert_eq!(parse(&["help"]), CliAction::HelpCommand { command: None });
        assert_eq!(
            parse(&["help", "times"]),
            CliAction::HelpCommand {
                command: Some("times".into())
            }
        );
        assert_eq!(parse(&["help", "times", "simulate"]), CliAction::ShowHelpDueToError);
    }
}
