//! `vakitd` entry point: parse arguments and dispatch.
//!
//! - no command or `run`: [`Vakitd`] daemon
//! - `times`: print prayer times and exit
//! - `simulate`: replay a time window on a simulated clock
//! - `test-audio`: play a short adhan preview
//! - `help`, `--help`, `--version`: informational output
//!
//! Errors from any command end up here and are printed with their full
//! context chain before exiting with a failure status.

use anyhow::Result;

use vakit::args::{self, CliAction, ParsedArgs};
use vakit::commands;
use vakit::common::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use vakit::common::logger::{Log, LoggerGuard};
use vakit::config;
use vakit::daemon::Vakitd;
use vakit::log_error_exit;

fn main() {
    let parsed_args = ParsedArgs::from_env();

    match dispatch(parsed_args.action) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log_error_exit!("{e}");
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn dispatch(action: CliAction) -> Result<i32> {
    match action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(EXIT_SUCCESS)
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(EXIT_SUCCESS)
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            Ok(EXIT_FAILURE)
        }
        CliAction::HelpCommand { command } => {
            commands::help::run_help_command(command.as_deref())?;
            Ok(EXIT_SUCCESS)
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
            log_file,
        } => {
            config::set_config_dir(config_dir)?;
            let _log_guard = start_file_logging(log_file)?;
            Vakitd::new(debug_enabled).run()?;
            Ok(EXIT_SUCCESS)
        }
        CliAction::Times {
            config_dir,
            options,
        } => {
            config::set_config_dir(config_dir)?;
            commands::times::run_times_command(options)?;
            Ok(EXIT_SUCCESS)
        }
        CliAction::TestAudio {
            debug_enabled,
            config_dir,
            options,
        } => {
            config::set_config_dir(config_dir)?;
            commands::test_audio::run_test_audio_command(options, debug_enabled)?;
            Ok(EXIT_SUCCESS)
        }
        CliAction::Simulate {
            debug_enabled,
            config_dir,
            log_file,
            start_time,
            end_time,
            multiplier,
        } => {
            config::set_config_dir(config_dir)?;
            let _log_guard = start_file_logging(log_file)?;
            commands::simulate::run_simulate_command(
                &start_time,
                &end_time,
                multiplier,
                debug_enabled,
            )?;
            Ok(EXIT_SUCCESS)
        }
    }
}

/// Route output to `path` for the lifetime of the returned guard.
fn start_file_logging(path: Option<String>) -> Result<Option<LoggerGuard>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let guard = Log::start_file_logging(path)?;
    Ok(Some(guard))
}
