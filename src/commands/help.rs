//! Help command implementation for vakitd.
//!
//! Dispatches `vakitd help [COMMAND]` to the command's own help page.

use anyhow::Result;

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("run") => display_run_help(),
        Some("times") | Some("t") => super::times::display_help(),
        Some("simulate") | Some("S") => super::simulate::display_help(),
        Some("test-audio") => super::test_audio::display_help(),
        Some("help") | Some("h") => display_help_help(),
        Some(unknown) => {
            log_warning_standalone!("Unknown command: {}", unknown);
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands (for the help command)
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("run                     Run the daemon (default)");
    log_indented!("times, t [OPTIONS]      Print prayer times and exit");
    log_indented!("simulate, S <s> <e> [m] Replay a time window without playing audio");
    log_indented!("test-audio [OPTIONS]    Play a short adhan preview");
    log_indented!("help, h [COMMAND]       Show detailed help for a command");
    log_pipe!();
    log_info!("Use 'vakitd help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'vakitd --help' to see all options and general usage.");
    log_end!();
}

fn display_run_help() {
    log_version!();
    log_block_start!("run - Start the adhan daemon");
    log_block_start!("Usage: vakitd [OPTIONS] [run]");
    log_block_start!("Files:");
    log_indented!("~/.config/vakit/vakit.toml        Settings, created on first run");
    log_indented!("~/.local/share/vakit/audio/       Adhan recordings");
    log_indented!("~/.local/state/vakit/journal.json Events already fired");
    log_block_start!("Signals:");
    log_indented!("SIGHUP, SIGUSR2   Reload configuration");
    log_indented!("SIGUSR1           Stop the adhan that is playing");
    log_indented!("SIGINT, SIGTERM   Stop playback and exit");
    log_end!();
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: vakitd help [COMMAND]");
    log_block_start!("Arguments:");
    log_indented!("COMMAND  Optional command to get help for");
    log_indented!("         If omitted, shows general help");
    log_block_start!("Examples:");
    log_indented!("vakitd help");
    log_indented!("vakitd help times");
    log_end!();
}
