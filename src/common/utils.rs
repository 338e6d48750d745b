//! Small helpers shared across modules.

use chrono::Duration;
use std::path::Path;

/// Replace the home directory prefix with `~` for log output.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = path.strip_prefix(&home)
    {
        return format!("~/{}", rest.display());
    }
    path.display().to_string()
}

/// Check whether a process with the given PID exists.
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Signal 0 performs error checking only
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Render a countdown as `1h 05m`, `12m 30s` or `45s`.
pub fn format_countdown(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Format coordinates as `41.0082°N, 28.9784°E`.
pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    let ns = if latitude >= 0.0 { 'N' } else { 'S' };
    let ew = if longitude >= 0.0 { 'E' } else { 'W' };
    format!(
        "{:.4}°{ns}, {:.4}°{ew}",
        latitude.abs(),
        longitude.abs()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_formats() {
        assert_eq!(format_countdown(Duration::seconds(45)), "45s");
        assert_eq!(format_countdown(Duration::seconds(750)), "12m 30s");
        assert_eq!(format_countdown(Duration::seconds(3900)), "1h 05m");
        assert_eq!(format_countdown(Duration::seconds(-5)), "0s");
    }

    #[test]
    fn coordinates_format_hemispheres() {
        assert_eq!(format_coordinates(41.0082, 28.9784), "41.0082°N, 28.9784°E");
        assert_eq!(format_coordinates(-33.8688, -70.6693), "33.8688°S, 70.6693°W");
    }

    #[test]
    fn current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }
}
