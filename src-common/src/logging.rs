//! Platform-specific logging directory resolution.

use std::path::PathBuf;

/// Returns the platform-appropriate directory for log files, or `None` when
/// no home directory can be determined.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/loopgrab/logs` or `~/.local/state/loopgrab/logs` |
/// | macOS | `~/Library/Logs/loopgrab` |
/// | Windows | `%LOCALAPPDATA%\loopgrab\loopgrab\logs` |
pub fn log_dir() -> Option<PathBuf> {
    let base = directories::ProjectDirs::from("", "", "loopgrab")?;

    #[cfg(target_os = "linux")]
    {
        Some(
            base.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| base.data_local_dir().join("state"))
                .join("logs"),
        )
    }

    #[cfg(target_os = "macos")]
    {
        // data_local_dir is ~/Library/Application Support/loopgrab
        let library = base
            .data_local_dir()
            .parent()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().to_path_buf());
        Some(library.join("Logs").join("loopgrab"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Some(base.data_local_dir().join("logs"))
    }
}

/// Ensures the log directory exists, creating it if necessary.
///
/// Returns the directory on success.
pub fn ensure_log_dir() -> Result<PathBuf, std::io::Error> {
    let dir = log_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine a log directory",
        )
    })?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// File name prefix for the service log.
///
/// The rolling appender creates dated files in [`log_dir`]
/// (e.g. `loopgrab-service.2026-03-01.log`).
pub const SERVICE_LOG_PREFIX: &str = "loopgrab-service";
