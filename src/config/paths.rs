//! Platform-specific data directory paths.
//!
//! Used for the TTS warm-phrase cache and the optional file log:
//!   Windows: %APPDATA%/vocal-core/data
//!   macOS:   ~/Library/Application Support/vocal-core/data
//!   Linux:   $XDG_CONFIG_HOME/vocal-core/data (default ~/.config)

use std::path::PathBuf;

/// Get the application data directory (cross-platform).
pub fn get_data_dir() -> PathBuf {
    get_config_base().join("vocal-core").join("data")
}

/// Get the platform-appropriate base config directory.
fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% (typically C:\Users\<user>\AppData\Roaming)
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("AppData")
                .join("Roaming")
        })
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // Linux and other Unix: respect XDG_CONFIG_HOME, default ~/.config
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    }
}

/// Path to the warm TTS phrase cache directory.
pub fn get_tts_cache_dir() -> PathBuf {
    get_data_dir().join("tts_cache")
}
