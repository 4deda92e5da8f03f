//! Configuration loading and platform resolution.
//!
//! `shellpane.toml` is looked up in the working directory first, then in the
//! platform config directory. Every field is optional; unknown fields are
//! ignored so older binaries tolerate newer files. A missing file yields
//! defaults silently, a malformed one yields defaults plus a warning.
//!
//! `Platform` is resolved once at startup and handed explicitly to the prompt
//! formatter, the command loop and the process runner. Nothing downstream
//! consults `cfg!(windows)` on its own.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const APP_DIR: &str = "shellpane";
pub const CONFIG_FILE: &str = "shellpane.toml";
pub const HISTORY_FILE: &str = "history.txt";

/// Host platform family. Selects the prompt template, the prompt delimiter,
/// the continuation marker and the default shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Posix,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    /// Delimiter rendered at the end of the prompt and used to split a
    /// submitted line back into the raw command.
    pub const fn sign(self) -> &'static str {
        match self {
            Platform::Windows => ">",
            Platform::Posix => "$ ",
        }
    }

    /// Trailing marker that continues a command on the next submitted line.
    pub const fn continuation_marker(self) -> &'static str {
        match self {
            Platform::Windows => "&&",
            Platform::Posix => "\\",
        }
    }

    pub const fn is_windows(self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Shell used when neither config nor environment names one.
    pub fn default_shell(self) -> ShellCommand {
        match self {
            Platform::Windows => ShellCommand {
                program: std::env::var("COMSPEC")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "cmd.exe".to_string()),
                args: vec!["/C".to_string()],
            },
            Platform::Posix => ShellCommand {
                program: std::env::var("SHELL")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "/bin/sh".to_string()),
                args: vec!["-c".to_string()],
            },
        }
    }
}

/// Program plus leading arguments; the command string is appended as the final argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct HistoryConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ShellConfig {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub shell: ShellConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join(APP_DIR).join(CONFIG_FILE);
    }
    PathBuf::from(CONFIG_FILE)
}

/// Default history log location: `<cache_dir>/shellpane/history.txt`.
pub fn default_history_path() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HISTORY_FILE)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// History path: explicit override, then config file, then the cache default.
    pub fn history_path(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path
            .or_else(|| self.file.history.path.clone())
            .unwrap_or_else(default_history_path)
    }

    /// Shell invocation with config overrides layered over the platform default.
    pub fn shell(&self, platform: Platform) -> ShellCommand {
        let mut shell = platform.default_shell();
        if let Some(program) = self.file.shell.program.as_ref().filter(|p| !p.is_empty()) {
            shell.program = program.clone();
        }
        if let Some(args) = self.file.shell.args.as_ref() {
            shell.args = args.clone();
        }
        shell
    }
}
