use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const DEFAULT_SCLANG: &str = "sclang";
pub const DEFAULT_OSC_HOST: &str = "127.0.0.1";
pub const DEFAULT_OSC_PORT: i64 = 57120;
pub const DEFAULT_LSP_PORT: i64 = 57121;

/// Flags as they appear on the command line or in a config file.
///
/// Every field is optional so layers can be merged; [`ConfigFlags::resolve`]
/// fills in defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub sclang_path: Option<PathBuf>,
    pub osc_host: Option<String>,
    pub osc_port: Option<i64>,
    pub lsp_port: Option<i64>,
    pub no_language_server: bool,
    pub quiet: bool,
}

/// Effective settings after merging and defaulting.
///
/// Ports stay wide integers until [`validate_config`] has checked them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub sclang_path: PathBuf,
    pub osc_host: String,
    pub osc_port: i64,
    pub use_language_server: bool,
    pub language_server_port: i64,
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        ConfigFlags::default().resolve()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sclang path:          {}", self.sclang_path.display())?;
        writeln!(f, "OSC target:           {}:{}", self.osc_host, self.osc_port)?;
        writeln!(f, "language server:      {}", if self.use_language_server { "enabled" } else { "disabled" })?;
        write!(f, "language server port: {}", self.language_server_port)
    }
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            sclang_path: other
                .sclang_path
                .clone()
                .or_else(|| self.sclang_path.clone()),
            osc_host: other.osc_host.clone().or_else(|| self.osc_host.clone()),
            osc_port: other.osc_port.or(self.osc_port),
            lsp_port: other.lsp_port.or(self.lsp_port),
            no_language_server: self.no_language_server || other.no_language_server,
            quiet: self.quiet || other.quiet,
        }
    }

    pub fn resolve(&self) -> Config {
        Config {
            sclang_path: self
                .sclang_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCLANG)),
            osc_host: self
                .osc_host
                .clone()
                .unwrap_or_else(|| DEFAULT_OSC_HOST.to_string()),
            osc_port: self.osc_port.unwrap_or(DEFAULT_OSC_PORT),
            use_language_server: !self.no_language_server,
            language_server_port: self.lsp_port.unwrap_or(DEFAULT_LSP_PORT),
            quiet: self.quiet,
        }
    }
}

/// Every problem with `config`, in a stable order. Empty means valid.
pub fn validate_config(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();
    if config.sclang_path.as_os_str().is_empty() {
        errors.push("sclangPath cannot be empty".to_string());
    }
    if !(1..=65535).contains(&config.osc_port) {
        errors.push("oscPort must be between 1 and 65535".to_string());
    }
    if !(1..=65535).contains(&config.language_server_port) {
        errors.push("languageServerPort must be between 1 and 65535".to_string());
    }
    errors
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("sclink").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("sclink")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("sclink").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("sclink").join("config");
        }
    }

    PathBuf::from(".sclinkrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".sclinkrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(split_line)
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# sclink defaults (saved with `sclink config --save`)".to_string());
    if let Some(sclang) = &flags.sclang_path {
        lines.push(format!("--sclang-path {}", quote(&sclang.display().to_string())));
    }
    if let Some(host) = &flags.osc_host {
        lines.push(format!("--osc-host {}", quote(host)));
    }
    if let Some(port) = flags.osc_port {
        lines.push(format!("--osc-port {port}"));
    }
    if let Some(port) = flags.lsp_port {
        lines.push(format!("--lsp-port {port}"));
    }
    if flags.no_language_server {
        lines.push("--no-language-server".to_string());
    }
    if flags.quiet {
        lines.push("--quiet".to_string());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// Split a config line on whitespace, keeping `"double quoted"` runs whole.
fn split_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

fn quote(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value)),
            _ => (token, None),
        };
        match name {
            "--no-language-server" => flags.no_language_server = true,
            "--quiet" | "-q" => flags.quiet = true,
            "--sclang-path" | "--osc-host" | "--osc-port" | "--lsp-port" => {
                let value = match inline {
                    Some(value) => Some(value),
                    None => {
                        let next = tokens
                            .get(i + 1)
                            .map(String::as_str)
                            .filter(|next| !next.starts_with("--"));
                        if next.is_some() {
                            i += 1;
                        }
                        next
                    }
                };
                if let Some(value) = value {
                    apply_value(&mut flags, name, value);
                }
            }
            _ => {}
        }
        i += 1;
    }
    flags
}

fn apply_value(flags: &mut ConfigFlags, name: &str, value: &str) {
    match name {
        "--sclang-path" => flags.sclang_path = Some(PathBuf::from(value)),
        "--osc-host" => flags.osc_host = Some(value.to_string()),
        "--osc-port" => flags.osc_port = parse_port(name, value),
        "--lsp-port" => flags.lsp_port = parse_port(name, value),
        _ => {}
    }
}

fn parse_port(name: &str, value: &str) -> Option<i64> {
    let port = value.parse().ok();
    if port.is_none() {
        tracing::warn!(flag = name, value, "ignoring non-numeric port");
    }
    port
}
