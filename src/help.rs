//! Class help lookup.
//!
//! sclang knows where each class's help file lives; ask it with a one-shot
//! script and fall back to the online class reference when it cannot say.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::sclang;

const NO_HELP: &str = "NOHELP";
const ONLINE_DOCS: &str = "https://doc.sccode.org/Classes";

/// Where help for a symbol can be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelpTarget {
    /// A rendered HTML help page.
    Html(PathBuf),
    /// A schelp or source file best opened in an editor.
    Source(PathBuf),
    /// The online class reference.
    Online(String),
}

impl fmt::Display for HelpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html(path) | Self::Source(path) => write!(f, "{}", path.display()),
            Self::Online(url) => f.write_str(url),
        }
    }
}

/// True for names that are safe to splice into sclang source.
pub fn is_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn online_url(symbol: &str) -> String {
    format!("{ONLINE_DOCS}/{symbol}.html")
}

/// sclang code that prints the help path for `symbol`, or `NOHELP`.
pub fn help_script(symbol: &str) -> String {
    format!(
        r#"var class, helpPath;
class = "{symbol}".asSymbol.asClass;
if (class.notNil) {{
    helpPath = class.help.path;
}} {{
    helpPath = Help.findHelpFile("{symbol}");
}};
if (helpPath.notNil) {{ helpPath.postln }} {{ "{NO_HELP}".postln }};
0.exit;"#
    )
}

/// The help path printed by [`help_script`], if any.
///
/// sclang prints its startup banner first, so only the last line counts.
pub fn parse_help_output(output: &str) -> Option<PathBuf> {
    if output.contains(NO_HELP) || output.trim().is_empty() {
        return None;
    }
    output
        .trim()
        .lines()
        .next_back()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
}

/// Classify a local help file by extension.
pub fn classify(path: PathBuf) -> HelpTarget {
    let is_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "html" | "htm"));
    if is_html {
        HelpTarget::Html(path)
    } else {
        HelpTarget::Source(path)
    }
}

/// Find help for `symbol`, falling back to the online reference.
pub fn resolve_help(sclang_path: &Path, symbol: &str, timeout: Duration) -> HelpTarget {
    if !is_symbol(symbol) {
        tracing::debug!(symbol, "not a class name, using online help");
        return HelpTarget::Online(online_url(symbol));
    }
    match sclang::run_script(sclang_path, &help_script(symbol), timeout) {
        Ok(output) => match parse_help_output(&output) {
            Some(path) if path.exists() => classify(path),
            Some(path) => {
                tracing::debug!(path = %path.display(), "help path does not exist");
                HelpTarget::Online(online_url(symbol))
            }
            None => HelpTarget::Online(online_url(symbol)),
        },
        Err(err) => {
            tracing::warn!(%err, symbol, "help lookup failed, using online help");
            HelpTarget::Online(online_url(symbol))
        }
    }
}

/// Open a help target with the platform's default handler.
///
/// # Errors
/// Returns an error if the opener cannot be started.
pub fn open_external(target: &HelpTarget) -> std::io::Result<()> {
    let arg = target.to_string();
    let mut command = opener();
    command.arg(&arg);
    tracing::info!(help = %arg, "opening help");
    command.spawn().map(drop)
}

#[cfg(target_os = "macos")]
fn opener() -> Command {
    Command::new("open")
}

#[cfg(target_os = "windows")]
fn opener() -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]);
    command
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener() -> Command {
    Command::new("xdg-open")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_symbol_accepts_identifiers_only() {
        assert!(is_symbol("SinOsc"));
        assert!(is_symbol("_private1"));
        assert!(!is_symbol(""));
        assert!(!is_symbol("1abc"));
        assert!(!is_symbol("Foo\"); 0.exit; (\""));
    }

    #[test]
    fn test_help_script_mentions_symbol_and_exits() {
        let script = help_script("SinOsc");
        assert!(script.contains("\"SinOsc\".asSymbol.asClass"));
        assert!(script.contains("Help.findHelpFile(\"SinOsc\")"));
        assert!(script.contains("\"NOHELP\".postln"));
        assert!(script.trim_end().ends_with("0.exit;"));
    }

    #[test]
    fn test_parse_help_output_takes_last_line() {
        let output = "compiling class library...\nWelcome to SuperCollider\n/usr/share/SuperCollider/Help/Classes/SinOsc.html\n";
        assert_eq!(
            parse_help_output(output),
            Some(PathBuf::from("/usr/share/SuperCollider/Help/Classes/SinOsc.html"))
        );
    }

    #[test]
    fn test_parse_help_output_nohelp_or_blank_is_none() {
        assert_eq!(parse_help_output("banner\nNOHELP\n"), None);
        assert_eq!(parse_help_output("  \n"), None);
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(
            classify(PathBuf::from("/h/SinOsc.HTML")),
            HelpTarget::Html(PathBuf::from("/h/SinOsc.HTML"))
        );
        assert_eq!(
            classify(PathBuf::from("/h/SinOsc.schelp")),
            HelpTarget::Source(PathBuf::from("/h/SinOsc.schelp"))
        );
    }

    #[test]
    fn test_online_fallback_url() {
        assert_eq!(online_url("Pbind"), "https://doc.sccode.org/Classes/Pbind.html");
    }

    #[test]
    fn test_resolve_help_without_sclang_falls_back_online() {
        let target = resolve_help(
            Path::new("/definitely/not/a/real/sclang"),
            "SinOsc",
            Duration::from_secs(1),
        );
        assert_eq!(target, HelpTarget::Online(online_url("SinOsc")));
        assert_eq!(
            target.to_string(),
            "https://doc.sccode.org/Classes/SinOsc.html"
        );
    }

    #[test]
    fn test_resolve_help_rejects_non_identifiers_without_running_sclang() {
        let target = resolve_help(Path::new("sclang"), "a b", Duration::from_secs(1));
        assert_eq!(target, HelpTarget::Online(online_url("a b")));
    }
}
