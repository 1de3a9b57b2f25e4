//! Connection indicator shown after each command.

use std::fmt;

const CONNECTED: &str = "SC ●";
const DISCONNECTED: &str = "SC ○";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusIndicator {
    pub text: String,
    pub tooltip: String,
}

impl StatusIndicator {
    /// State before any connection attempt.
    pub fn initial() -> Self {
        Self {
            text: DISCONNECTED.to_string(),
            tooltip: "SuperCollider (Click to connect)".to_string(),
        }
    }

    pub fn render(connected: bool, lsp_running: bool) -> Self {
        let (text, state) = if connected {
            (CONNECTED, "Connected")
        } else {
            (DISCONNECTED, "Disconnected")
        };
        let mut tooltip = format!("SuperCollider ({state})");
        if lsp_running {
            tooltip.push_str(" | LSP Active");
        }
        Self {
            text: text.to_string(),
            tooltip,
        }
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for StatusIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.text, self.tooltip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_invites_connect() {
        let status = StatusIndicator::initial();
        assert_eq!(status.text, "SC ○");
        assert_eq!(status.tooltip, "SuperCollider (Click to connect)");
    }

    #[test]
    fn test_render_connected_with_lsp() {
        let status = StatusIndicator::render(true, true);
        assert_eq!(status.text, "SC ●");
        assert_eq!(status.tooltip, "SuperCollider (Connected) | LSP Active");
    }

    #[test]
    fn test_render_disconnected_without_lsp() {
        let status = StatusIndicator::render(false, false);
        assert_eq!(status.text, "SC ○");
        assert_eq!(status.tooltip, "SuperCollider (Disconnected)");
        assert_eq!(status.to_string(), "SC ○  SuperCollider (Disconnected)");
    }
}
