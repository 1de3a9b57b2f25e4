//! The application context.
//!
//! A [`Session`] owns every long-lived piece (OSC client, launched sclang,
//! language server state) and implements the user-facing commands. `main`
//! creates one per invocation and shuts it down on exit.

use std::io;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::config::{Config, validate_config};
use crate::document::{Document, Position, Range, TextSource};
use crate::eval::{self, EvalTarget};
use crate::help::{self, HelpTarget};
use crate::lsp;
use crate::osc::{OscClient, OscError};
use crate::sclang::{self, SclangError, SclangProcess};
use crate::status::StatusIndicator;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("SuperCollider configuration errors: {}", .0.join(", "))]
    InvalidConfig(Vec<String>),

    #[error("Not connected to sclang")]
    NotConnected,

    #[error("No symbol under cursor")]
    NoSymbol,

    #[error(
        "could not reach the language server at {host}:{port}: {source}. \
         Make sure the LanguageServer quark is installed and sclang is running"
    )]
    LanguageServerUnreachable {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Osc(#[from] OscError),

    #[error(transparent)]
    Sclang(#[from] SclangError),
}

/// Delays and timeouts used by session commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub script_timeout: Duration,
    pub init_delay: Duration,
    pub relaunch_wait: Duration,
    pub connect_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            script_timeout: sclang::SCRIPT_TIMEOUT,
            init_delay: sclang::INIT_DELAY,
            relaunch_wait: Duration::from_secs(3),
            connect_timeout: lsp::CONNECT_TIMEOUT,
            shutdown_grace: sclang::SHUTDOWN_GRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connect {
    Connected,
    AlreadyConnected,
}

pub struct Session {
    config: Config,
    lsp_port: u16,
    osc: OscClient,
    sclang: Option<SclangProcess>,
    lsp_running: bool,
    touched: bool,
    timings: Timings,
}

impl Session {
    /// Build a session from validated settings.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] listing every problem.
    pub fn new(config: Config) -> Result<Self, SessionError> {
        let (osc_port, lsp_port) = checked_ports(&config)?;
        let osc = OscClient::new(config.osc_host.clone(), osc_port);
        Ok(Self {
            config,
            lsp_port,
            osc,
            sclang: None,
            lsp_running: false,
            touched: false,
            timings: Timings::default(),
        })
    }

    #[must_use]
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn is_connected(&self) -> bool {
        self.osc.is_connected()
    }

    pub fn status(&self) -> StatusIndicator {
        if self.touched {
            StatusIndicator::render(self.osc.is_connected(), self.lsp_running)
        } else {
            StatusIndicator::initial()
        }
    }

    /// Open the OSC socket.
    ///
    /// # Errors
    /// Returns an error if the socket cannot be bound or the host resolved.
    pub fn connect(&mut self) -> Result<Connect, SessionError> {
        self.touched = true;
        if self.osc.is_connected() {
            return Ok(Connect::AlreadyConnected);
        }
        self.osc.connect()?;
        Ok(Connect::Connected)
    }

    fn ensure_connected(&mut self) -> Result<(), SessionError> {
        if !self.osc.is_connected() {
            self.connect()?;
        }
        Ok(())
    }

    /// Send the selection, enclosing block, or current line.
    ///
    /// Returns what was sent, or `None` if the code was blank.
    ///
    /// # Errors
    /// Returns an error if connecting or sending fails.
    pub fn eval_selection<S: TextSource + ?Sized>(
        &mut self,
        source: &S,
        selection: Range,
    ) -> Result<Option<EvalTarget>, SessionError> {
        self.ensure_connected()?;
        let Some(target) = eval::resolve_target(source, selection) else {
            tracing::debug!(?selection, "nothing to evaluate");
            return Ok(None);
        };
        self.osc.send_eval(&target.code)?;
        tracing::info!(kind = %target.kind, bytes = target.code.len(), "evaluated");
        Ok(Some(target))
    }

    /// Send the whole document.
    ///
    /// # Errors
    /// Returns an error if connecting or sending fails.
    pub fn eval_file<S: TextSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<Option<EvalTarget>, SessionError> {
        self.ensure_connected()?;
        let Some(target) = eval::resolve_file(source) else {
            return Ok(None);
        };
        self.osc.send_eval(&target.code)?;
        tracing::info!(bytes = target.code.len(), "evaluated file");
        Ok(Some(target))
    }

    /// # Errors
    /// Returns an error if connecting or sending fails.
    pub fn boot_server(&mut self) -> Result<(), SessionError> {
        self.ensure_connected()?;
        self.osc.boot_server()?;
        Ok(())
    }

    /// Quitting only makes sense against an existing connection.
    ///
    /// # Errors
    /// Returns [`SessionError::NotConnected`] when disconnected.
    pub fn quit_server(&mut self) -> Result<(), SessionError> {
        if !self.osc.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.osc.quit_server()?;
        Ok(())
    }

    /// Free every node on the default server.
    ///
    /// # Errors
    /// Returns an error if connecting or sending fails.
    pub fn stop_sound(&mut self) -> Result<(), SessionError> {
        self.ensure_connected()?;
        self.osc.stop_all_sounds()?;
        Ok(())
    }

    /// Help for the identifier at `pos`.
    ///
    /// # Errors
    /// Returns [`SessionError::NoSymbol`] if there is no identifier there.
    pub fn open_help(&self, doc: &Document, pos: Position) -> Result<HelpTarget, SessionError> {
        let symbol = doc.word_at(pos).ok_or(SessionError::NoSymbol)?;
        Ok(self.help_for_symbol(&symbol))
    }

    pub fn help_for_symbol(&self, symbol: &str) -> HelpTarget {
        help::resolve_help(&self.config.sclang_path, symbol, self.timings.script_timeout)
    }

    /// Connect to the language server, launching sclang once if asked.
    ///
    /// Returns `None` when the language server is disabled.
    ///
    /// # Errors
    /// Returns [`SessionError::LanguageServerUnreachable`] if no connection
    /// could be made, or a launch error.
    pub fn start_language_server(
        &mut self,
        launch_if_missing: bool,
    ) -> Result<Option<TcpStream>, SessionError> {
        self.touched = true;
        if !self.config.use_language_server {
            tracing::info!("Language Server disabled in configuration");
            return Ok(None);
        }

        let stream = match self.connect_language_server() {
            Ok(stream) => stream,
            Err(err) if launch_if_missing => {
                tracing::info!(%err, "language server not running, launching sclang");
                self.launch_sclang()?;
                thread::sleep(self.timings.relaunch_wait);
                self.connect_language_server()?
            }
            Err(err) => return Err(err),
        };
        self.lsp_running = true;
        Ok(Some(stream))
    }

    /// Mark the bridge as closed.
    pub const fn language_server_stopped(&mut self) {
        self.lsp_running = false;
    }

    fn connect_language_server(&self) -> Result<TcpStream, SessionError> {
        let host = &self.config.osc_host;
        lsp::connect(host, self.lsp_port, self.timings.connect_timeout).map_err(|source| {
            SessionError::LanguageServerUnreachable {
                host: host.clone(),
                port: self.lsp_port,
                source,
            }
        })
    }

    /// Launch sclang hosting the language server.
    ///
    /// Returns `false` if a launched sclang is still running.
    ///
    /// # Errors
    /// Returns an error if sclang cannot be started.
    pub fn launch_sclang(&mut self) -> Result<bool, SessionError> {
        if let Some(process) = self.sclang.as_mut() {
            if process.try_exited()?.is_none() {
                tracing::info!(pid = process.id(), "sclang is already running");
                return Ok(false);
            }
        }
        let process =
            SclangProcess::launch(&self.config.sclang_path, self.lsp_port, self.timings.init_delay)?;
        self.sclang = Some(process);
        Ok(true)
    }

    /// Apply changed settings.
    ///
    /// Returns `true` if the OSC client was disconnected and must reconnect.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] and keeps the old settings.
    pub fn apply_config(&mut self, config: Config) -> Result<bool, SessionError> {
        let (osc_port, lsp_port) = checked_ports(&config)?;
        let reconnect = self.osc.update_connection(&config.osc_host, osc_port);
        self.lsp_port = lsp_port;
        self.config = config;
        if reconnect {
            tracing::info!("configuration updated, reconnect to apply changes");
        }
        Ok(reconnect)
    }

    /// Disconnect and stop any sclang this session launched.
    ///
    /// # Errors
    /// Returns an error if the launched sclang cannot be stopped.
    pub fn shutdown(&mut self) -> Result<(), SessionError> {
        self.osc.disconnect();
        self.lsp_running = false;
        if let Some(mut process) = self.sclang.take() {
            let status = process.shutdown(self.timings.shutdown_grace)?;
            tracing::info!(?status, "sclang stopped");
        }
        Ok(())
    }
}

fn checked_ports(config: &Config) -> Result<(u16, u16), SessionError> {
    let errors = validate_config(config);
    if !errors.is_empty() {
        return Err(SessionError::InvalidConfig(errors));
    }
    let port = |value: i64, name: &str| {
        u16::try_from(value)
            .map_err(|_| SessionError::InvalidConfig(vec![format!("{name} must be between 1 and 65535")]))
    };
    Ok((
        port(config.osc_port, "oscPort")?,
        port(config.language_server_port, "languageServerPort")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, UdpSocket};
    use std::path::PathBuf;

    fn closed_port() -> i64 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        i64::from(listener.local_addr().unwrap().port())
    }

    fn quick() -> Timings {
        Timings {
            script_timeout: Duration::from_secs(1),
            init_delay: Duration::ZERO,
            relaunch_wait: Duration::ZERO,
            connect_timeout: Duration::from_secs(1),
            shutdown_grace: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_invalid_config_lists_all_errors() {
        let config = Config {
            sclang_path: PathBuf::new(),
            osc_port: 0,
            ..Config::default()
        };
        let err = Session::new(config).err().unwrap();
        assert_eq!(
            err.to_string(),
            "SuperCollider configuration errors: sclangPath cannot be empty, oscPort must be between 1 and 65535"
        );
    }

    #[test]
    fn test_status_starts_initial_then_tracks_connection() {
        let mut session = Session::new(Config::default()).unwrap();
        assert_eq!(session.status(), StatusIndicator::initial());
        assert_eq!(session.connect().unwrap(), Connect::Connected);
        assert_eq!(session.connect().unwrap(), Connect::AlreadyConnected);
        assert_eq!(session.status(), StatusIndicator::render(true, false));
        session.shutdown().unwrap();
        assert_eq!(session.status(), StatusIndicator::render(false, false));
    }

    #[test]
    fn test_quit_requires_connection() {
        let mut session = Session::new(Config::default()).unwrap();
        assert!(matches!(session.quit_server(), Err(SessionError::NotConnected)));
    }

    #[test]
    fn test_boot_and_stop_connect_automatically() {
        // A live receiver keeps ICMP port-unreachable from failing later sends.
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = Config {
            osc_port: i64::from(receiver.local_addr().unwrap().port()),
            ..Config::default()
        };
        let mut session = Session::new(config).unwrap();
        session.boot_server().unwrap();
        assert!(session.is_connected());
        session.stop_sound().unwrap();
        session.quit_server().unwrap();
    }

    #[test]
    fn test_open_help_without_word_is_no_symbol() {
        let session = Session::new(Config::default()).unwrap();
        let doc = Document::from_text("(   )");
        assert!(matches!(
            session.open_help(&doc, Position::new(0, 2)),
            Err(SessionError::NoSymbol)
        ));
    }

    #[test]
    fn test_open_help_falls_back_online_without_sclang() {
        let config = Config {
            sclang_path: PathBuf::from("/definitely/not/a/real/sclang"),
            ..Config::default()
        };
        let session = Session::new(config).unwrap().with_timings(quick());
        let doc = Document::from_text("Pbind(\\freq, 440)");
        assert_eq!(
            session.open_help(&doc, Position::new(0, 2)).unwrap(),
            HelpTarget::Online("https://doc.sccode.org/Classes/Pbind.html".to_string())
        );
    }

    #[test]
    fn test_language_server_disabled_does_nothing() {
        let config = Config {
            use_language_server: false,
            ..Config::default()
        };
        let mut session = Session::new(config).unwrap();
        assert!(session.start_language_server(true).unwrap().is_none());
        assert!(!session.status().tooltip.contains("LSP Active"));
    }

    #[test]
    fn test_language_server_unreachable_without_launch() {
        let config = Config {
            language_server_port: closed_port(),
            ..Config::default()
        };
        let mut session = Session::new(config).unwrap().with_timings(quick());
        let err = session.start_language_server(false).unwrap_err();
        assert!(matches!(err, SessionError::LanguageServerUnreachable { .. }));
    }

    #[test]
    fn test_language_server_launch_failure_is_reported() {
        let config = Config {
            sclang_path: PathBuf::from("/definitely/not/a/real/sclang"),
            language_server_port: closed_port(),
            ..Config::default()
        };
        let mut session = Session::new(config).unwrap().with_timings(quick());
        let err = session.start_language_server(true).unwrap_err();
        assert!(matches!(err, SessionError::Sclang(SclangError::Spawn { .. })), "{err:?}");
    }

    #[test]
    fn test_language_server_connect_marks_lsp_active() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = Config {
            language_server_port: i64::from(listener.local_addr().unwrap().port()),
            ..Config::default()
        };
        let mut session = Session::new(config).unwrap().with_timings(quick());
        assert!(session.start_language_server(false).unwrap().is_some());
        assert!(session.status().tooltip.ends_with("| LSP Active"));
        session.language_server_stopped();
        assert!(!session.status().tooltip.contains("LSP Active"));
    }

    #[test]
    fn test_apply_config_reports_reconnect() {
        let mut session = Session::new(Config::default()).unwrap();
        session.connect().unwrap();
        let moved = Config {
            osc_port: 57199,
            ..Config::default()
        };
        assert!(session.apply_config(moved).unwrap());
        assert!(!session.is_connected());
        assert_eq!(session.config().osc_port, 57199);
    }

    #[test]
    fn test_apply_invalid_config_keeps_old() {
        let mut session = Session::new(Config::default()).unwrap();
        let bad = Config {
            language_server_port: 0,
            ..Config::default()
        };
        assert!(matches!(
            session.apply_config(bad),
            Err(SessionError::InvalidConfig(_))
        ));
        assert_eq!(session.config().language_server_port, 57121);
    }
}
