//! Bridge from an editor's stdio language client to the language server
//! running inside sclang.
//!
//! The LanguageServer quark listens on TCP. Editors usually spawn a server
//! on stdio, so `sclink lsp` connects to the quark and shuttles bytes in
//! both directions. Frames are parsed only to log them; the byte stream is
//! forwarded untouched.

mod frame;

use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

pub use frame::{FrameError, FrameKind, FrameScanner, LspFrame, encode};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a TCP connection to the language server.
///
/// Every resolved address is tried in turn with `timeout` each.
///
/// # Errors
/// Returns the last connection error, or `NotFound` if the host resolves
/// to no addresses.
pub fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                tracing::info!(%addr, "connected to language server");
                return Ok(stream);
            }
            Err(err) => {
                tracing::debug!(%addr, %err, "language server connect failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(ErrorKind::NotFound, format!("{host} resolved to no addresses"))
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToServer,
    ToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ToServer => "editor->server",
            Self::ToClient => "server->editor",
        })
    }
}

/// Byte counts after a bridge session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub to_server: u64,
    pub to_client: u64,
}

/// Shuttle bytes between `input`/`output` and the server until the server
/// side closes.
///
/// `input` is read on a background thread. When it reaches EOF the write
/// half of the socket is shut down so the server sees the client leave.
///
/// The reader thread is detached. If the server closes first, `run`
/// returns right away and the thread ends on the next read from `input`
/// (EOF, an error, or data that fails to reach the closed socket).
///
/// # Errors
/// Returns an error if reading from the server or writing to `output` fails.
pub fn run<R, W>(stream: TcpStream, input: R, output: &mut W) -> io::Result<BridgeStats>
where
    R: Read + Send + 'static,
    W: Write + ?Sized,
{
    let to_server = Arc::new(AtomicU64::new(0));
    let upstream = stream.try_clone()?;
    let counter = Arc::clone(&to_server);
    thread::spawn(move || {
        let mut socket = upstream;
        if let Err(err) = pump(input, &mut socket, Direction::ToServer, &counter) {
            tracing::warn!(%err, "editor->server pump stopped");
        }
        let _ = socket.shutdown(Shutdown::Write);
    });

    let to_client = AtomicU64::new(0);
    let mut downstream = stream;
    pump(&mut downstream, output, Direction::ToClient, &to_client)?;

    let stats = BridgeStats {
        to_server: to_server.load(Ordering::Relaxed),
        to_client: to_client.load(Ordering::Relaxed),
    };
    tracing::info!(?stats, "language server bridge closed");
    Ok(stats)
}

fn pump<R, W>(mut reader: R, writer: &mut W, direction: Direction, count: &AtomicU64) -> io::Result<()>
where
    R: Read,
    W: Write + ?Sized,
{
    let mut scanner = FrameScanner::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        for frame in scanner.push(&buf[..n]) {
            match frame {
                Ok(frame) => tracing::debug!(
                    %direction,
                    kind = ?frame.kind,
                    method = frame.method.as_deref().unwrap_or("-"),
                    id = ?frame.id,
                    len = frame.len,
                    "lsp frame"
                ),
                Err(err) => tracing::warn!(%direction, %err, "unparseable lsp frame"),
            }
        }
        writer.write_all(&buf[..n])?;
        writer.flush()?;
        count.fetch_add(n as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;

    /// Blocks until its sender is dropped, like a quiet stdin.
    struct Idle(std::sync::mpsc::Receiver<()>);

    impl Read for Idle {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_bridge_returns_when_server_closes_first() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let goodbye = encode(r#"{"jsonrpc":"2.0","method":"exit"}"#);

        let reply = goodbye.clone();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&reply).unwrap();
        });

        let (hold, idle) = std::sync::mpsc::channel();
        let stream = connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let mut output = Vec::new();
        let stats = run(stream, Idle(idle), &mut output).unwrap();
        server.join().unwrap();

        assert_eq!(output, goodbye);
        assert_eq!(stats.to_server, 0);
        // Releases the detached reader.
        drop(hold);
    }

    #[test]
    fn test_connect_refused_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(connect("127.0.0.1", port, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_bridge_forwards_both_directions() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let request = encode(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#);
        let response = encode(r#"{"jsonrpc":"2.0","id":1,"result":null}"#);

        let reply = response.clone();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).unwrap();
            socket.write_all(&reply).unwrap();
            received
        });

        let stream = connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let mut output = Vec::new();
        let stats = run(stream, Cursor::new(request.clone()), &mut output).unwrap();

        assert_eq!(server.join().unwrap(), request);
        assert_eq!(output, response);
        assert_eq!(stats.to_client, response.len() as u64);
        assert_eq!(stats.to_server, request.len() as u64);
    }
}
