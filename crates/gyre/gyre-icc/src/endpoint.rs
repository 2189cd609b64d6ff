//! Connectionless local-socket endpoint bound to a filesystem path.
//!
//! Both sides of the bus own exactly one [`DatagramEndpoint`]: the publisher
//! binds the well-known path from its configuration, every subscriber binds a
//! private path derived from it. Whoever binds a path unlinks it again on
//! [`close`](DatagramEndpoint::close) (or drop), so a clean shutdown leaves no
//! socket files behind.
//!
//! # Datagram outcomes
//!
//! Per-datagram results are values, not errors: [`classify_send`] and
//! [`classify_receive`] turn raw `io::Result`s into the cases the loops act on.
//!
//! ```text
//! send_to ──► Delivered | Short | PeerGone (ENOENT, ECONNREFUSED) | Transient
//! recv    ──► Record | Empty | Short | Oversized | TimedOut | Failed
//! ```

use crate::error::TransportError;
use gyre_config::check_socket_path;
use std::fs;
use std::io;
use std::net::Shutdown;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of sending one datagram to one peer.
#[derive(Debug)]
pub enum SendOutcome {
    Delivered,
    /// The kernel accepted fewer bytes than the record holds.
    Short { sent: usize, expected: usize },
    /// The peer's socket file is gone or nobody is bound to it any more.
    PeerGone(io::Error),
    /// Anything else (full receive queue, interrupted call, ...). The peer may
    /// recover on a later tick.
    Transient(io::Error),
}

/// Result of one receive attempt.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// Exactly one full record is in the buffer.
    Record,
    Empty,
    Short(usize),
    Oversized(usize),
    /// The read timeout elapsed (or a non-blocking socket had nothing queued).
    TimedOut,
    Failed(io::Error),
}

pub fn classify_send(result: io::Result<usize>, expected: usize) -> SendOutcome {
    match result {
        Ok(sent) if sent == expected => SendOutcome::Delivered,
        Ok(sent) => SendOutcome::Short { sent, expected },
        Err(e) if is_peer_gone(&e) => SendOutcome::PeerGone(e),
        Err(e) => SendOutcome::Transient(e),
    }
}

pub fn classify_receive(result: io::Result<usize>, expected: usize) -> ReceiveOutcome {
    match result {
        Ok(0) => ReceiveOutcome::Empty,
        Ok(n) if n < expected => ReceiveOutcome::Short(n),
        Ok(n) if n > expected => ReceiveOutcome::Oversized(n),
        Ok(_) => ReceiveOutcome::Record,
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            ReceiveOutcome::TimedOut
        }
        Err(e) => ReceiveOutcome::Failed(e),
    }
}

fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}

pub struct DatagramEndpoint {
    socket: Option<UnixDatagram>,
    path: PathBuf,
    /// Set while the socket file at `path` is ours to unlink.
    owns_path: bool,
}

impl DatagramEndpoint {
    /// Binds a datagram socket at `path`.
    ///
    /// The path is validated before any socket is created. A socket file left
    /// behind by a dead process is unlinked; one that still has a live owner
    /// is reported as [`TransportError::AddressInUse`].
    pub fn bind<P: AsRef<Path>>(path: P) -> Result<Self, TransportError> {
        let path = path.as_ref();
        check_socket_path(path)?;
        remove_stale_socket(path)?;

        info!(path = %path.display(), "binding datagram socket");
        let socket = UnixDatagram::bind(path).map_err(|source| {
            if source.kind() == io::ErrorKind::AddrInUse {
                TransportError::AddressInUse {
                    path: path.to_path_buf(),
                }
            } else {
                TransportError::Bind {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Ok(Self {
            socket: Some(socket),
            path: path.to_path_buf(),
            owns_path: true,
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn socket(&self) -> io::Result<&UnixDatagram> {
        self.socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "endpoint is closed"))
    }

    /// `None` blocks forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.socket()
            .and_then(|s| s.set_read_timeout(timeout))
            .map_err(TransportError::SocketOption)
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), TransportError> {
        self.socket()
            .and_then(|s| s.set_nonblocking(nonblocking))
            .map_err(TransportError::SocketOption)
    }

    #[inline]
    pub fn send_to(&self, datagram: &[u8], peer: &Path) -> SendOutcome {
        let result = self.socket().and_then(|s| s.send_to(datagram, peer));
        classify_send(result, datagram.len())
    }

    /// Receives one datagram and returns its size with the sender's path.
    /// Unnamed senders yield `None` for the path.
    #[inline]
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Option<PathBuf>)> {
        let (n, addr) = self.socket()?.recv_from(buf)?;
        Ok((n, addr.as_pathname().map(Path::to_path_buf)))
    }

    #[inline]
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket()?.recv(buf)
    }

    /// A handle another thread can use to unblock a pending receive.
    pub fn waker(&self) -> Result<EndpointWaker, TransportError> {
        let socket = self
            .socket()
            .and_then(UnixDatagram::try_clone)
            .map_err(TransportError::SocketOption)?;
        Ok(EndpointWaker { socket })
    }

    /// Closes the socket and unlinks the path this endpoint bound.
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            info!(path = %self.path.display(), "closing datagram socket");
        }
        if self.owns_path {
            self.owns_path = false;
            match fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "unlinked socket path"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %self.path.display(), error = %e, "failed to unlink socket path"),
            }
        }
    }
}

impl Drop for DatagramEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

/// Cloned descriptor used only to shut the read side down, which wakes a
/// receive blocked without a timeout.
pub struct EndpointWaker {
    socket: UnixDatagram,
}

impl EndpointWaker {
    pub fn wake(&self) {
        if let Err(e) = self.socket.shutdown(Shutdown::Read) {
            debug!(error = %e, "read shutdown failed");
        }
    }
}

/// Unlinks `path` if it is a socket file nobody is bound to any more.
fn remove_stale_socket(path: &Path) -> Result<(), TransportError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::Bind {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    // Not a socket: leave it alone and let bind() report the conflict.
    if !meta.file_type().is_socket() {
        return Ok(());
    }

    let probe = UnixDatagram::unbound().map_err(|source| TransportError::Bind {
        path: path.to_path_buf(),
        source,
    })?;
    match probe.connect(path) {
        Ok(()) => Err(TransportError::AddressInUse {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            warn!(path = %path.display(), "removing stale socket file");
            fs::remove_file(path).map_err(|source| TransportError::Bind {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(TransportError::Bind {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_config::ConfigError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_path(label: &str) -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        PathBuf::from(format!("/tmp/gyre_ep_{label}_{}_{n}", std::process::id()))
    }

    #[test]
    fn classify_send_covers_every_case() {
        assert!(matches!(classify_send(Ok(48), 48), SendOutcome::Delivered));
        assert!(matches!(
            classify_send(Ok(10), 48),
            SendOutcome::Short { sent: 10, expected: 48 }
        ));
        let gone = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(classify_send(Err(gone), 48), SendOutcome::PeerGone(_)));
        let refused = io::Error::from_raw_os_error(libc::ECONNREFUSED);
        assert!(matches!(classify_send(Err(refused), 48), SendOutcome::PeerGone(_)));
        let full = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(matches!(classify_send(Err(full), 48), SendOutcome::Transient(_)));
        let nobufs = io::Error::from_raw_os_error(libc::ENOBUFS);
        assert!(matches!(classify_send(Err(nobufs), 48), SendOutcome::Transient(_)));
    }

    #[test]
    fn classify_receive_covers_every_case() {
        assert!(matches!(classify_receive(Ok(0), 48), ReceiveOutcome::Empty));
        assert!(matches!(classify_receive(Ok(47), 48), ReceiveOutcome::Short(47)));
        assert!(matches!(classify_receive(Ok(48), 48), ReceiveOutcome::Record));
        assert!(matches!(classify_receive(Ok(49), 48), ReceiveOutcome::Oversized(49)));
        let timeout = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(matches!(classify_receive(Err(timeout), 48), ReceiveOutcome::TimedOut));
        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(classify_receive(Err(other), 48), ReceiveOutcome::Failed(_)));
    }

    #[test]
    fn oversized_path_is_a_config_error_before_any_socket_work() {
        let path = format!("/tmp/{}", "p".repeat(200));
        let err = DatagramEndpoint::bind(&path).err().expect("must fail");
        assert!(matches!(
            err,
            TransportError::Config(ConfigError::SocketPathTooLong { .. })
        ));
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn close_unlinks_and_is_idempotent() {
        let path = temp_path("close");
        let mut ep = DatagramEndpoint::bind(&path).unwrap();
        assert!(path.exists());
        ep.close();
        assert!(!path.exists());
        assert!(!ep.is_open());
        ep.close();
        ep.close();
    }

    #[test]
    fn drop_unlinks_path() {
        let path = temp_path("drop");
        {
            let _ep = DatagramEndpoint::bind(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn live_peer_keeps_its_address() {
        let path = temp_path("live");
        let _owner = DatagramEndpoint::bind(&path).unwrap();
        let err = DatagramEndpoint::bind(&path).err().expect("address is taken");
        assert!(matches!(err, TransportError::AddressInUse { .. }));
        assert!(path.exists(), "failed bind must not unlink the owner's path");
    }

    #[test]
    fn stale_socket_file_is_replaced() {
        let path = temp_path("stale");
        // A bound std socket that is dropped leaves its file behind.
        drop(UnixDatagram::bind(&path).unwrap());
        assert!(path.exists());

        let ep = DatagramEndpoint::bind(&path).expect("stale file is reclaimed");
        assert!(ep.is_open());
    }

    #[test]
    fn regular_file_is_never_unlinked() {
        let path = temp_path("regular");
        fs::write(&path, b"not a socket").unwrap();
        let err = DatagramEndpoint::bind(&path).err().expect("bind must fail");
        assert!(matches!(
            err,
            TransportError::AddressInUse { .. } | TransportError::Bind { .. }
        ));
        assert_eq!(fs::read(&path).unwrap(), b"not a socket");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn send_to_missing_peer_reports_peer_gone() {
        let path = temp_path("sender");
        let ep = DatagramEndpoint::bind(&path).unwrap();
        let outcome = ep.send_to(b"hello", &temp_path("nobody"));
        assert!(matches!(outcome, SendOutcome::PeerGone(_)));
    }

    #[test]
    fn datagram_round_trip_reports_sender_path() {
        let a = temp_path("a");
        let b = temp_path("b");
        let ep_a = DatagramEndpoint::bind(&a).unwrap();
        let ep_b = DatagramEndpoint::bind(&b).unwrap();

        assert!(matches!(ep_a.send_to(b"ping", &b), SendOutcome::Delivered));

        let mut buf = [0u8; 16];
        let (n, from) = ep_b.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from.as_deref(), Some(a.as_path()));
    }

    #[test]
    fn read_timeout_elapses() {
        let path = temp_path("timeout");
        let ep = DatagramEndpoint::bind(&path).unwrap();
        ep.set_read_timeout(Some(Duration::from_millis(10))).unwrap();
        let mut buf = [0u8; 8];
        let outcome = classify_receive(ep.recv(&mut buf), buf.len());
        assert!(matches!(outcome, ReceiveOutcome::TimedOut));
    }

    #[test]
    fn closed_endpoint_reports_transient_send() {
        let path = temp_path("closed");
        let mut ep = DatagramEndpoint::bind(&path).unwrap();
        ep.close();
        assert!(matches!(ep.send_to(b"x", &path), SendOutcome::Transient(_)));
    }
}
