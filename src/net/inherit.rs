//! Listening-socket hand-off between process generations.
//!
//! The old generation keeps a duplicate of its listening descriptor
//! ([`export_listener`]), places it at [`INHERITED_LISTENER_FD`] in the child
//! ([`pass_to_child`]), and the child adopts it ([`resume_listener`]) instead
//! of binding. The socket is never closed in between.

use std::io;
use tokio::net::TcpListener;

/// Descriptor number the inherited listener occupies in the new generation.
pub const INHERITED_LISTENER_FD: i32 = 3;

#[cfg(unix)]
mod imp {
    use super::INHERITED_LISTENER_FD;
    use std::io;
    use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
    use std::os::unix::process::CommandExt;
    use std::process::Command;
    use tokio::net::TcpListener;

    /// Handle to a listening socket that can be given to a child process.
    #[derive(Debug)]
    pub struct ExportedListener {
        fd: OwnedFd,
    }

    impl ExportedListener {
        pub fn raw_fd(&self) -> RawFd {
            self.fd.as_raw_fd()
        }
    }

    pub fn export_listener(listener: &TcpListener) -> io::Result<ExportedListener> {
        // Duplicates are close-on-exec; only pass_to_child makes one inheritable.
        let fd = listener.as_fd().try_clone_to_owned()?;
        Ok(ExportedListener { fd })
    }

    pub fn pass_to_child(command: &mut Command, listener: &ExportedListener) {
        let fd = listener.raw_fd();
        // SAFETY: the closure runs between fork and exec and only calls
        // async-signal-safe functions (fcntl, dup2).
        unsafe {
            command.pre_exec(move || {
                if fd == INHERITED_LISTENER_FD {
                    let flags = libc::fcntl(fd, libc::F_GETFD);
                    if flags == -1
                        || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1
                    {
                        return Err(io::Error::last_os_error());
                    }
                } else if libc::dup2(fd, INHERITED_LISTENER_FD) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    pub fn resume_listener(fd: RawFd) -> io::Result<TcpListener> {
        // SAFETY: fcntl on an arbitrary descriptor number is sound; it fails
        // with EBADF if nothing is open there.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        if flags == -1 {
            return Err(io::Error::last_os_error());
        }
        // Keep the descriptor from leaking into unrelated children.
        if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: the descriptor is open (checked above) and was handed to this
        // process for exclusive ownership by the previous generation.
        let std_listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
        // Fails with ENOTSOCK / EINVAL if the descriptor is not a bound socket.
        std_listener.local_addr()?;
        std_listener.set_nonblocking(true)?;
        TcpListener::from_std(std_listener)
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;
    use std::process::Command;
    use tokio::net::TcpListener;

    #[derive(Debug)]
    pub struct ExportedListener;

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "listener hand-off requires a unix platform",
        )
    }

    pub fn export_listener(_listener: &TcpListener) -> io::Result<ExportedListener> {
        Err(unsupported())
    }

    pub fn pass_to_child(_command: &mut Command, _listener: &ExportedListener) {}

    pub fn resume_listener(_fd: i32) -> io::Result<TcpListener> {
        Err(unsupported())
    }
}

pub use imp::{pass_to_child, ExportedListener};

/// Keep an inheritable duplicate of `listener`'s descriptor.
pub fn export_listener(listener: &TcpListener) -> io::Result<ExportedListener> {
    imp::export_listener(listener)
}

/// Adopt the listening socket left at [`INHERITED_LISTENER_FD`] by the
/// previous generation. Must be called from within a Tokio runtime.
pub fn resume_listener() -> io::Result<TcpListener> {
    imp::resume_listener(INHERITED_LISTENER_FD)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn exported_descriptor_serves_same_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let exported = export_listener(&listener).unwrap();

        // Dropping the original must not close the socket.
        drop(listener);

        // Adopt a second duplicate the way a child would.
        let dup = unsafe { libc::dup(exported.raw_fd()) };
        assert!(dup >= 0);
        let resumed = imp::resume_listener(dup).unwrap();
        assert_eq!(resumed.local_addr().unwrap(), addr);

        let client = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"ping").await.unwrap();
        });
        let (mut accepted, _) = resumed.accept().await.unwrap();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
        client.await.unwrap();
    }

    #[tokio::test]
    async fn resume_rejects_closed_descriptor() {
        let err = imp::resume_listener(987_654).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
