//! Detaching the server into the background

use crate::Result;
use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::{dup2, fork, setsid, ForkResult, Pid};
use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Which side of the fork the caller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// The original process; it should exit successfully
    Parent(Pid),
    /// The background process; it carries on serving
    Child,
}

/// Fork into the background.
///
/// The child becomes a session leader, moves to `/`, and has its standard
/// streams pointed at `/dev/null`. Call this before starting any runtime
/// threads.
pub fn detach() -> Result<Detached> {
    // SAFETY: called from main before the Tokio runtime or any other thread exists.
    let forked = unsafe { fork() }?;
    match forked {
        ForkResult::Parent { child } => Ok(Detached::Parent(child)),
        ForkResult::Child => {
            setsid()?;
            std::env::set_current_dir("/")?;
            redirect_std_streams()?;
            Ok(Detached::Child)
        }
    }
}

fn redirect_std_streams() -> Result<()> {
    let null = OpenOptions::new().read(true).write(true).open("/dev/null")?;
    let fd = null.as_raw_fd();
    for target in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO] {
        dup2(fd, target)?;
    }
    Ok(())
}

/// Anchor a relative path at the current directory, since detaching
/// changes directory to `/`.
pub fn absolute_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
