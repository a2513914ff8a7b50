//! Detaching the server from its terminal.

use nix::{
    errno::Errno,
    fcntl::{open, OFlag},
    sys::stat::{umask, Mode},
    unistd::{chdir, close, dup2, fork, setsid, ForkResult},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("fork failed: {0}")]
    Fork(Errno),

    #[error("setsid failed: {0}")]
    Setsid(Errno),

    #[error("chdir to / failed: {0}")]
    Chdir(Errno),

    #[error("redirecting standard streams to /dev/null failed: {0}")]
    Redirect(Errno),
}

/// Turns the current process into a daemon.
///
/// The parent exits with status 0; only the child returns. Must be called
/// before any threads are started, which rules out an already running tokio
/// runtime. Errors from the fork and setsid steps are reported while the
/// standard streams still point at the terminal.
pub fn daemonize() -> Result<(), DaemonError> {
    // SAFETY: the process is still single-threaded here.
    match unsafe { fork() }.map_err(DaemonError::Fork)? {
        ForkResult::Parent { child } => {
            log::debug!("Daemon started with pid {}", child);
            std::process::exit(0);
        }
        ForkResult::Child => {}
    }

    setsid().map_err(DaemonError::Setsid)?;
    chdir("/").map_err(DaemonError::Chdir)?;
    redirect_standard_streams().map_err(DaemonError::Redirect)?;
    // 027: no group write, nothing for others.
    umask(Mode::S_IWGRP | Mode::S_IRWXO);

    Ok(())
}

fn redirect_standard_streams() -> Result<(), Errno> {
    let null = open("/dev/null", OFlag::O_RDWR, Mode::empty())?;
    for fd in 0..=2 {
        dup2(null, fd)?;
    }
    if null > 2 {
        close(null)?;
    }
    Ok(())
}
