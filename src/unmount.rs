//! Unmounting a mount point from outside the process that owns it (the `cammount --unmount`
//! subcommand), by shelling out to the platform's unmount command and giving it a bounded
//! amount of time rather than hanging forever on an unresponsive mount.

use std::path::Path;
use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::errors::{FuseResult, PosixError};

const UNMOUNT_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs the platform unmount command against `mountpoint`, racing it against
/// `UNMOUNT_TIMEOUT`. A command that hangs (a wedged mount some worker still holds open)
/// is reported as a timeout rather than blocking the caller indefinitely.
pub fn unmount(mountpoint: &Path) -> FuseResult<()> {
    let mountpoint = mountpoint.to_path_buf();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = platform_unmount_command(&mountpoint).status();
        let _ = tx.send(result);
    });
    match rx.recv_timeout(UNMOUNT_TIMEOUT) {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(PosixError::transport(format!("unmount command exited with {status}"))),
        Ok(Err(e)) => Err(PosixError::from(e)),
        Err(_) => Err(PosixError::transport(format!(
            "unmount command did not finish within {UNMOUNT_TIMEOUT:?}"
        ))),
    }
}

#[cfg(target_os = "macos")]
fn platform_unmount_command(mountpoint: &Path) -> Command {
    let mut cmd = Command::new("diskutil");
    cmd.arg("umount").arg("force").arg(mountpoint);
    cmd
}

#[cfg(not(target_os = "macos"))]
fn platform_unmount_command(mountpoint: &Path) -> Command {
    let mut cmd = Command::new("fusermount");
    cmd.arg("-u").arg(mountpoint);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_command_targets_the_given_mountpoint() {
        let cmd = platform_unmount_command(Path::new("/mnt/camli"));
        let args: Vec<&std::ffi::OsStr> = cmd.get_args().collect();
        assert!(args.iter().any(|a| *a == "/mnt/camli"));
    }
}
