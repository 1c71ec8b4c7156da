//! Startup environment checks
//!
//! Spawning login shells needs root and a working `login` binary; both are
//! verified once before the first connection attempt.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::SetupError;

/// Well-known locations checked before falling back to `which`
const LOGIN_CANDIDATES: &[&str] = &["/bin/login", "/usr/bin/login", "/usr/sbin/login"];

/// Verify the agent runs with the privilege needed to spawn login shells
pub fn check_privilege() -> Result<(), SetupError> {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail
        if unsafe { libc::geteuid() } != 0 {
            return Err(SetupError::NotPrivileged);
        }
    }
    Ok(())
}

/// Locate the system's login program
pub fn find_login_program() -> Result<PathBuf, SetupError> {
    for candidate in LOGIN_CANDIDATES {
        let path = Path::new(candidate);
        if path.exists() {
            tracing::debug!("Using login program at {}", path.display());
            return Ok(path.to_path_buf());
        }
    }

    // Not in a well-known location, ask the shell
    let output = Command::new("which")
        .arg("login")
        .output()
        .map_err(|_| SetupError::LoginNotFound)?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            tracing::debug!("Using login program at {}", path);
            return Ok(PathBuf::from(path));
        }
    }

    Err(SetupError::LoginNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_login_program_on_host() {
        // Every Linux system this agent targets ships a login binary
        if LOGIN_CANDIDATES.iter().any(|p| Path::new(p).exists()) {
            let path = find_login_program().unwrap();
            assert!(path.exists());
        }
    }
}
