//! Open-file limit tuning for many concurrent connections.

use std::io;

use tracing::info;

/// Raise the soft open-file limit to the hard limit.
///
/// Returns the soft limit in effect afterwards.
#[cfg(unix)]
pub fn raise_fd_limit() -> io::Result<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, writable rlimit.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) } != 0 {
        return Err(io::Error::last_os_error());
    }

    if limit.rlim_cur < limit.rlim_max {
        let raised = libc::rlimit {
            rlim_cur: limit.rlim_max,
            rlim_max: limit.rlim_max,
        };
        // SAFETY: `raised` is a valid rlimit that does not exceed the hard limit.
        if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &raised) } != 0 {
            return Err(io::Error::last_os_error());
        }
        info!(
            from = limit.rlim_cur as u64,
            to = raised.rlim_cur as u64,
            "Raised open file limit"
        );
        limit = raised;
    }

    Ok(limit.rlim_cur as u64)
}

#[cfg(not(unix))]
pub fn raise_fd_limit() -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "open file limits are not adjustable on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_raise_is_idempotent() {
        // Some sandboxes refuse setrlimit; there is nothing to check then.
        let Ok(first) = raise_fd_limit() else { return };
        assert!(first > 0);
        assert_eq!(raise_fd_limit().unwrap(), first);
    }
}
