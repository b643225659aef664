use anyhow::Result;
use perch_experiment::CancelToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(target_os = "linux")]
extern "C" fn on_signal(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Routes SIGINT and SIGTERM into a flag instead of killing the process,
/// so the session log is written before the rig is released.
#[cfg(target_os = "linux")]
pub fn install() -> Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        for sig in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(sig, &action, std::ptr::null_mut()) != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn install() -> Result<()> {
    Ok(())
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Cancels `token` once an interrupt arrives. The thread also exits when
/// the token is cancelled from elsewhere.
pub fn forward_to(token: CancelToken) -> JoinHandle<()> {
    thread::spawn(move || {
        while !token.is_cancelled() {
            if interrupted() {
                info!("test interrupted by user");
                token.cancel();
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn signal_before_the_watcher_starts_still_cancels() {
        install().unwrap();
        // arrives while the rig would still be opening
        assert_eq!(unsafe { libc::raise(libc::SIGTERM) }, 0);
        assert!(interrupted());

        let token = CancelToken::new();
        forward_to(token.clone()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
