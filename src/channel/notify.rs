//! Payload-less cross-process notifications.
//!
//! Two well-known names exist: [`Notification::NewAudio`] (client → host)
//! and [`Notification::Done`] (host → client).  They are delivered as
//! `SIGUSR1` / `SIGUSR2`: each process writes its pid into the channel
//! directory on startup, and the peer signals that pid when it has news.
//!
//! A signal carries no payload, has no delivery guarantee, and coalesces
//! under rapid posting — an observed firing means only "re-check shared
//! state now".  The receiving side is a [`NotifyListener`] wrapping a single
//! `AtomicBool` flag, so the signal handler returns immediately and the real
//! work happens wherever [`NotifyListener::take`] is polled.  The protocol's
//! polling loops reconcile everything a lost signal would have announced; on
//! non-Unix targets posting is a no-op and polling alone drives the
//! exchange.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::store::TranscriptionChannel;

// ---------------------------------------------------------------------------
// Notification / Role
// ---------------------------------------------------------------------------

/// The two well-known notification names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// "New audio available" — the client published a request.
    NewAudio,
    /// "Done" — the host published a terminal result.
    Done,
}

impl Notification {
    pub fn name(self) -> &'static str {
        match self {
            Notification::NewAudio => "new-audio",
            Notification::Done => "done",
        }
    }

    /// Which process consumes this notification.
    pub fn receiver(self) -> Role {
        match self {
            Notification::NewAudio => Role::Host,
            Notification::Done => Role::Client,
        }
    }

    #[cfg(unix)]
    fn signal(self) -> i32 {
        match self {
            Notification::NewAudio => signal_hook::consts::SIGUSR1,
            Notification::Done => signal_hook::consts::SIGUSR2,
        }
    }
}

/// Which side of the channel a process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Host,
}

impl Role {
    fn pid_file(self) -> &'static str {
        match self {
            Role::Client => "client.pid",
            Role::Host => "host.pid",
        }
    }
}

// ---------------------------------------------------------------------------
// Presence (pid files)
// ---------------------------------------------------------------------------

/// Record this process's pid in the channel directory so the peer can signal
/// it.
pub fn announce(channel: &TranscriptionChannel, role: Role) -> io::Result<()> {
    let path = channel.dir().join(role.pid_file());
    fs::write(&path, std::process::id().to_string())?;
    log::debug!("notify: announced {role:?} pid {}", std::process::id());
    Ok(())
}

/// Remove this process's pid file on orderly shutdown.  Missing is fine.
pub fn withdraw(channel: &TranscriptionChannel, role: Role) {
    let path = channel.dir().join(role.pid_file());
    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != io::ErrorKind::NotFound {
            log::debug!("notify: failed to withdraw {role:?} pid file: {e}");
        }
    }
}

fn peer_pid(channel: &TranscriptionChannel, role: Role) -> Option<u32> {
    let path = channel.dir().join(role.pid_file());
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Posting
// ---------------------------------------------------------------------------

/// Fire-and-forget: signal the peer process, if one has announced itself.
///
/// Returns whether a signal was actually sent.  `false` — peer absent, pid
/// stale, or an unsupported platform — is not an error; the peer's poll loop
/// covers the gap.
pub fn post(channel: &TranscriptionChannel, notification: Notification) -> bool {
    let Some(pid) = peer_pid(channel, notification.receiver()) else {
        log::debug!("notify: no {:?} to receive {}", notification.receiver(), notification.name());
        return false;
    };
    post_to_pid(pid, notification)
}

#[cfg(unix)]
fn post_to_pid(pid: u32, notification: Notification) -> bool {
    // SAFETY: kill with a valid signal number is safe to call for any pid;
    // a stale pid yields ESRCH, reported as "not delivered".
    let sent = unsafe { libc::kill(pid as libc::pid_t, notification.signal()) } == 0;
    if sent {
        log::debug!("notify: posted {} to pid {pid}", notification.name());
    } else {
        log::debug!("notify: pid {pid} unreachable for {}", notification.name());
    }
    sent
}

#[cfg(not(unix))]
fn post_to_pid(_pid: u32, notification: Notification) -> bool {
    log::debug!(
        "notify: no signal transport on this platform, {} relies on polling",
        notification.name()
    );
    false
}

// ---------------------------------------------------------------------------
// NotifyListener
// ---------------------------------------------------------------------------

/// Single-consumer, coalescing observer for one notification name.
///
/// Clones share the same flag, so a test (or a same-process peer) can
/// [`notify`](Self::notify) a listener directly.
#[derive(Debug, Clone)]
pub struct NotifyListener {
    flag: Arc<AtomicBool>,
}

impl NotifyListener {
    /// Register a process-wide handler for the notification's signal.
    ///
    /// The registration lives for the rest of the process.  On non-Unix
    /// targets this is equivalent to [`manual`](Self::manual).
    pub fn register(notification: Notification) -> io::Result<Self> {
        let listener = Self::manual();
        #[cfg(unix)]
        signal_hook::flag::register(notification.signal(), Arc::clone(&listener.flag))?;
        #[cfg(not(unix))]
        let _ = notification;
        Ok(listener)
    }

    /// A listener that only fires when [`notify`](Self::notify) is called —
    /// the non-Unix fallback and the test seam.
    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Raise the flag by hand.
    pub fn notify(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Consume a pending notification, if any.  Rapid posts coalesce into
    /// one `true`.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn channel() -> (tempfile::TempDir, TranscriptionChannel) {
        let dir = tempdir().expect("temp dir");
        let ch = TranscriptionChannel::create(dir.path()).expect("create channel");
        (dir, ch)
    }

    #[test]
    fn names_and_receivers() {
        assert_eq!(Notification::NewAudio.name(), "new-audio");
        assert_eq!(Notification::Done.name(), "done");
        assert_eq!(Notification::NewAudio.receiver(), Role::Host);
        assert_eq!(Notification::Done.receiver(), Role::Client);
    }

    #[test]
    fn post_without_peer_is_not_delivered() {
        let (_dir, ch) = channel();
        assert!(!post(&ch, Notification::NewAudio));
    }

    #[test]
    fn manual_listener_coalesces() {
        let listener = NotifyListener::manual();
        assert!(!listener.take());

        listener.notify();
        listener.notify();
        listener.notify();
        assert!(listener.take(), "three posts coalesce into one");
        assert!(!listener.take(), "flag is consumed");
    }

    #[test]
    fn clones_share_the_flag() {
        let listener = NotifyListener::manual();
        let peer = listener.clone();
        peer.notify();
        assert!(listener.take());
    }

    #[test]
    fn announce_then_withdraw() {
        let (_dir, ch) = channel();
        announce(&ch, Role::Client).unwrap();
        assert_eq!(peer_pid(&ch, Role::Client), Some(std::process::id()));

        withdraw(&ch, Role::Client);
        assert_eq!(peer_pid(&ch, Role::Client), None);
        // Withdrawing twice is harmless.
        withdraw(&ch, Role::Client);
    }

    /// End-to-end signal delivery within one process: announce ourselves as
    /// the client, then post Done — the kill targets our own pid and the
    /// registered flag observes it.
    #[cfg(unix)]
    #[test]
    fn posted_signal_reaches_registered_listener() {
        let (_dir, ch) = channel();
        let listener = NotifyListener::register(Notification::Done).unwrap();
        announce(&ch, Role::Client).unwrap();

        assert!(post(&ch, Notification::Done));

        // Signal delivery is asynchronous; poll briefly.
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if listener.take() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("signal was never observed");
    }
}
