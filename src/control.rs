//! Playback control: stop, pause and skip-wait flags shared between the replay
//! thread and whoever drives it (the global hotkey listener, Ctrl+C, tests).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::keys::KeyCode;

#[derive(Debug, Default)]
struct Flags {
    stop: AtomicBool,
    pause: AtomicBool,
    skip: AtomicBool,
}

/// Cheap to clone; all clones share the same flags.
#[derive(Debug, Clone, Default)]
pub struct PlaybackControl {
    flags: Arc<Flags>,
}

impl PlaybackControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flags.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.flags.pause.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.flags.pause.store(false, Ordering::SeqCst);
    }

    /// Returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        !self.flags.pause.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.flags.pause.load(Ordering::SeqCst)
    }

    pub fn skip_wait(&self) {
        self.flags.skip.store(true, Ordering::SeqCst);
    }

    /// Consumes a pending skip request.
    pub fn take_skip(&self) -> bool {
        self.flags.skip.swap(false, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Paused,
    Resumed,
    Stopped,
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct Hotkeys {
    pub pause: KeyCode,
    pub stop: KeyCode,
    pub skip: KeyCode,
}

impl Hotkeys {
    /// Applies a pressed key to `control`. Keys that are not bound return `None`.
    pub fn apply(&self, key: KeyCode, control: &PlaybackControl) -> Option<HotkeyAction> {
        if key.matches(&self.pause) {
            return Some(if control.toggle_pause() {
                HotkeyAction::Paused
            } else {
                HotkeyAction::Resumed
            });
        }
        if key.matches(&self.stop) {
            control.stop();
            return Some(HotkeyAction::Stopped);
        }
        if key.matches(&self.skip) {
            control.skip_wait();
            return Some(HotkeyAction::Skipped);
        }
        None
    }
}

/// Listens for global key presses on a background thread and feeds them to `hotkeys`.
///
/// `rdev::listen` never returns on success, so the thread lives until the process
/// exits; once `control` is stopped further presses are ignored.
pub fn spawn_hotkey_listener(hotkeys: Hotkeys, control: PlaybackControl) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let callback = move |event: rdev::Event| {
            if control.is_stopped() {
                return;
            }
            let rdev::EventType::KeyPress(raw) = event.event_type else {
                return;
            };
            let Some(key) = KeyCode::from_rdev(raw) else {
                return;
            };
            if let Some(action) = hotkeys.apply(key, &control) {
                tracing::info!(?action, %key, "playback hotkey");
            }
        };
        if let Err(e) = rdev::listen(callback) {
            tracing::error!(error = ?e, "global hotkey listener failed; hotkeys are disabled");
        }
    })
}
