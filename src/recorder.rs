//! Recording module.
//! Uses `rdev` for global mouse/keyboard events (cross-platform).
//! Each click or key press becomes an action carrying the interval since the
//! previous one. Pressing the color toggle key arms the next click: the pixel
//! color under it is sampled and a search area centered on it is stored, so
//! playback can re-locate the target by color.
//! The stop key ends the session.
//! macOS: the terminal needs Accessibility permission for global input events.

use std::sync::mpsc;
use std::thread;
use std::time::SystemTime;

use crate::action::{
    Action, ColorTarget, DEFAULT_TOLERANCE, KeyboardAction, MouseAction, MouseButton, Region, Script,
};
use crate::capture::ScreenSource;
use crate::config::Settings;
use crate::error::{MacroError, MacroResult};
use crate::keys::KeyCode;

/// Delay given to a first recorded click, so playback has a moment before it.
const FIRST_CLICK_DELAY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMoved { x: f64, y: f64 },
    ButtonPressed(MouseButton),
    KeyPressed(KeyCode),
}

/// An input event with its time in seconds since recording started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    pub at: f64,
    pub event: InputEvent,
}

#[derive(Debug, Clone)]
pub struct RecorderOptions {
    pub color_toggle_key: KeyCode,
    pub stop_key: KeyCode,
    pub color_area_width: u32,
    pub color_area_height: u32,
    pub tolerance: u8,
}

impl RecorderOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            color_toggle_key: settings.color_toggle_key,
            stop_key: settings.stop_recording_key,
            color_area_width: settings.color_area_width,
            color_area_height: settings.color_area_height,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

pub struct RecordingSession {
    options: RecorderOptions,
    /// Actions stamped with the time they were recorded
    events: Vec<(f64, Action)>,
    pointer: (i32, i32),
    color_armed: bool,
    finished: bool,
}

impl RecordingSession {
    pub fn new(options: RecorderOptions) -> Self {
        Self {
            options,
            events: Vec::new(),
            pointer: (0, 0),
            color_armed: false,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Feeds one event. Returns false once the stop key has been pressed.
    pub fn handle<S: ScreenSource>(&mut self, timed: TimedEvent, screen: &mut S) -> bool {
        if self.finished {
            return false;
        }
        match timed.event {
            InputEvent::PointerMoved { x, y } => {
                self.pointer = (x.round() as i32, y.round() as i32);
            }
            InputEvent::KeyPressed(key) if key.matches(&self.options.stop_key) => {
                tracing::info!(actions = self.events.len(), "stop key pressed, recording finished");
                self.finished = true;
            }
            InputEvent::KeyPressed(key) if key.matches(&self.options.color_toggle_key) => {
                tracing::info!("color capture armed for the next click");
                self.color_armed = true;
            }
            InputEvent::KeyPressed(key) => {
                tracing::debug!(%key, at = timed.at, "recorded key");
                self.events.push((
                    timed.at,
                    Action::Keyboard(KeyboardAction {
                        delay: 0.0,
                        key,
                        jitter: None,
                    }),
                ));
            }
            InputEvent::ButtonPressed(button) => {
                let (x, y) = self.pointer;
                let color = if std::mem::take(&mut self.color_armed) {
                    self.sample_color(x, y, screen)
                } else {
                    None
                };
                tracing::debug!(%button, x, y, at = timed.at, with_color = color.is_some(), "recorded click");
                // only kept when this is the first action
                self.events.push((
                    timed.at,
                    Action::Mouse(MouseAction {
                        delay: FIRST_CLICK_DELAY,
                        button,
                        position: (x, y),
                        color,
                        jitter: None,
                    }),
                ));
            }
        }
        !self.finished
    }

    /// Converts the recorded timestamps into per-action intervals.
    pub fn finish(self) -> Script {
        Script::from_timestamps(self.events)
    }

    fn sample_color<S: ScreenSource>(&self, x: i32, y: i32, screen: &mut S) -> Option<ColorTarget> {
        match screen.pixel(x, y) {
            Ok(color) => {
                tracing::info!(?color, x, y, "sampled click color");
                Some(ColorTarget {
                    color,
                    area: Region::centered_on(x, y, self.options.color_area_width, self.options.color_area_height),
                    tolerance: self.options.tolerance,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, x, y, "could not sample click color, recording a plain click");
                None
            }
        }
    }
}

fn translate(event: &rdev::Event) -> Option<InputEvent> {
    match &event.event_type {
        rdev::EventType::MouseMove { x, y } => Some(InputEvent::PointerMoved { x: *x, y: *y }),
        rdev::EventType::ButtonPress(button) => MouseButton::from_rdev(*button).map(InputEvent::ButtonPressed),
        rdev::EventType::KeyPress(key) => KeyCode::from_rdev(*key)
            .or_else(|| {
                let name = event.name.as_deref()?;
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_control() => Some(KeyCode::Char(c)),
                    _ => None,
                }
            })
            .map(InputEvent::KeyPressed),
        _ => None,
    }
}

/// Records from the global input listener until the stop key is pressed.
pub fn record_live<S: ScreenSource>(options: RecorderOptions, screen: &mut S) -> MacroResult<Script> {
    let (tx, rx) = mpsc::channel::<Result<TimedEvent, String>>();
    let started = SystemTime::now();

    let failure_tx = tx.clone();
    thread::spawn(move || {
        let callback = move |event: rdev::Event| {
            let Some(input) = translate(&event) else {
                return;
            };
            let at = event
                .time
                .duration_since(started)
                .unwrap_or_default()
                .as_secs_f64();
            let _ = tx.send(Ok(TimedEvent { at, event: input }));
        };
        if let Err(e) = rdev::listen(callback) {
            let _ = failure_tx.send(Err(format!("{:?}", e)));
        }
    });

    tracing::info!(
        stop_key = %options.stop_key,
        color_key = %options.color_toggle_key,
        "recording; press the stop key to finish"
    );
    let mut session = RecordingSession::new(options);
    for message in rx {
        let timed = message.map_err(|e| MacroError::input(format!("global input listener failed: {}", e)))?;
        if !session.handle(timed, screen) {
            break;
        }
    }
    if !session.is_finished() {
        tracing::warn!(actions = session.len(), "input listener ended before the stop key was pressed");
    }
    Ok(session.finish())
}
