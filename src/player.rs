//! Replay loop.
//! Waits out each action's delay in small steps so stop, pause and skip take
//! effect promptly, then performs the action. Mouse actions with a color target
//! are redirected to the nearest matching cluster; when none is found the
//! current script iteration restarts from its first action (after the program's
//! reset script, if any) until `max_retries` is exhausted, then playback aborts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::Duration;

use crate::action::{Action, Script};
use crate::capture::ScreenSource;
use crate::config::Settings;
use crate::control::PlaybackControl;
use crate::correction::ColorLocator;
use crate::error::{MacroError, MacroResult};
use crate::input::InputSink;
use crate::store::{Program, ScriptStore};

const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Seconds to a wait duration. Saturates at `Duration::MAX`; NaN and negative
/// values wait nothing.
fn delay_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub time_scale: f64,
    pub granular_sleep: Duration,
    pub loop_until_stopped: bool,
    pub max_retries: u32,
    pub iteration_gap: Duration,
    pub start_paused: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PlayerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            time_scale: settings.time_scale,
            granular_sleep: Duration::from_millis(settings.granular_sleep_ms.max(1)),
            loop_until_stopped: settings.loop_until_stopped,
            max_retries: settings.max_retries,
            iteration_gap: Duration::from_millis(settings.iteration_gap_ms),
            start_paused: settings.start_paused,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Completed,
    /// Stop was requested (hotkey, caller)
    Stopped,
    /// Color matching kept failing past the retry budget
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub outcome: Outcome,
    /// Script iterations that ran to completion
    pub iterations: u32,
    pub actions: u64,
    pub corrections: u32,
    pub misses: u32,
    pub retries: u32,
}

/// Snapshot handed to the progress callback before every action and on pause changes.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub script_name: String,
    pub iteration: u32,
    pub total_iterations: u32,
    pub action_index: usize,
    pub action_total: usize,
    pub action_delay: f64,
    pub elapsed: f64,
    pub total_duration: f64,
    pub paused: bool,
    pub stopped: bool,
}

pub type ProgressFn = Box<dyn FnMut(&Progress)>;

enum Step {
    Done,
    Missed,
}

pub struct Player<I, S> {
    input: I,
    locator: ColorLocator<S>,
    control: PlaybackControl,
    options: PlayerOptions,
    rng: StdRng,
    progress: Progress,
    summary: PlaybackSummary,
    on_progress: Option<ProgressFn>,
}

impl<I: InputSink, S: ScreenSource> Player<I, S> {
    pub fn new(input: I, locator: ColorLocator<S>, control: PlaybackControl, options: PlayerOptions) -> Self {
        Self {
            input,
            locator,
            control,
            options,
            rng: StdRng::from_entropy(),
            progress: Progress::default(),
            summary: PlaybackSummary::default(),
            on_progress: None,
        }
    }

    #[cfg(test)]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn on_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }

    #[cfg(test)]
    pub fn control(&self) -> &PlaybackControl {
        &self.control
    }

    #[cfg(test)]
    pub fn input(&self) -> &I {
        &self.input
    }

    // *************** Entry points ***************

    /// Plays one script `iterations` times (forever with `loop_until_stopped`).
    pub fn run_script(&mut self, name: &str, script: &Script, iterations: u32) -> MacroResult<PlaybackSummary> {
        self.begin(script.total_delay() * iterations as f64 * self.options.time_scale);
        let outcome = loop {
            let outcome = self.play_script(name, script, iterations, None)?;
            if outcome != Outcome::Completed || !self.options.loop_until_stopped {
                break outcome;
            }
            if script.is_empty() || iterations == 0 {
                tracing::warn!(script = name, "nothing to loop over");
                break Outcome::Completed;
            }
        };
        Ok(self.finish(outcome))
    }

    /// Plays every step of `program` in order, loading scripts from `store`.
    /// Scripts that fail to load are skipped with a warning.
    pub fn run_program(&mut self, store: &ScriptStore, program: &Program) -> MacroResult<PlaybackSummary> {
        self.begin(store.estimated_duration(program, self.options.time_scale));

        let reset = match &program.reset_script {
            Some(name) => match store.load_script(name) {
                Ok(script) => Some(script),
                Err(e) => {
                    tracing::warn!(script = %name, error = %e, "reset script unavailable, retrying without it");
                    None
                }
            },
            None => None,
        };

        let outcome = 'passes: loop {
            let iterations_before = self.summary.iterations;
            for step in &program.steps {
                if self.control.is_stopped() {
                    break 'passes Outcome::Stopped;
                }
                let script = match store.load_script(&step.script) {
                    Ok(script) => script,
                    Err(e) => {
                        tracing::warn!(script = %step.script, error = %e, "failed to load script, skipping");
                        continue;
                    }
                };
                let outcome = self.play_script(&step.script, &script, step.iterations, reset.as_ref())?;
                if outcome != Outcome::Completed {
                    break 'passes outcome;
                }
            }
            if !self.options.loop_until_stopped {
                break Outcome::Completed;
            }
            if self.summary.iterations == iterations_before {
                tracing::warn!("program pass ran no scripts, not looping");
                break Outcome::Completed;
            }
            tracing::info!("program pass finished, looping");
        };
        Ok(self.finish(outcome))
    }

    // *************** Replay loop ***************

    fn begin(&mut self, total_duration: f64) {
        self.summary = PlaybackSummary::default();
        self.progress = Progress {
            total_duration,
            ..Progress::default()
        };
        if self.options.start_paused {
            self.control.pause();
            tracing::info!("playback starts paused; press the pause key to begin");
        }
    }

    fn finish(&mut self, outcome: Outcome) -> PlaybackSummary {
        self.summary.outcome = outcome;
        self.progress.stopped = self.control.is_stopped();
        self.emit();
        tracing::info!(
            ?outcome,
            iterations = self.summary.iterations,
            actions = self.summary.actions,
            corrections = self.summary.corrections,
            retries = self.summary.retries,
            "playback finished"
        );
        self.summary.clone()
    }

    fn play_script(
        &mut self,
        name: &str,
        script: &Script,
        iterations: u32,
        reset: Option<&Script>,
    ) -> MacroResult<Outcome> {
        self.progress.script_name = name.to_string();
        self.progress.total_iterations = iterations;
        self.progress.action_total = script.len();

        for iteration in 1..=iterations {
            if self.control.is_stopped() {
                return Ok(Outcome::Stopped);
            }
            self.progress.iteration = iteration;
            tracing::info!(script = name, iteration, iterations, "running script");

            let outcome = self.run_iteration(script, reset)?;
            if outcome != Outcome::Completed {
                return Ok(outcome);
            }
            self.summary.iterations += 1;

            let gap = self.options.iteration_gap;
            if !self.wait(gap) {
                return Ok(Outcome::Stopped);
            }
        }
        Ok(Outcome::Completed)
    }

    /// One pass over `script`, restarting from the top after a missed color match.
    fn run_iteration(&mut self, script: &Script, reset: Option<&Script>) -> MacroResult<Outcome> {
        let mut failures = 0u32;
        let mut index = 0usize;

        while let Some(action) = script.actions.get(index) {
            match self.step(index, action)? {
                None => return Ok(Outcome::Stopped),
                Some(Step::Done) => index += 1,
                Some(Step::Missed) => {
                    failures += 1;
                    if failures > self.options.max_retries {
                        tracing::warn!(
                            failures,
                            max_retries = self.options.max_retries,
                            "color match kept failing, aborting playback"
                        );
                        self.control.stop();
                        return Ok(Outcome::Aborted);
                    }
                    self.summary.retries += 1;
                    tracing::info!(
                        attempt = failures,
                        max_retries = self.options.max_retries,
                        "restarting script from its first action"
                    );
                    if let Some(reset) = reset {
                        let outcome = self.run_reset(reset)?;
                        if outcome != Outcome::Completed {
                            return Ok(outcome);
                        }
                    }
                    index = 0;
                }
            }
        }
        Ok(Outcome::Completed)
    }

    /// Reset scripts get no retries of their own.
    fn run_reset(&mut self, reset: &Script) -> MacroResult<Outcome> {
        tracing::info!(actions = reset.len(), "running reset script");
        for (index, action) in reset.actions.iter().enumerate() {
            match self.step(index, action)? {
                None => return Ok(Outcome::Stopped),
                Some(Step::Done) => {}
                Some(Step::Missed) => {
                    tracing::warn!("reset script missed its color match, aborting playback");
                    self.control.stop();
                    return Ok(Outcome::Aborted);
                }
            }
        }
        Ok(Outcome::Completed)
    }

    /// Wait, pass the pause gate, act. `None` means stop was requested.
    fn step(&mut self, index: usize, action: &Action) -> MacroResult<Option<Step>> {
        if self.control.is_stopped() {
            return Ok(None);
        }
        let delay = self.effective_delay(action);
        self.progress.action_index = index + 1;
        self.progress.action_delay = delay;
        self.emit();

        if !self.wait(delay_duration(delay)) || !self.pause_gate() {
            return Ok(None);
        }

        let step = self.perform(action)?;
        if matches!(step, Step::Done) {
            self.summary.actions += 1;
        }
        Ok(Some(step))
    }

    fn effective_delay(&mut self, action: &Action) -> f64 {
        let mut delay = action.delay().max(0.0) * self.options.time_scale;
        if let Some(jitter) = action.jitter() {
            if jitter.validate().is_ok() {
                delay *= self.rng.gen_range(jitter.min..=jitter.max);
            }
        }
        if delay.is_finite() { delay.max(0.0) } else { 0.0 }
    }

    fn perform(&mut self, action: &Action) -> MacroResult<Step> {
        match action {
            Action::Keyboard(k) => {
                self.input.tap_key(k.key)?;
                Ok(Step::Done)
            }
            Action::Mouse(m) => {
                let (x, y) = match &m.color {
                    None => m.position,
                    Some(target) => match self.locator.locate(target, m.position) {
                        Ok(Some(found)) => {
                            self.summary.corrections += 1;
                            tracing::info!(
                                color = ?target.color,
                                x = found.point.0,
                                y = found.point.1,
                                dx = found.offset.0,
                                dy = found.offset.1,
                                cluster_size = found.cluster_size,
                                clusters = found.clusters_seen,
                                "color found"
                            );
                            found.point
                        }
                        Ok(None) => {
                            self.summary.misses += 1;
                            tracing::warn!(color = ?target.color, area = ?target.area, "color not found");
                            return Ok(Step::Missed);
                        }
                        Err(MacroError::Capture(msg)) => {
                            self.summary.misses += 1;
                            tracing::warn!(error = %msg, "capture failed, treating as a miss");
                            return Ok(Step::Missed);
                        }
                        Err(e) => return Err(e),
                    },
                };
                self.input.click(m.button, x, y)?;
                Ok(Step::Done)
            }
        }
    }

    // *************** Timing ***************

    /// Sleeps for `total` in granular steps. Time spent paused does not count,
    /// a skip request ends the wait early. Returns false once stopped.
    fn wait(&mut self, total: Duration) -> bool {
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            if !self.pause_gate() {
                break;
            }
            if self.control.take_skip() {
                tracing::debug!(skipped = ?(total - elapsed), "wait skipped");
                break;
            }
            let slice = self.options.granular_sleep.min(total - elapsed);
            thread::sleep(slice);
            elapsed += slice;
        }
        self.progress.elapsed += elapsed.as_secs_f64();
        !self.control.is_stopped()
    }

    /// Blocks while paused. Returns false once stopped.
    fn pause_gate(&mut self) -> bool {
        if self.control.is_paused() && !self.control.is_stopped() {
            self.progress.paused = true;
            self.emit();
            tracing::info!("playback paused");
            while self.control.is_paused() && !self.control.is_stopped() {
                thread::sleep(PAUSE_POLL);
            }
            self.progress.paused = false;
            self.emit();
            tracing::info!("playback resumed");
        }
        !self.control.is_stopped()
    }

    fn emit(&mut self) {
        if let Some(callback) = self.on_progress.as_mut() {
            callback(&self.progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ColorTarget, DelayJitter, KeyboardAction, MouseAction, MouseButton, Region, Rgb};
    use crate::capture::{Capture, crop_to_screen};
    use crate::correction::tests::{StaticScreen, screen_with_blobs};
    use crate::keys::KeyCode;
    use image::RgbaImage;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Click(MouseButton, i32, i32),
        Key(KeyCode),
    }

    #[derive(Default)]
    struct RecordingInput {
        calls: Vec<Call>,
    }

    impl InputSink for RecordingInput {
        fn click(&mut self, button: MouseButton, x: i32, y: i32) -> MacroResult<()> {
            self.calls.push(Call::Click(button, x, y));
            Ok(())
        }

        fn tap_key(&mut self, key: KeyCode) -> MacroResult<()> {
            self.calls.push(Call::Key(key));
            Ok(())
        }
    }

    /// Hands out one screen per capture, repeating the last.
    struct ScreenSequence {
        screens: Vec<RgbaImage>,
        next: usize,
    }

    impl ScreenSource for ScreenSequence {
        fn capture_region(&mut self, region: Region) -> MacroResult<Capture> {
            let i = self.next.min(self.screens.len() - 1);
            self.next += 1;
            crop_to_screen(&self.screens[i], region)
        }
    }

    const BLUE: Rgb = Rgb(0, 0, 255);

    fn fast_options() -> PlayerOptions {
        PlayerOptions {
            time_scale: 0.0,
            granular_sleep: Duration::from_millis(1),
            loop_until_stopped: false,
            max_retries: 2,
            iteration_gap: Duration::ZERO,
            start_paused: false,
        }
    }

    fn player_with<S: ScreenSource>(screen: S, options: PlayerOptions) -> Player<RecordingInput, S> {
        Player::new(
            RecordingInput::default(),
            ColorLocator::new(screen, 1),
            PlaybackControl::new(),
            options,
        )
        .with_seed(7)
    }

    fn blank_player(options: PlayerOptions) -> Player<RecordingInput, StaticScreen> {
        player_with(StaticScreen::new(screen_with_blobs(&[], BLUE)), options)
    }

    fn key(delay: f64, c: char) -> Action {
        Action::Keyboard(KeyboardAction {
            delay,
            key: KeyCode::Char(c),
            jitter: None,
        })
    }

    fn click(x: i32, y: i32) -> Action {
        Action::Mouse(MouseAction {
            delay: 0.1,
            button: MouseButton::Left,
            position: (x, y),
            color: None,
            jitter: None,
        })
    }

    fn color_click(x: i32, y: i32) -> Action {
        Action::Mouse(MouseAction {
            delay: 0.1,
            button: MouseButton::Right,
            position: (x, y),
            color: Some(ColorTarget {
                color: BLUE,
                area: Region::centered_on(x, y, 100, 100),
                tolerance: 5,
            }),
            jitter: None,
        })
    }

    #[test]
    fn test_plays_actions_in_order() {
        let mut player = blank_player(fast_options());
        let script = Script::new(vec![key(0.5, 'a'), click(10, 20), key(0.1, 'b')]);
        let summary = player.run_script("basic", &script, 2).unwrap();

        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.actions, 6);
        assert_eq!(
            player.input().calls[..3],
            [
                Call::Key(KeyCode::Char('a')),
                Call::Click(MouseButton::Left, 10, 20),
                Call::Key(KeyCode::Char('b')),
            ]
        );
    }

    #[test]
    fn test_color_click_goes_to_nearest_cluster() {
        let screen = screen_with_blobs(&[(60, 70, 2), (95, 95, 2)], BLUE);
        let mut player = player_with(StaticScreen::new(screen), fast_options());
        let script = Script::new(vec![color_click(55, 60)]);
        let summary = player.run_script("color", &script, 1).unwrap();

        assert_eq!(summary.corrections, 1);
        assert_eq!(player.input().calls, vec![Call::Click(MouseButton::Right, 60, 70)]);
    }

    #[test]
    fn test_repeated_miss_aborts_after_retries() {
        let mut player = blank_player(fast_options());
        let script = Script::new(vec![key(0.0, 'a'), color_click(50, 50), key(0.0, 'z')]);
        let summary = player.run_script("miss", &script, 3).unwrap();

        assert_eq!(summary.outcome, Outcome::Aborted);
        assert_eq!(summary.retries, 2);
        assert_eq!(summary.misses, 3);
        assert_eq!(summary.iterations, 0);
        // first action replayed once per attempt, the action after the miss never runs
        assert_eq!(player.input().calls, vec![Call::Key(KeyCode::Char('a')); 3]);
        assert!(player.control().is_stopped());
    }

    #[test]
    fn test_restart_recovers_when_color_appears() {
        let screens = vec![
            screen_with_blobs(&[], BLUE),
            screen_with_blobs(&[(52, 48, 1)], BLUE),
        ];
        let mut player = player_with(ScreenSequence { screens, next: 0 }, fast_options());
        let script = Script::new(vec![key(0.0, 'a'), color_click(50, 50)]);
        let summary = player.run_script("flaky", &script, 1).unwrap();

        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.retries, 1);
        assert_eq!(
            player.input().calls,
            vec![
                Call::Key(KeyCode::Char('a')),
                Call::Key(KeyCode::Char('a')),
                Call::Click(MouseButton::Right, 52, 48),
            ]
        );
    }

    #[test]
    fn test_failure_counter_resets_each_iteration() {
        // each iteration misses once then hits; with max_retries 1 a counter that
        // carried over would abort the second iteration
        let miss = screen_with_blobs(&[], BLUE);
        let hit = screen_with_blobs(&[(50, 50, 1)], BLUE);
        let screens = vec![miss.clone(), hit.clone(), miss, hit];
        let options = PlayerOptions {
            max_retries: 1,
            ..fast_options()
        };
        let mut player = player_with(ScreenSequence { screens, next: 0 }, options);
        let summary = player
            .run_script("two", &Script::new(vec![color_click(50, 50)]), 2)
            .unwrap();
        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.retries, 2);
        assert_eq!(summary.corrections, 2);
    }

    #[test]
    fn test_stop_before_start_does_nothing() {
        let mut player = blank_player(fast_options());
        player.control().stop();
        let summary = player.run_script("x", &Script::new(vec![key(0.0, 'a')]), 5).unwrap();
        assert_eq!(summary.outcome, Outcome::Stopped);
        assert!(player.input().calls.is_empty());
    }

    #[test]
    fn test_loop_until_stopped_via_progress_callback() {
        let options = PlayerOptions {
            loop_until_stopped: true,
            ..fast_options()
        };
        let control = PlaybackControl::new();
        let stopper = control.clone();
        let mut player = Player::new(
            RecordingInput::default(),
            ColorLocator::new(StaticScreen::new(screen_with_blobs(&[], BLUE)), 1),
            control,
            options,
        )
        .on_progress({
            let mut second_iterations = 0;
            Box::new(move |p: &Progress| {
                if p.iteration == 2 && p.action_index == 1 {
                    second_iterations += 1;
                    if second_iterations == 2 {
                        stopper.stop();
                    }
                }
            })
        });

        let summary = player.run_script("loop", &Script::new(vec![key(0.0, 'q')]), 2).unwrap();
        assert_eq!(summary.outcome, Outcome::Stopped);
        // the second iteration of the second pass stops before its key press
        assert_eq!(summary.iterations, 3);
        assert_eq!(player.input().calls.len(), 3);
    }

    #[test]
    fn test_skip_cuts_wait_short() {
        let options = PlayerOptions {
            time_scale: 1.0,
            ..fast_options()
        };
        let mut player = blank_player(options);
        player.control().skip_wait();
        let started = Instant::now();
        let summary = player.run_script("slow", &Script::new(vec![key(5.0, 'a')]), 1).unwrap();
        assert_eq!(summary.outcome, Outcome::Completed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_pause_blocks_until_resumed() {
        let options = PlayerOptions {
            start_paused: true,
            ..fast_options()
        };
        let mut player = blank_player(options);
        let control = player.control().clone();
        let paused_seen = Rc::new(RefCell::new(false));
        let seen = paused_seen.clone();
        player = player.on_progress(Box::new(move |p: &Progress| {
            if p.paused {
                *seen.borrow_mut() = true;
            }
        }));

        let resumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            control.resume();
        });
        let started = Instant::now();
        let summary = player.run_script("paused", &Script::new(vec![key(0.0, 'a')]), 1).unwrap();
        resumer.join().unwrap();

        assert_eq!(summary.outcome, Outcome::Completed);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(*paused_seen.borrow());
    }

    #[test]
    fn test_effective_delay_applies_scale_and_jitter() {
        let options = PlayerOptions {
            time_scale: 0.5,
            ..fast_options()
        };
        let mut player = blank_player(options);
        let plain = key(2.0, 'a');
        assert_eq!(player.effective_delay(&plain), 1.0);

        let jittered = Action::Keyboard(KeyboardAction {
            delay: 2.0,
            key: KeyCode::Char('a'),
            jitter: Some(DelayJitter { min: 1.0, max: 1.5 }),
        });
        for _ in 0..50 {
            let d = player.effective_delay(&jittered);
            assert!((1.0..=1.5).contains(&d), "delay {} out of range", d);
        }
    }

    #[test]
    fn test_delay_duration_saturates() {
        assert_eq!(delay_duration(1.5), Duration::from_millis(1500));
        assert_eq!(delay_duration(1e20), Duration::MAX);
        assert_eq!(delay_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(delay_duration(f64::NAN), Duration::ZERO);
        assert_eq!(delay_duration(-3.0), Duration::ZERO);
    }

    #[test]
    fn test_huge_delay_does_not_panic() {
        let options = PlayerOptions {
            time_scale: 1e10,
            ..fast_options()
        };
        let mut player = blank_player(options);
        player.control().skip_wait();
        let script = Script::new(vec![key(1e20, 'a')]);
        let summary = player.run_script("huge", &script, 1).unwrap();
        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(player.input().calls, vec![Call::Key(KeyCode::Char('a'))]);
    }

    #[test]
    fn test_off_screen_search_area_counts_as_miss() {
        let mut player = blank_player(fast_options());
        let off_screen = Action::Mouse(MouseAction {
            delay: 0.0,
            button: MouseButton::Left,
            position: (505, 505),
            color: Some(ColorTarget {
                color: BLUE,
                area: Region::new(500, 500, 10, 10),
                tolerance: 5,
            }),
            jitter: None,
        });
        let summary = player.run_script("gone", &Script::new(vec![off_screen]), 1).unwrap();

        assert_eq!(summary.outcome, Outcome::Aborted);
        assert_eq!(summary.misses, fast_options().max_retries + 1);
        assert_eq!(summary.retries, fast_options().max_retries);
        assert!(player.input().calls.is_empty());
    }

    #[test]
    fn test_program_runs_steps_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        store.save_script("first", &Script::new(vec![key(0.0, 'a')])).unwrap();
        store.save_script("second", &Script::new(vec![key(0.0, 'b')])).unwrap();
        let program = Program {
            steps: vec![
                "first:2".parse().unwrap(),
                "missing:5".parse().unwrap(),
                "second:1".parse().unwrap(),
            ],
            reset_script: None,
        };

        let mut player = blank_player(fast_options());
        let summary = player.run_program(&store, &program).unwrap();
        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.iterations, 3);
        assert_eq!(
            player.input().calls,
            vec![
                Call::Key(KeyCode::Char('a')),
                Call::Key(KeyCode::Char('a')),
                Call::Key(KeyCode::Char('b')),
            ]
        );
    }

    #[test]
    fn test_program_reset_script_runs_before_retry() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        store
            .save_script("work", &Script::new(vec![key(0.0, 'w'), color_click(50, 50)]))
            .unwrap();
        store.save_script("reset", &Script::new(vec![key(0.0, 'r')])).unwrap();
        let program = Program {
            steps: vec!["work:1".parse().unwrap()],
            reset_script: Some("reset".into()),
        };

        let options = PlayerOptions {
            max_retries: 1,
            ..fast_options()
        };
        let mut player = blank_player(options);
        let summary = player.run_program(&store, &program).unwrap();
        assert_eq!(summary.outcome, Outcome::Aborted);
        assert_eq!(
            player.input().calls,
            vec![
                Call::Key(KeyCode::Char('w')),
                Call::Key(KeyCode::Char('r')),
                Call::Key(KeyCode::Char('w')),
            ]
        );
    }

    #[test]
    fn test_empty_program_does_not_spin_when_looping() {
        let dir = TempDir::new().unwrap();
        let store = ScriptStore::open(dir.path()).unwrap();
        let program = Program {
            steps: vec!["ghost:1".parse().unwrap()],
            reset_script: None,
        };
        let options = PlayerOptions {
            loop_until_stopped: true,
            ..fast_options()
        };
        let mut player = blank_player(options);
        let summary = player.run_program(&store, &program).unwrap();
        assert_eq!(summary.outcome, Outcome::Completed);
        assert_eq!(summary.iterations, 0);
    }
}
