//! Subcommand handlers.
//! Each takes the parsed `ArgMatches` of its subcommand; user-facing output goes
//! to stdout, diagnostics through `tracing`.

use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use dialoguer::Confirm;
use std::path::Path;

use crate::action::{Action, DEFAULT_TOLERANCE, DelayJitter, Rgb};
use crate::capture::MonitorSource;
use crate::config::Settings;
use crate::control::{Hotkeys, PlaybackControl, spawn_hotkey_listener};
use crate::correction::ColorLocator;
use crate::input::EnigoSink;
use crate::player::{Outcome, PlaybackSummary, Player, PlayerOptions, Progress};
use crate::recorder::{RecorderOptions, record_live};
use crate::store::{Program, ProgramStep, ScriptStore, with_json_suffix};

// *************** Argument parsers ***************

pub fn parse_rgb(s: &str) -> Result<Rgb, String> {
    s.parse().map_err(|e: crate::error::MacroError| e.to_string())
}

/// "WxH", e.g. "300x500".
pub fn parse_area(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("area must be WxH, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    if w == 0 || h == 0 {
        return Err("area must be non-empty".to_string());
    }
    Ok((w, h))
}

/// "MIN,MAX" delay multipliers.
pub fn parse_jitter(s: &str) -> Result<DelayJitter, String> {
    let (min, max) = s
        .split_once(',')
        .ok_or_else(|| format!("jitter must be MIN,MAX, got '{}'", s))?;
    let jitter = DelayJitter {
        min: min.trim().parse().map_err(|_| format!("invalid jitter min '{}'", min))?,
        max: max.trim().parse().map_err(|_| format!("invalid jitter max '{}'", max))?,
    };
    jitter.validate().map_err(|e| e.to_string())?;
    Ok(jitter)
}

pub fn parse_step(s: &str) -> Result<ProgramStep, String> {
    s.parse().map_err(|e: crate::error::MacroError| e.to_string())
}

fn display_name(file: &str) -> &str {
    file.strip_suffix(".json").unwrap_or(file)
}

fn confirm(prompt: String, skip: bool) -> Result<bool> {
    if skip {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

// *************** Recording ***************

pub fn record(store: &ScriptStore, settings: &Settings, sub: &ArgMatches) -> Result<()> {
    let name = required(sub, "name")?;
    if store.script_exists(name)
        && !confirm(format!("Script '{}' exists. Overwrite?", name), sub.get_flag("force"))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let options = RecorderOptions::from_settings(settings);
    println!(
        "Recording '{}'. Press {} before a click to capture its color, {} to finish.",
        name, options.color_toggle_key, options.stop_key
    );
    let script = record_live(options, &mut MonitorSource).context("Recording failed")?;
    if script.is_empty() {
        println!("Nothing recorded; script not saved.");
        return Ok(());
    }
    let path = store
        .save_script(name, &script)
        .with_context(|| format!("Failed to save script '{}'", name))?;
    println!(
        "Saved {} actions ({:.1}s) to {}",
        script.len(),
        script.total_delay(),
        path.display()
    );
    Ok(())
}

// *************** Playback ***************

fn player_options(settings: &Settings, sub: &ArgMatches) -> Result<PlayerOptions> {
    let mut options = PlayerOptions::from_settings(settings);
    if let Some(&scale) = sub.get_one::<f64>("time-scale") {
        if !scale.is_finite() || scale < 0.0 {
            bail!("--time-scale must be a non-negative number, got {}", scale);
        }
        options.time_scale = scale;
    }
    if let Some(&retries) = sub.get_one::<u32>("max-retries") {
        options.max_retries = retries;
    }
    options.loop_until_stopped |= sub.get_flag("loop");
    options.start_paused |= sub.get_flag("start-paused");
    Ok(options)
}

fn log_progress() -> Box<dyn FnMut(&Progress)> {
    let mut was_paused = false;
    Box::new(move |p: &Progress| {
        if p.paused != was_paused {
            was_paused = p.paused;
            if p.paused {
                tracing::info!(script = %p.script_name, "paused");
            } else {
                tracing::info!(script = %p.script_name, "resumed");
            }
        }
        tracing::debug!(
            script = %p.script_name,
            iteration = p.iteration,
            of = p.total_iterations,
            action = p.action_index,
            actions = p.action_total,
            delay = p.action_delay,
            elapsed = %format!("{:.1}/{:.1}s", p.elapsed, p.total_duration),
            "next action"
        );
    })
}

fn start_player(settings: &Settings, options: PlayerOptions) -> Result<Player<EnigoSink, MonitorSource>> {
    let input = EnigoSink::new(settings.action_settle()).context("Failed to initialize input injection")?;
    let locator = ColorLocator::new(MonitorSource, settings.min_cluster_size);
    let control = PlaybackControl::new();
    let hotkeys = Hotkeys {
        pause: settings.pause_key,
        stop: settings.stop_key,
        skip: settings.skip_key,
    };
    spawn_hotkey_listener(hotkeys, control.clone());
    println!(
        "Hotkeys: {} pause/resume, {} stop, {} skip wait",
        hotkeys.pause, hotkeys.stop, hotkeys.skip
    );
    if options.start_paused {
        println!("Starting paused; press {} to begin.", hotkeys.pause);
    }
    Ok(Player::new(input, locator, control, options).on_progress(log_progress()))
}

fn report(summary: &PlaybackSummary) -> Result<()> {
    println!(
        "{:?}: {} iterations, {} actions, {} color corrections, {} misses, {} retries",
        summary.outcome,
        summary.iterations,
        summary.actions,
        summary.corrections,
        summary.misses,
        summary.retries
    );
    if summary.outcome == Outcome::Aborted {
        bail!("playback aborted: color target not found after {} retries", summary.retries);
    }
    Ok(())
}

pub fn play(store: &ScriptStore, settings: &Settings, sub: &ArgMatches) -> Result<()> {
    let name = required(sub, "script")?;
    let iterations = sub.get_one::<u32>("iterations").copied().unwrap_or(1);
    let script = store
        .load_script(name)
        .with_context(|| format!("Failed to load script '{}'", name))?;
    let options = player_options(settings, sub)?;
    tracing::info!(
        script = name,
        actions = script.len(),
        iterations,
        time_scale = options.time_scale,
        "starting playback"
    );
    let mut player = start_player(settings, options)?;
    let summary = player
        .run_script(&with_json_suffix(name), &script, iterations)
        .context("Playback failed")?;
    report(&summary)
}

pub fn run(store: &ScriptStore, settings: &Settings, sub: &ArgMatches) -> Result<()> {
    let name = required(sub, "program")?;
    let program = store
        .load_program(name)
        .with_context(|| format!("Failed to load program '{}'", name))?;
    let options = player_options(settings, sub)?;
    println!(
        "Running '{}': {} steps, about {:.1}s",
        name,
        program.steps.len(),
        store.estimated_duration(&program, options.time_scale)
    );
    let mut player = start_player(settings, options)?;
    let summary = player.run_program(store, &program).context("Program failed")?;
    report(&summary)
}

// *************** Scripts ***************

pub fn list(store: &ScriptStore, sub: &ArgMatches) -> Result<()> {
    let what = sub.get_one::<String>("what").map(String::as_str).unwrap_or("all");
    if what != "programs" {
        println!("Scripts:");
        for name in store.list_scripts().context("Failed to list scripts")? {
            println!("  {}", display_name(&name));
        }
    }
    if what != "scripts" {
        println!("Programs:");
        for name in store.list_programs().context("Failed to list programs")? {
            println!("  {}", display_name(&name));
        }
    }
    Ok(())
}

pub fn show(store: &ScriptStore, sub: &ArgMatches) -> Result<()> {
    let name = required(sub, "script")?;
    let script = store
        .load_script(name)
        .with_context(|| format!("Failed to load script '{}'", name))?;
    println!("{}: {} actions, {:.2}s", name, script.len(), script.total_delay());
    for (i, action) in script.actions.iter().enumerate() {
        let jitter = match action.jitter() {
            Some(j) => format!(" (x{}..{})", j.min, j.max),
            None => String::new(),
        };
        println!("{:>4}  +{:>7.3}s{}  {}", i, action.delay(), jitter, action.describe());
    }
    Ok(())
}

pub fn edit(store: &ScriptStore, settings: &Settings, sub: &ArgMatches) -> Result<()> {
    let name = required(sub, "script")?;
    let index = *sub
        .get_one::<usize>("index")
        .ok_or_else(|| anyhow!("missing action index"))?;
    let mut script = store
        .load_script(name)
        .with_context(|| format!("Failed to load script '{}'", name))?;

    if sub.get_flag("remove") {
        let removed = script.remove(index)?;
        store.save_script(name, &script)?;
        println!("Removed action {}: {}", index, removed.describe());
        return Ok(());
    }

    let mut changed = false;
    if let Some(&delay) = sub.get_one::<f64>("delay") {
        script.set_delay(index, delay)?;
        changed = true;
    }

    let color = sub.get_one::<Rgb>("color").copied();
    let area = sub.get_one::<(u32, u32)>("area").copied();
    let tolerance = sub.get_one::<u8>("tolerance").copied();
    if sub.get_flag("no-color") {
        script.clear_color(index)?;
        changed = true;
    } else if color.is_some() || area.is_some() || tolerance.is_some() {
        let existing = match script.actions.get(index) {
            Some(Action::Mouse(m)) => m.color,
            _ => None,
        };
        let color = color
            .or(existing.map(|t| t.color))
            .ok_or_else(|| anyhow!("action {} has no color target yet; pass --color R,G,B", index))?;
        let (width, height) = area
            .or(existing.map(|t| (t.area.width, t.area.height)))
            .unwrap_or((settings.color_area_width, settings.color_area_height));
        let tolerance = tolerance
            .or(existing.map(|t| t.tolerance))
            .unwrap_or(DEFAULT_TOLERANCE);
        script.set_color(index, color, width, height, tolerance)?;
        changed = true;
    }

    if let Some(&jitter) = sub.get_one::<DelayJitter>("jitter") {
        script.set_jitter(index, Some(jitter))?;
        changed = true;
    } else if sub.get_flag("no-jitter") {
        script.set_jitter(index, None)?;
        changed = true;
    }

    if !changed {
        bail!("nothing to change; see `edit --help`");
    }
    store
        .save_script(name, &script)
        .with_context(|| format!("Failed to save script '{}'", name))?;
    println!("{:>4}  +{:.3}s  {}", index, script.actions[index].delay(), script.actions[index].describe());
    Ok(())
}

pub fn retime(store: &ScriptStore, sub: &ArgMatches) -> Result<()> {
    let name = required(sub, "script")?;
    let factor = *sub
        .get_one::<f64>("factor")
        .ok_or_else(|| anyhow!("missing factor"))?;
    let mut script = store
        .load_script(name)
        .with_context(|| format!("Failed to load script '{}'", name))?;
    let before = script.total_delay();
    script.scale_delays(factor)?;
    store.save_script(name, &script)?;
    println!("{}: {:.2}s -> {:.2}s", name, before, script.total_delay());
    Ok(())
}

pub fn delete(store: &ScriptStore, sub: &ArgMatches) -> Result<()> {
    let name = required(sub, "script")?;
    if !store.script_exists(name) {
        bail!("script '{}' not found", name);
    }
    if !confirm(format!("Delete script '{}'?", name), sub.get_flag("yes"))? {
        println!("Cancelled.");
        return Ok(());
    }
    store.delete_script(name)?;
    println!("Deleted script '{}'", name);
    Ok(())
}

// *************** Programs ***************

pub fn program(store: &ScriptStore, settings: &Settings, sub: &ArgMatches) -> Result<()> {
    match sub.subcommand() {
        Some(("new", m)) => {
            let name = required(m, "name")?;
            let steps: Vec<ProgramStep> = m
                .get_many::<ProgramStep>("steps")
                .map(|steps| steps.cloned().collect())
                .unwrap_or_default();
            let program = Program {
                steps,
                reset_script: m.get_one::<String>("reset").map(|s| with_json_suffix(s)),
            };
            let referenced = program.steps.iter().map(|s| &s.script).chain(program.reset_script.as_ref());
            for script in referenced {
                if !store.script_exists(script) {
                    tracing::warn!(script = %script, "program refers to a script that does not exist yet");
                }
            }
            let path = store
                .save_program(name, &program)
                .with_context(|| format!("Failed to save program '{}'", name))?;
            println!("Saved program with {} steps to {}", program.steps.len(), path.display());
            Ok(())
        }
        Some(("show", m)) => {
            let name = required(m, "name")?;
            let program = store
                .load_program(name)
                .with_context(|| format!("Failed to load program '{}'", name))?;
            println!(
                "{}: about {:.1}s at time scale {}",
                name,
                store.estimated_duration(&program, settings.time_scale),
                settings.time_scale
            );
            for (i, step) in program.steps.iter().enumerate() {
                println!("{:>4}  {} x{}", i, display_name(&step.script), step.iterations);
            }
            if let Some(reset) = &program.reset_script {
                println!("reset: {}", display_name(reset));
            }
            Ok(())
        }
        Some(("delete", m)) => {
            let name = required(m, "name")?;
            if !confirm(format!("Delete program '{}'?", name), m.get_flag("yes"))? {
                println!("Cancelled.");
                return Ok(());
            }
            store.delete_program(name)?;
            println!("Deleted program '{}'", name);
            Ok(())
        }
        _ => unreachable!("subcommand_required is set"),
    }
}

// *************** Settings ***************

pub fn config(settings: &mut Settings, path: &Path, sub: &ArgMatches) -> Result<()> {
    match sub.subcommand() {
        Some(("show", _)) => {
            let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
            println!("{}", json);
            Ok(())
        }
        Some(("set", m)) => {
            let key = required(m, "key")?;
            let value = required(m, "value")?;
            settings.set(key, value)?;
            settings
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} = {}", key, value);
            Ok(())
        }
        _ => unreachable!("subcommand_required is set"),
    }
}

fn required<'a>(m: &'a ArgMatches, id: &str) -> Result<&'a str> {
    m.get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing <{}>", id))
}
