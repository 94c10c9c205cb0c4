mod action;
mod capture;
mod cluster;
mod commands;
mod config;
mod control;
mod correction;
mod error;
mod input;
mod keys;
mod pixel;
mod player;
mod recorder;
mod store;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command, value_parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::{SETTINGS_FILE, Settings};
use crate::store::ScriptStore;

fn playback_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("time-scale")
            .long("time-scale")
            .value_name("FACTOR")
            .help("Multiplier on recorded delays (0.5 plays twice as fast)")
            .value_parser(value_parser!(f64)),
    )
    .arg(
        Arg::new("loop")
            .long("loop")
            .help("Repeat until the stop key is pressed")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("start-paused")
            .long("start-paused")
            .help("Wait for the pause key before the first action")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("max-retries")
            .long("max-retries")
            .value_name("N")
            .help("Restarts after a failed color match before aborting")
            .value_parser(value_parser!(u32)),
    )
}

fn yes_arg() -> Arg {
    Arg::new("yes")
        .long("yes")
        .short('y')
        .help("Skip the confirmation prompt")
        .action(ArgAction::SetTrue)
}

fn build_cli() -> Command {
    Command::new("macro-replay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Record mouse/keyboard macros and replay them with color-guided clicks")
        .subcommand_required(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding settings.json, scripts/ and programs/")
                .default_value(".")
                .global(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("record")
                .about("Record a new script from global mouse and keyboard input")
                .arg(Arg::new("name").required(true))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite an existing script without asking")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(playback_args(
            Command::new("play")
                .about("Replay a single script")
                .arg(Arg::new("script").required(true))
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .short('n')
                        .default_value("1")
                        .value_parser(value_parser!(u32).range(1..)),
                ),
        ))
        .subcommand(playback_args(
            Command::new("run")
                .about("Run a program (a sequence of scripts)")
                .arg(Arg::new("program").required(true)),
        ))
        .subcommand(
            Command::new("list")
                .about("List saved scripts and programs")
                .arg(
                    Arg::new("what")
                        .default_value("all")
                        .value_parser(["all", "scripts", "programs"]),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print the actions of a script")
                .arg(Arg::new("script").required(true)),
        )
        .subcommand(
            Command::new("edit")
                .about("Edit one action of a script")
                .arg(Arg::new("script").required(true))
                .arg(
                    Arg::new("index")
                        .required(true)
                        .help("Zero-based action index (see `show`)")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("delay")
                        .long("delay")
                        .value_name("SECS")
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("color")
                        .long("color")
                        .value_name("R,G,B")
                        .help("Enable color correction with this target color")
                        .value_parser(commands::parse_rgb),
                )
                .arg(
                    Arg::new("area")
                        .long("area")
                        .value_name("WxH")
                        .help("Color search area size (defaults to the configured size)")
                        .value_parser(commands::parse_area),
                )
                .arg(
                    Arg::new("tolerance")
                        .long("tolerance")
                        .value_name("0-255")
                        .value_parser(value_parser!(u8)),
                )
                .arg(
                    Arg::new("no-color")
                        .long("no-color")
                        .help("Disable color correction")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("color"),
                )
                .arg(
                    Arg::new("jitter")
                        .long("jitter")
                        .value_name("MIN,MAX")
                        .help("Randomize the delay by a multiplier drawn from MIN..MAX")
                        .value_parser(commands::parse_jitter),
                )
                .arg(
                    Arg::new("no-jitter")
                        .long("no-jitter")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("jitter"),
                )
                .arg(
                    Arg::new("remove")
                        .long("remove")
                        .help("Delete the action")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("retime")
                .about("Multiply every delay of a script")
                .arg(Arg::new("script").required(true))
                .arg(Arg::new("factor").required(true).value_parser(value_parser!(f64))),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a script")
                .arg(Arg::new("script").required(true))
                .arg(yes_arg()),
        )
        .subcommand(
            Command::new("program")
                .about("Create and inspect programs")
                .subcommand_required(true)
                .subcommand(
                    Command::new("new")
                        .about("Create or replace a program from SCRIPT[:ITERATIONS] steps")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("steps")
                                .required(true)
                                .num_args(1..)
                                .value_parser(commands::parse_step),
                        )
                        .arg(
                            Arg::new("reset")
                                .long("reset")
                                .value_name("SCRIPT")
                                .help("Script replayed before retrying after a failed color match"),
                        ),
                )
                .subcommand(
                    Command::new("show")
                        .about("Print a program's steps")
                        .arg(Arg::new("name").required(true)),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a program")
                        .arg(Arg::new("name").required(true))
                        .arg(yes_arg()),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Show or change settings")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print current settings"))
                .subcommand(
                    Command::new("set")
                        .about("Change one setting")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                ),
        )
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let data_dir = matches
        .get_one::<PathBuf>("data-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let settings_path = data_dir.join(SETTINGS_FILE);
    let mut settings = Settings::load_or_create(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    let store = ScriptStore::open(&data_dir)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;

    match matches.subcommand() {
        Some(("record", sub)) => commands::record(&store, &settings, sub),
        Some(("play", sub)) => commands::play(&store, &settings, sub),
        Some(("run", sub)) => commands::run(&store, &settings, sub),
        Some(("list", sub)) => commands::list(&store, sub),
        Some(("show", sub)) => commands::show(&store, sub),
        Some(("edit", sub)) => commands::edit(&store, &settings, sub),
        Some(("retime", sub)) => commands::retime(&store, sub),
        Some(("delete", sub)) => commands::delete(&store, sub),
        Some(("program", sub)) => commands::program(&store, &settings, sub),
        Some(("config", sub)) => commands::config(&mut settings, &settings_path, sub),
        _ => unreachable!("subcommand_required is set"),
    }
}
