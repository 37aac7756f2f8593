use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use stimscene_core::{
    AppConfig, Clock, Context, HeadlessWindow, RawInput, SceneConfig, ScriptedInput, TextStim,
    VirtualClock, Window,
};
use tracing_subscriber::EnvFilter;

fn main() -> stimscene_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output,
            trials,
            press,
            frame_rate,
        } => {
            let mut app_config = load_config(config.as_deref())?;
            if let Some(frame_rate) = frame_rate {
                app_config.display.frame_rate = frame_rate;
            }
            if output.is_some() {
                app_config.output = output;
            }
            run_block(&app_config, trials, &press)
        }
        Commands::CheckConfig { path } => {
            let config = AppConfig::load(&path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> stimscene_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading experiment config");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Runs `trials` rounds of fixation, probe and blank against the headless
/// toolkit. Responses come from `presses`, cycled per trial and timed from
/// probe onset.
fn run_block(
    config: &AppConfig,
    trials: usize,
    presses: &[Press],
) -> stimscene_core::Result<()> {
    tracing::info!(
        trials,
        frame_rate = config.display.frame_rate,
        "starting headless block"
    );

    let clock = VirtualClock::new();
    let window = Rc::new(RefCell::new(HeadlessWindow::new(
        clock.clone(),
        config.display.frame_rate,
    )));
    let input = Rc::new(RefCell::new(ScriptedInput::new(clock.clone())));
    let ctx = Context::new(window.clone(), input.clone(), clock.clone())
        .with_defaults(config.defaults.clone());
    let frame_period = window.borrow().frame_period();

    let mut fixation = ctx.fixation(None)?;
    let mut blank = ctx.blank(None)?;
    let text_height = config.defaults.text_height;
    let mut probe = ctx
        .scene(
            SceneConfig::new()
                .duration(2.0)
                .close_on_all(["key_f", "key_j"])
                .on("on_key_any", |scene| {
                    let count = scene.events().len();
                    scene.set("presses", count as i64);
                    Ok(())
                }),
        )?
        .bind(move |word: String| Ok(TextStim::new(word).with_height(text_height)));

    for trial in 0..trials {
        fixation.show(())?;
        if let Some(press) = presses.get(trial % presses.len().max(1)) {
            // the probe's first flip lands one frame from now
            let onset = clock.now() + frame_period;
            input
                .borrow_mut()
                .push(RawInput::key(press.key.as_str(), onset + press.delay));
        }
        probe.set("trial", trial as i64 + 1).set("presses", 0);
        let word = if trial % 2 == 0 { "LEFT" } else { "RIGHT" };
        probe.show(word.to_string())?;
        blank.show(())?;

        let responded = !probe.events()?.is_empty();
        tracing::info!(trial = trial + 1, responded, "trial complete");
        ctx.add_row_from(&probe)?;
    }

    tracing::info!(frames = window.borrow().flip_count(), "block finished");

    match &config.output {
        Some(path) => ctx.save(path),
        None => {
            println!("{}", ctx.data().borrow().to_json_string()?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// A scripted key press, `KEY@SECONDS` after probe onset.
#[derive(Debug, Clone, PartialEq)]
struct Press {
    key: String,
    delay: f64,
}

fn parse_press(arg: &str) -> Result<Press, String> {
    let (key, delay) = arg
        .split_once('@')
        .ok_or_else(|| format!("expected KEY@SECONDS, got `{arg}`"))?;
    let delay: f64 = delay
        .trim()
        .parse()
        .map_err(|_| format!("`{delay}` is not a number of seconds"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("key name must not be empty".to_string());
    }
    if !delay.is_finite() || delay < 0.0 {
        return Err(format!("delay must be non-negative, got {delay}"));
    }
    Ok(Press {
        key: key.to_string(),
        delay,
    })
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run declarative psychology-experiment scenes",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a fixation / probe / blank block on the headless toolkit.
    Run {
        /// JSON experiment configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Data file to write (`.csv` or `.json`); prints JSON when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of trials to run.
        #[arg(short, long, default_value_t = 4)]
        trials: usize,
        /// Scripted response such as `f@0.4`; repeat to vary across trials.
        #[arg(short, long, value_parser = parse_press)]
        press: Vec<Press>,
        /// Override the display refresh rate in Hz.
        #[arg(long)]
        frame_rate: Option<f64>,
    },
    /// Parse a configuration file and print the effective settings.
    CheckConfig {
        /// Path to the JSON configuration.
        path: PathBuf,
    },
}
