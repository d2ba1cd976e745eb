mod config;
mod dice;
mod error;
mod session;
mod story;
mod terminal;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use config::PlayerConfig;
use dice::{FixedRolls, RngRolls};
use session::Session;
use story::{SceneGraph, SceneId};

/// Play branching d20 adventures in the terminal.
///
/// Logging: set RUST_LOG=info to follow scene transitions, RUST_LOG=debug to
/// see every roll.
#[derive(Parser)]
#[command(name = "dicetale", version)]
struct Cli {
    /// Story file (.yaml, .yml or .json). Plays the bundled adventure when omitted.
    story: Option<PathBuf>,

    /// Start at this scene instead of the story's own start scene.
    #[arg(long)]
    start: Option<u32>,

    /// Seed the dice for a reproducible session.
    #[arg(long, conflicts_with = "rolls")]
    seed: Option<u64>,

    /// Use these rolls, in order, instead of random ones (e.g. --rolls 12,3,20).
    #[arg(long, value_delimiter = ',')]
    rolls: Vec<u32>,

    /// Skip the pauses around dice rolls.
    #[arg(long)]
    fast: bool,

    /// Do not show scene images.
    #[arg(long)]
    no_images: bool,

    /// Validate the story, print a summary and exit.
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn config(&self) -> PlayerConfig {
        let config = PlayerConfig {
            start: self.start.map(SceneId),
            seed: self.seed,
            show_images: !self.no_images,
            ..PlayerConfig::default()
        };
        if self.fast {
            config.fast()
        } else {
            config
        }
    }

    fn load_story(&self) -> Result<SceneGraph> {
        match &self.story {
            Some(path) => SceneGraph::load(path)
                .with_context(|| format!("failed to load story {}", path.display())),
            None => story::builtin().context("bundled adventure is invalid"),
        }
    }
}

fn print_summary(graph: &SceneGraph) {
    println!("Story:   {}", graph.title());
    println!("  Scenes : {}", graph.len());
    println!("  Start  : {}", graph.start());
    println!("  Checks : {}", graph.check_count());
    println!("  Endings: {}", graph.ending_count());

    let unreachable = graph.unreachable();
    if unreachable.is_empty() {
        println!("  Every scene is reachable.");
    } else {
        let ids: Vec<String> = unreachable.iter().map(ToString::to_string).collect();
        println!("  Unreachable scenes: {}", ids.join(", "));
    }
}

fn main() -> Result<()> {
    // Initialize logging. Logs go to stderr; the default keeps the game
    // screen clean:
    //   RUST_LOG=info   dicetale story.yaml   # transitions and endings
    //   RUST_LOG=debug  dicetale story.yaml   # + rolls and rendering
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    let mut graph = cli.load_story()?;
    if let Some(start) = config.start {
        graph = graph
            .with_start(start)
            .with_context(|| format!("cannot start at scene {start}"))?;
    }

    if cli.check {
        print_summary(&graph);
        return Ok(());
    }

    let mut session = Session::new(Arc::new(graph));
    let mut input = io::stdin().lock();
    let mut output = io::stdout().lock();

    let summary = if cli.rolls.is_empty() {
        let mut dice = match config.seed {
            Some(seed) => RngRolls::seeded(seed),
            None => RngRolls::from_entropy(),
        };
        terminal::play(&mut session, &mut dice, &mut input, &mut output, &config)?
    } else {
        let mut dice = FixedRolls::new(cli.rolls.clone());
        let summary = terminal::play(&mut session, &mut dice, &mut input, &mut output, &config)?;
        debug!("{} scripted rolls left unused", dice.remaining());
        summary
    };

    info!(
        "Session over: {} endings, {} rolls, {} restarts",
        summary.endings.len(),
        summary.rolls.len(),
        summary.restarts
    );
    println!("\nThanks for playing!");

    Ok(())
}
