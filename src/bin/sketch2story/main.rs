//! Storyboard command line tool
//!
//! Edits boards stored in a data directory (same keys and JSON as the
//! browser page) and runs sketch-to-image conversion over HTTP.
//!
//! Usage:
//!   sketch2story --project pilot panel add
//!   sketch2story --project pilot convert <panel-id> --scene <scene-id> --details "close up"

mod commands;
mod progress;

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use env_logger::Env;

#[derive(Parser)]
#[command(
    name = "sketch2story",
    about = "Edit storyboards and convert sketches into generated frames",
    version
)]
struct Args {
    /// Data directory (or set SKETCH2STORY_DATA_DIR env var)
    #[arg(short = 'd', long, env = "SKETCH2STORY_DATA_DIR", default_value = ".sketch2story", global = true)]
    data_dir: PathBuf,

    /// Project id to operate on
    #[arg(short = 'p', long, default_value = "default", global = true)]
    project: String,

    /// Log progress at info level (RUST_LOG overrides)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the project list
    Project {
        #[command(subcommand)]
        action: ProjectCommand,
    },
    /// Edit the panels of the current project
    Panel {
        #[command(subcommand)]
        action: PanelCommand,
    },
    /// Edit the scenes of the current project
    Scene {
        #[command(subcommand)]
        action: SceneCommand,
    },
    /// Show or change API tokens and aspect ratio
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Resolve the insertion gap nearest a point on a recorded card layout
    Gap(GapArgs),
    /// Convert a sketch panel into a generated image
    Convert(ConvertArgs),
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// List projects, newest first
    List,
    /// Create a project
    New { name: Option<String> },
    /// Rename the current project
    Rename { title: String },
    /// Delete a project with its panels and scenes
    Delete {
        id: String,
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PanelCommand {
    /// List panels in order
    List,
    /// Append an empty sketch panel
    Add,
    /// Append an image panel from a PNG file
    Upload { png: PathBuf },
    /// Replace a sketch panel's drawing with a PNG file
    Draw { id: String, png: PathBuf },
    /// Insert an empty sketch panel at a position (0-based)
    Insert { index: usize },
    /// Remove a panel
    Remove {
        id: String,
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Move a panel to a position (0-based)
    Move { id: String, index: usize },
    /// Set a panel's title
    Title { id: String, text: String },
    /// Set a panel's notes
    Notes { id: String, text: String },
}

#[derive(Subcommand)]
enum SceneCommand {
    /// List scenes
    List,
    /// Add a scene
    Add {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove a scene
    Remove {
        id: String,
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print stored settings with tokens masked
    Show,
    /// Update stored settings; omitted fields are kept
    Set {
        #[arg(long)]
        rewrite_token: Option<String>,
        #[arg(long)]
        generation_token: Option<String>,
        /// One of 1:1, 2:3, 3:2, 3:4, 4:3, 4:5, 5:4, 9:16, 16:9
        #[arg(long)]
        aspect: Option<String>,
    },
}

#[derive(ClapArgs)]
struct GapArgs {
    /// JSON array of {id, left, top, width, height}
    #[arg(long)]
    layout: PathBuf,
    #[arg(long)]
    x: f64,
    #[arg(long)]
    y: f64,
    /// Insert a blank panel at the resolved gap
    #[arg(long)]
    insert: bool,
}

#[derive(ClapArgs)]
struct ConvertArgs {
    panel_id: String,

    /// Scene giving the frame its context
    #[arg(short = 's', long)]
    scene: Option<String>,

    /// Free-text direction for the frame
    #[arg(long, default_value = "")]
    details: String,

    /// Rewrite service token (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    rewrite_token: Option<String>,

    /// Generation service token (or set BRIA_API_TOKEN env var)
    #[arg(long, env = "BRIA_API_TOKEN", hide_env_values = true)]
    generation_token: Option<String>,

    #[arg(long)]
    rewrite_endpoint: Option<String>,

    #[arg(long)]
    rewrite_model: Option<String>,

    #[arg(long)]
    generation_endpoint: Option<String>,

    /// Delay before each status check
    #[arg(long, default_value_t = 1200)]
    poll_interval_ms: u64,

    #[arg(long, default_value_t = 25)]
    max_attempts: u32,

    /// Convert without a selected scene
    #[arg(long)]
    allow_no_scene: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(if args.verbose { "info" } else { "warn" }))
        .init();

    let mut store = sketch2story::DirStore::open(&args.data_dir)?;
    let project = args.project.as_str();

    match args.command {
        Command::Project { action } => commands::project(&mut store, project, action),
        Command::Panel { action } => commands::panel(store, project, action),
        Command::Scene { action } => commands::scene(store, project, action),
        Command::Settings { action } => commands::settings(&mut store, action),
        Command::Gap(gap) => commands::gap(store, project, gap),
        Command::Convert(convert) => commands::convert(store, project, convert).await,
    }
}
