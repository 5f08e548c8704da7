//! Subcommand handlers

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;
use sketch2story::board::model::png_data_url;
use sketch2story::board::{CardRect, Point, Rect};
use sketch2story::convert::{PollConfig, ReqwestTransport};
use sketch2story::{
    Board, ConversionPipeline, ConversionRequest, Credentials, DirStore, ProjectRegistry, SceneDraft,
    ServiceConfig, StoreExt, StoryError,
};

use crate::progress::Spinner;
use crate::{ConvertArgs, GapArgs, PanelCommand, ProjectCommand, SceneCommand, SettingsCommand};

/// Asks on stdin unless `yes` was given.
fn confirm(prompt: &str, yes: bool) -> bool {
    if yes {
        return true;
    }
    print!("{prompt} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn read_png(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(png_data_url(&bytes))
}

fn mask(token: &str) -> String {
    match token.trim() {
        "" => "(not set)".to_string(),
        t if t.chars().count() <= 8 => "****".to_string(),
        t => format!("{}****", t.chars().take(4).collect::<String>()),
    }
}

fn print_panels(board: &Board<DirStore>) {
    if board.panels().is_empty() {
        println!("No panels.");
        return;
    }
    for (panel, position) in board.panels().iter().zip(board.positions()) {
        let title = if panel.title.trim().is_empty() {
            "(untitled)"
        } else {
            panel.title.as_str()
        };
        let content = match (panel.mode, panel.has_sketch_content()) {
            (sketch2story::PanelMode::Image, _) => "image",
            (_, true) => "sketch",
            (_, false) => "empty",
        };
        println!("{:<9} {}  [{content}]  {title}", position.label(), panel.id);
    }
}

// =============================================================================
// PROJECTS
// =============================================================================

pub fn project(store: &mut DirStore, current: &str, action: ProjectCommand) -> anyhow::Result<()> {
    match action {
        ProjectCommand::List => {
            let projects = ProjectRegistry::new(store).list()?;
            if projects.is_empty() {
                println!("No projects.");
            }
            for p in projects {
                let created = chrono::DateTime::from_timestamp_millis(p.created_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{}  {:<16}  {}", p.id, created, p.title);
            }
        }
        ProjectCommand::New { name } => {
            if !store.load_settings()?.has_credentials() {
                bail!("Both API tokens are required before creating a project. Use `settings set` first.");
            }
            let project = ProjectRegistry::new(store).create(name.as_deref())?;
            println!("Created {} ({})", project.id, project.title);
        }
        ProjectCommand::Rename { title } => {
            let project = ProjectRegistry::new(store).rename(current, &title)?;
            println!("Renamed {} to {}", project.id, project.title);
        }
        ProjectCommand::Delete { id, yes } => {
            let project = ProjectRegistry::new(store).require(&id)?;
            if !confirm(
                &format!("Delete \"{}\" and all of its panels and scenes?", project.title),
                yes,
            ) {
                println!("Cancelled.");
                return Ok(());
            }
            ProjectRegistry::new(store).delete(&id)?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

// =============================================================================
// PANELS
// =============================================================================

pub fn panel(store: DirStore, project: &str, action: PanelCommand) -> anyhow::Result<()> {
    let mut board = Board::open(store, project).context("Failed to open project")?;

    match action {
        PanelCommand::List => {}
        PanelCommand::Add => {
            let panel = board.add_panel()?;
            println!("Added {}", panel.id);
        }
        PanelCommand::Upload { png } => {
            let panel = board.upload_image(read_png(&png)?)?;
            println!("Added image panel {}", panel.id);
        }
        PanelCommand::Draw { id, png } => {
            board.set_panel_drawing(&id, read_png(&png)?)?;
        }
        PanelCommand::Insert { index } => {
            let panel = board.insert_blank_at(index)?;
            println!("Inserted {}", panel.id);
        }
        PanelCommand::Remove { id, yes } => match board.remove_panel(&id, |prompt| confirm(prompt, yes))? {
            Some(_) => println!("Removed {id}"),
            None => println!("Cancelled."),
        },
        PanelCommand::Move { id, index } => {
            let index = board.move_panel(&id, index)?;
            println!("Moved {id} to position {}", index + 1);
        }
        PanelCommand::Title { id, text } => board.set_panel_title(&id, text)?,
        PanelCommand::Notes { id, text } => board.set_panel_notes(&id, text)?,
    }

    print_panels(&board);
    Ok(())
}

// =============================================================================
// SCENES
// =============================================================================

pub fn scene(store: DirStore, project: &str, action: SceneCommand) -> anyhow::Result<()> {
    let mut board = Board::open(store, project).context("Failed to open project")?;

    match action {
        SceneCommand::List => {}
        SceneCommand::Add { title, description } => {
            let scene = board.add_scene(SceneDraft::new(title, description));
            println!("Added {}", scene.id);
        }
        SceneCommand::Remove { id, yes } => match board.remove_scene(&id, |prompt| confirm(prompt, yes))? {
            Some(_) => println!("Removed {id}"),
            None => println!("Cancelled."),
        },
    }

    for scene in board.scenes().list() {
        println!("{}  {}  {}", scene.id, scene.display_title(), scene.description);
    }
    Ok(())
}

// =============================================================================
// SETTINGS
// =============================================================================

pub fn settings(store: &mut DirStore, action: SettingsCommand) -> anyhow::Result<()> {
    let mut settings = store.load_settings()?;

    if let SettingsCommand::Set {
        rewrite_token,
        generation_token,
        aspect,
    } = action
    {
        if let Some(token) = rewrite_token {
            settings.rewrite_token = token;
        }
        if let Some(token) = generation_token {
            settings.generation_token = token;
        }
        if let Some(aspect) = aspect {
            settings.aspect = aspect.parse()?;
        }
        store.save_settings(&settings).context("Failed to save settings")?;
    }

    println!("rewrite token:    {}", mask(&settings.rewrite_token));
    println!("generation token: {}", mask(&settings.generation_token));
    println!("aspect ratio:     {}", settings.aspect);
    Ok(())
}

// =============================================================================
// GAP
// =============================================================================

#[derive(Deserialize)]
struct CardBox {
    id: String,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

pub fn gap(store: DirStore, project: &str, args: GapArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.layout)
        .with_context(|| format!("Failed to read {}", args.layout.display()))?;
    let boxes: Vec<CardBox> = serde_json::from_str(&raw).context("Layout must be a JSON array of card boxes")?;
    let cards: Vec<CardRect> = boxes
        .into_iter()
        .map(|b| CardRect::new(b.id, Rect::new(b.left, b.top, b.width, b.height)))
        .collect();

    let mut board = Board::open(store, project)?;
    let Some(gap) = board.resolve_gap(&cards, Point::new(args.x, args.y)) else {
        println!("No gap within reach of ({}, {})", args.x, args.y);
        return Ok(());
    };
    println!(
        "Gap at index {} centered on ({:.1}, {:.1})",
        gap.index, gap.center.x, gap.center.y
    );

    if args.insert {
        let panel = board.insert_at_gap(&gap)?;
        println!("Inserted {}", panel.id);
    }
    Ok(())
}

// =============================================================================
// CONVERT
// =============================================================================

pub async fn convert(store: DirStore, project: &str, args: ConvertArgs) -> anyhow::Result<()> {
    let mut config = ServiceConfig::default()
        .with_poll(PollConfig::new(
            Duration::from_millis(args.poll_interval_ms),
            args.max_attempts,
        ))
        .with_require_scene(!args.allow_no_scene);
    if let Some(endpoint) = args.rewrite_endpoint {
        config = config.with_rewrite_endpoint(endpoint);
    }
    if let Some(model) = args.rewrite_model {
        config = config.with_rewrite_model(model);
    }
    if let Some(endpoint) = args.generation_endpoint {
        config = config.with_generation_endpoint(endpoint);
    }

    let mut board = Board::open(store, project).context("Failed to open project")?;
    let mut request = ConversionRequest::new(&args.panel_id)
        .with_details(args.details)
        .with_credentials(Credentials {
            rewrite: args.rewrite_token,
            generation: args.generation_token,
        });
    request.scene_id = args.scene;

    let spinner = Spinner::start();
    let pipeline = ConversionPipeline::new(ReqwestTransport::new(), config).with_progress(spinner.clone());
    let result = board.convert_panel(&pipeline, &request).await;
    spinner.finish();

    let report = match result {
        Ok(report) => report,
        Err(StoryError::Convert(e)) if e.is_precondition() => {
            bail!("Cannot convert panel {}: {e}. Nothing was sent.", args.panel_id)
        }
        Err(e) => return Err(e).with_context(|| format!("Conversion of panel {} failed", args.panel_id)),
    };
    println!("Rewritten prompt:\n  {}\n", report.rewritten_prompt);
    println!("Image: {}", report.image_url);
    if report.poll_attempts > 0 {
        println!("Ready after {} status check(s)", report.poll_attempts);
    }
    log::info!("final response: {}", report.raw_response);
    Ok(())
}
