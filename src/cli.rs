use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Args, Parser, Subcommand};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use oxedit::{Action, Bounds, Diagram, EditorConfig, Point, Route, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Parser)]
#[command(
    name = "oxedit",
    about = "Inspect diagram documents and replay editor actions against them."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print resolved port rectangles and link routes as JSON.
    Geometry(GeometryArgs),
    /// Replay a JSON list of editor actions and write the resulting diagram.
    Replay(ReplayArgs),
    /// Check that a diagram document is consistent.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Path to the diagram JSON. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Editor configuration JSON (grid size, snap tolerance, tip size, ...).
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Args)]
struct GeometryArgs {
    #[command(flatten)]
    common: InputArgs,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    #[command(flatten)]
    common: InputArgs,

    /// JSON array of actions to feed through an editor session.
    #[arg(short = 's', long = "script")]
    script: PathBuf,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[command(flatten)]
    common: InputArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkGeometry {
    #[serde(flatten)]
    route: Route,
    label_anchor: Point,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_marker: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeometryReport {
    diagram: String,
    ports: IndexMap<String, Bounds>,
    links: IndexMap<String, LinkGeometry>,
}

pub fn dispatch() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Geometry(args) => run_geometry(args),
        Command::Replay(args) => run_replay(args),
        Command::Validate(args) => run_validate(args),
    }
}

fn run_geometry(args: GeometryArgs) -> Result<()> {
    let config = load_config(args.common.config.as_deref())?;
    let source = parse_input(args.common.input.as_deref())?;
    let diagram = load_diagram(&source)?;

    let mut ports = IndexMap::with_capacity(diagram.ports.len());
    for id in diagram.ports.keys() {
        let bounds = diagram
            .port_bounds_of(id)
            .with_context(|| format!("failed to place port '{id}'"))?;
        ports.insert(id.clone(), bounds);
    }

    let mut links = IndexMap::with_capacity(diagram.links.len());
    for (id, link) in &diagram.links {
        let route = oxedit::route_link(&diagram, id, &config)
            .with_context(|| format!("failed to route link '{id}'"))?;
        let source_marker = route
            .source_marker(link.style.source_tip, config.tip_size)
            .map(|shape| shape.path());
        let target_marker = route
            .target_marker(link.style.target_tip, config.tip_size)
            .map(|shape| shape.path());
        links.insert(
            id.clone(),
            LinkGeometry {
                label_anchor: route.label_anchor(),
                route,
                source_marker,
                target_marker,
            },
        );
    }

    let report = GeometryReport {
        diagram: diagram.id.clone(),
        ports,
        links,
    };
    let json = serde_json::to_string_pretty(&report)?;
    let dest = parse_output(args.output.as_deref());
    write_output(dest, json.as_bytes(), args.common.quiet, "geometry")
}

fn run_replay(args: ReplayArgs) -> Result<()> {
    let config = load_config(args.common.config.as_deref())?;
    let source = parse_input(args.common.input.as_deref())?;
    let diagram = load_diagram(&source)?;

    let script = fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read '{}'", args.script.display()))?;
    let actions: Vec<Action> = serde_json::from_str(&script)
        .with_context(|| format!("failed to parse actions in '{}'", args.script.display()))?;

    let mut session = Session::new(config);
    let id = session.open(diagram).context("diagram is not valid")?;
    for (index, action) in actions.into_iter().enumerate() {
        session
            .dispatch(&id, action)
            .with_context(|| format!("action #{} failed", index + 1))?;
    }

    let entries = session.history().past_len();
    let state = session.state(&id).name();
    let result = session.close(&id)?;
    let json = result.to_json()?;
    let dest = parse_output(args.output.as_deref());
    write_output(dest, json.as_bytes(), args.common.quiet, "diagram")?;

    if !args.common.quiet {
        eprintln!("{entries} undoable step(s), session ended {state}");
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    let source = parse_input(args.common.input.as_deref())?;
    let diagram = load_diagram(&source)?;
    if !args.common.quiet {
        println!(
            "{} diagram '{}' is valid: {} nodes, {} ports, {} links, {} notes",
            diagram.kind.as_str(),
            diagram.name,
            diagram.nodes.len(),
            diagram.ports.len(),
            diagram.links.len(),
            diagram.notes.len()
        );
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    match path {
        Some(path) => EditorConfig::from_path(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => Ok(EditorConfig::default()),
    }
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        Some("-") => Ok(InputSource::Stdin),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                return Err(anyhow!("input file '{path_str}' does not exist"));
            }
            Ok(InputSource::File(path))
        }
        None => Ok(InputSource::Stdin),
    }
}

fn parse_output(output: Option<&str>) -> OutputDestination {
    match output {
        None | Some("-") => OutputDestination::Stdout,
        Some(path) => OutputDestination::File(PathBuf::from(path)),
    }
}

fn load_diagram(source: &InputSource) -> Result<Diagram> {
    let contents = match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            if buffer.trim().is_empty() {
                return Err(anyhow!("no diagram supplied on stdin"));
            }
            buffer
        }
        InputSource::File(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if contents.trim().is_empty() {
                return Err(anyhow!("input file '{}' was empty", path.display()));
            }
            contents
        }
    };
    Ok(Diagram::from_json(&contents)?)
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool, what: &str) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.write_all(b"\n")?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !quiet {
                println!("Wrote {what} -> {}", path.display());
            }
        }
    }
    Ok(())
}
