//! Stepgate CLI Entry Point
//!
//! Provides command-line interface for approval-gated workflow runs.
//!
//! # Usage
//!
//! ```bash
//! # Run a workflow file, asking before each gated step
//! stepgate release.yaml --param branch=main
//!
//! # Run a stored workflow in another workspace
//! stepgate 3f2c... --workspace /path/to/project
//!
//! # Show the command lines without running anything
//! stepgate release.yaml --preview
//!
//! # Go through the approvals but only print commands
//! stepgate release.yaml --dry-run
//!
//! # Manage stored workflows
//! stepgate --list
//! stepgate --import release.yaml
//! stepgate --delete 3f2c...
//! ```

use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info, warn};

use stepgate::execution::{
    drive_run, DryRunTerminal, Engine, PromptGate, RunUpdate, ShellTerminal, TerminalChannel,
};
use stepgate::workflow::{
    load_definition, preview_commands, ParameterMap, WorkflowDefinition, WorkflowStore,
    YamlWorkflowStore,
};
use stepgate::{APP_NAME, VERSION};

/// Shell used when neither `--shell` nor `$SHELL` is set.
const DEFAULT_SHELL: &str = "bash";

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    workflow: Option<String>,
    workspace: Option<PathBuf>,
    params: Vec<(String, String)>,
    shell: Option<String>,
    dry_run: bool,
    preview: bool,
    list: bool,
    import: Option<PathBuf>,
    delete: Option<String>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Approval-Gated Workflow Runner");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: stepgate [OPTIONS] <WORKFLOW>");
    println!();
    println!("Arguments:");
    println!("  <WORKFLOW>          Workflow YAML file, or id of a stored workflow");
    println!();
    println!("Options:");
    println!("  --workspace PATH    Workspace root (default: current directory)");
    println!("  --param KEY=VALUE   Placeholder value, may be repeated");
    println!("  --shell PROGRAM     Shell to run commands in (default: $SHELL or {})", DEFAULT_SHELL);
    println!("  --dry-run           Ask for approvals but only print commands");
    println!("  --preview           Print resolved command lines and exit");
    println!("  --list              List stored workflows of the workspace");
    println!("  --import FILE       Validate a YAML file and add it to the store");
    println!("  --delete ID         Remove a stored workflow");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  stepgate release.yaml --param branch=main");
    println!("  stepgate release.yaml --preview");
    println!("  stepgate --import release.yaml --workspace /srv/app");
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", flag))
}

fn parse_param(text: &str) -> Result<(String, String), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter '{}', expected KEY=VALUE", text))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid parameter '{}': empty key", text));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => config.dry_run = true,
            "--preview" => config.preview = true,
            "--list" => config.list = true,
            "--verbose" | "-v" => config.verbose = true,
            "--workspace" => {
                config.workspace = Some(PathBuf::from(next_value(args, &mut i, arg)?));
            }
            "--param" | "-p" => {
                let param = parse_param(next_value(args, &mut i, arg)?)?;
                config.params.push(param);
            }
            "--shell" => {
                config.shell = Some(next_value(args, &mut i, arg)?.to_string());
            }
            "--import" => {
                config.import = Some(PathBuf::from(next_value(args, &mut i, arg)?));
            }
            "--delete" => {
                config.delete = Some(next_value(args, &mut i, arg)?.to_string());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.workflow.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.workflow = Some(arg.clone());
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Validates the workspace root, defaulting to the current directory.
fn setup_workspace(workspace: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let dir = match workspace {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    if !dir.exists() {
        return Err(format!("Workspace does not exist: {}", dir.display()).into());
    }

    if !dir.is_dir() {
        return Err(format!("Workspace is not a directory: {}", dir.display()).into());
    }

    let dir = dir.canonicalize()?;
    info!("Workspace: {}", dir.display());
    Ok(dir)
}

/// Loads a workflow from a file path, falling back to the store.
fn resolve_workflow(
    store: &YamlWorkflowStore,
    workspace: &Path,
    name: &str,
) -> Result<WorkflowDefinition, Box<dyn std::error::Error>> {
    if Path::new(name).is_file() {
        info!("Loading workflow: {}", name);
        let mut workflow = load_definition(name)
            .map_err(|e| format!("Could not load workflow from '{}': {}", name, e))?;

        // Unsaved files have no id; runs are keyed by it.
        if workflow.id.trim().is_empty() {
            if let Some(stem) = Path::new(name).file_stem() {
                workflow.id = stem.to_string_lossy().into_owned();
            }
        }
        return Ok(workflow);
    }

    info!("Loading stored workflow: {}", name);
    Ok(store.load(workspace, name)?)
}

fn list_workflows(store: &YamlWorkflowStore, workspace: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let workflows = store.list(workspace)?;

    if workflows.is_empty() {
        println!("No stored workflows in {}", workspace.display());
        return Ok(());
    }

    for summary in workflows {
        println!(
            "{}  {} ({} steps)",
            summary.id.dimmed(),
            summary.name.bold(),
            summary.step_count
        );
        if let Some(description) = summary.description {
            println!("    {}", description);
        }
    }
    Ok(())
}

/// Asks for every missing placeholder value.
fn prompt_parameters<R: BufRead, W: Write>(
    missing: &[String],
    values: &mut ParameterMap,
    input: &mut R,
    output: &mut W,
) -> io::Result<()> {
    for key in missing {
        loop {
            write!(output, "{} {}: ", "?".yellow().bold(), key.bold())?;
            output.flush()?;

            let mut answer = String::new();
            if input.read_line(&mut answer)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("no value given for '{}'", key),
                ));
            }

            let answer = answer.trim();
            if !answer.is_empty() {
                values.insert(key.clone(), answer.to_string());
                break;
            }
        }
    }
    Ok(())
}

/// Drives a run to a final update, asking for parameters and approvals on
/// the same streams.
fn run_interactive<T: TerminalChannel, R: BufRead, W: Write>(
    engine: &mut Engine<T>,
    gate: &mut PromptGate<R, W>,
    workspace: &Path,
    workflow: &WorkflowDefinition,
    mut values: ParameterMap,
) -> io::Result<RunUpdate> {
    loop {
        match drive_run(engine, gate, workspace, workflow, &values) {
            RunUpdate::NeedsParameters { missing, .. } => {
                let (input, output) = gate.streams_mut();
                prompt_parameters(&missing, &mut values, input, output)?;
            }
            update => return Ok(update),
        }
    }
}

/// Runs to a final update, collecting parameter values as needed.
fn execute<T: TerminalChannel>(
    terminal: T,
    workspace: &Path,
    workflow: &WorkflowDefinition,
    values: ParameterMap,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = Engine::new(terminal);
    let mut gate = PromptGate::stdio();
    let update = run_interactive(&mut engine, &mut gate, workspace, workflow, values)?;

    println!();
    print!("{}", engine.timeline().summary(&workflow.id));
    println!();

    match update {
        RunUpdate::Completed { dispatched, .. } => {
            info!("Workflow finished: {} commands dispatched", dispatched);
            Ok(())
        }
        RunUpdate::Cancelled { step_index, .. } => {
            warn!("Workflow cancelled at step {}", step_index + 1);
            Ok(())
        }
        RunUpdate::Failed { message, .. } => Err(message.into()),
        other => Err(format!("Run ended unexpectedly: {:?}", other).into()),
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let workspace = setup_workspace(config.workspace)?;
    let store = YamlWorkflowStore::new();

    if config.list {
        return list_workflows(&store, &workspace);
    }

    if let Some(path) = config.import {
        let definition = load_definition(&path)
            .map_err(|e| format!("Could not import '{}': {}", path.display(), e))?;
        let saved = store.save(&workspace, definition)?;
        println!("Imported '{}' as {} (version {})", saved.name, saved.id, saved.version);
        return Ok(());
    }

    if let Some(id) = config.delete {
        store.delete(&workspace, &id)?;
        println!("Deleted workflow {}", id);
        return Ok(());
    }

    let Some(name) = config.workflow else {
        print_usage();
        return Err("No workflow given".into());
    };

    let workflow = resolve_workflow(&store, &workspace, &name)?;
    info!("Workflow loaded: '{}' ({} steps)", workflow.name, workflow.len());

    let values: ParameterMap = config.params.into_iter().collect();

    if config.preview {
        for (index, command) in preview_commands(&workflow, &values, &workspace)
            .iter()
            .enumerate()
        {
            println!("{:>3}. {}", index + 1, command);
        }
        return Ok(());
    }

    if config.dry_run {
        info!("Mode: DRY RUN (commands will not execute)");
        println!();
        return execute(DryRunTerminal::echoing(), &workspace, &workflow, values);
    }

    let shell = config
        .shell
        .or_else(|| env::var("SHELL").ok())
        .unwrap_or_else(|| DEFAULT_SHELL.to_string());
    info!("Shell: {}", shell);

    execute(ShellTerminal::new(shell), &workspace, &workflow, values)
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("stepgate")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_workflow_and_params() {
        let config = parse_arguments(&args(&[
            "release.yaml",
            "--param",
            "branch=main",
            "-p",
            "msg=a=b",
            "--dry-run",
        ]))
        .unwrap();

        assert_eq!(config.workflow.as_deref(), Some("release.yaml"));
        assert_eq!(
            config.params,
            vec![
                ("branch".to_string(), "main".to_string()),
                ("msg".to_string(), "a=b".to_string())
            ]
        );
        assert!(config.dry_run);
        assert!(!config.preview);
    }

    #[test]
    fn test_parse_store_commands() {
        let config = parse_arguments(&args(&["--delete", "abc", "--workspace", "/srv"])).unwrap();
        assert_eq!(config.delete.as_deref(), Some("abc"));
        assert_eq!(config.workspace, Some(PathBuf::from("/srv")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&["--param"])).is_err());
        assert!(parse_arguments(&args(&["--param", "novalue"])).is_err());
        assert!(parse_arguments(&args(&["--param", "=x"])).is_err());
        assert!(parse_arguments(&args(&["--bogus"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "b.yaml"])).is_err());
    }

    #[test]
    fn test_setup_workspace_rejects_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(setup_workspace(Some(missing)).is_err());
        assert!(setup_workspace(Some(dir.path().to_path_buf())).is_ok());
    }

    #[test]
    fn test_missing_parameters_prompted_on_gate_input() {
        let workflow = WorkflowDefinition::new("Release")
            .with_id("release")
            .with_step(stepgate::Step::new("show", "echo {{branch}}"));
        let mut engine = Engine::new(DryRunTerminal::new());
        let mut gate = PromptGate::new("\nmain\ny\n".as_bytes(), Vec::new());

        let update = run_interactive(
            &mut engine,
            &mut gate,
            Path::new("/ws"),
            &workflow,
            ParameterMap::new(),
        )
        .unwrap();

        assert!(matches!(update, RunUpdate::Completed { dispatched: 1, .. }));
        assert_eq!(engine.terminal().written(), &["echo main\n"]);

        let (_, output) = gate.streams_mut();
        let shown = String::from_utf8(output.clone()).unwrap();
        assert!(shown.contains("branch"));
        assert!(shown.contains("echo main"));
    }

    #[test]
    fn test_missing_parameters_at_end_of_input() {
        let workflow = WorkflowDefinition::new("Release")
            .with_id("release")
            .with_step(stepgate::Step::new("show", "echo {{branch}}"));
        let mut engine = Engine::new(DryRunTerminal::new());
        let mut gate = PromptGate::new("".as_bytes(), Vec::new());

        let result = run_interactive(
            &mut engine,
            &mut gate,
            Path::new("/ws"),
            &workflow,
            ParameterMap::new(),
        );

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
        assert!(engine.terminal().written().is_empty());
    }
}
