//! Main CLI application

use std::io;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::config::parse::{
    find_taskfile, parse_taskfile_file, resolve_includes, ResolvedInclude,
};
use crate::config::types::Taskfile;
use crate::error::Result;
use crate::runner::Compiler;
use crate::template::TemplateEngine;
use crate::trace::render::render_text;
use crate::trace::render_json::render_json;
use crate::trace::{ColorChoice, RenderOptions, Style, Tracer};

/// CLI application
pub struct App {
    /// The clap command
    command: Command,
    /// Parsed taskfile
    taskfile: Taskfile,
    /// Resolved includes of the taskfile
    includes: Vec<ResolvedInclude>,
    /// Taskfile path
    taskfile_path: PathBuf,
}

impl App {
    /// Create a new app, discovering the taskfile automatically
    pub fn new() -> Result<Self> {
        let path = find_taskfile()?;
        App::with_taskfile(path)
    }

    /// Create app with a specific taskfile
    pub fn with_taskfile(path: PathBuf) -> Result<Self> {
        let taskfile = parse_taskfile_file(&path)?;
        let base_dir = path.parent().map(PathBuf::from).unwrap_or_default();
        let includes = resolve_includes(&taskfile, &base_dir)?;

        Ok(App {
            command: build_command(),
            taskfile,
            includes,
            taskfile_path: path,
        })
    }

    /// Run the application with command line arguments
    pub fn run(self) -> Result<()> {
        let matches = self.command.clone().get_matches();
        self.run_with_matches(&matches)
    }

    fn run_with_matches(&self, matches: &ArgMatches) -> Result<()> {
        use std::io::Write;

        let opts = RenderOptions {
            verbose: matches.get_flag("verbose"),
            show_whitespace: matches.get_flag("show-whitespace"),
        };
        let style = Style::from_choice(get_color_choice(matches));

        let engine = TemplateEngine::new();
        let tracer = Tracer::new();
        let cli_args = matches
            .get_many::<String>("cli_args")
            .map(|values| values.cloned().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        let compiler = Compiler::new(
            &self.taskfile,
            &self.includes,
            self.taskfile_path.clone(),
            &engine,
            &tracer,
        )
        .with_cli_args(cli_args);

        let requested = if matches.get_flag("list-all") {
            compiler.task_names()
        } else {
            matches
                .get_many::<String>("tasks")
                .map(|values| values.cloned().collect())
                .unwrap_or_default()
        };
        if requested.is_empty() {
            let mut command = self.command.clone();
            command.print_help()?;
            println!();
            return Ok(());
        }

        let warnings = compiler.compile(&requested)?;
        let report = tracer.finalize();

        // The report goes to stderr so stdout stays clean for tooling
        let mut err = io::stderr().lock();
        for warning in &warnings {
            writeln!(err, "{}", style.yellow(&format!("warning: {}", warning)))?;
        }
        if matches.get_flag("json") {
            render_json(&mut err, &report)?;
        } else {
            render_text(&mut err, &report, &opts, style)?;
        }
        Ok(())
    }
}

/// Build the clap command
fn build_command() -> Command {
    Command::new("tasklens")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Dry-run diagnostics for taskfiles: variable provenance, template steps and anomaly blame")
        .arg(
            Arg::new("tasks")
                .value_name("TASK")
                .help("Tasks to analyze")
                .num_args(0..),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to the taskfile"),
        )
        .arg(
            Arg::new("list-all")
                .long("list-all")
                .help("Analyze every task in the taskfile")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit the report as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show environment and internal variables")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show-whitespace")
                .long("show-whitespace")
                .help("Replace whitespace in values with visible markers")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .value_name("WHEN")
                .value_parser(["auto", "always", "never"])
                .default_value("auto")
                .help("When to use colored output"),
        )
        .arg(
            Arg::new("cli_args")
                .value_name("ARGS")
                .help("Arguments exposed to templates as CLI_ARGS")
                .num_args(0..)
                .last(true),
        )
}

/// Get color choice from matches
fn get_color_choice(matches: &ArgMatches) -> ColorChoice {
    match matches.get_one::<String>("color").map(String::as_str) {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Run the CLI application
pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let file_path = extract_file_arg(&args);

    let app = if let Some(path) = file_path {
        App::with_taskfile(path)?
    } else {
        App::new()?
    };

    app.run()
}

/// Extract --file argument before clap parsing
fn extract_file_arg(args: &[String]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if (args[i] == "--file" || args[i] == "-f") && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_choice_parsing() {
        let matches =
            build_command().get_matches_from(vec!["tasklens", "--color", "never", "build"]);
        assert_eq!(get_color_choice(&matches), ColorChoice::Never);

        let matches = build_command().get_matches_from(vec!["tasklens", "build"]);
        assert_eq!(get_color_choice(&matches), ColorChoice::Auto);
    }

    #[test]
    fn test_task_and_cli_args_split() {
        let matches = build_command()
            .get_matches_from(vec!["tasklens", "deploy", "--", "-e", "prod"]);
        let tasks: Vec<&String> = matches.get_many::<String>("tasks").unwrap().collect();
        assert_eq!(tasks, vec!["deploy"]);
        let extra: Vec<&String> = matches.get_many::<String>("cli_args").unwrap().collect();
        assert_eq!(extra, vec!["-e", "prod"]);
    }

    #[test]
    fn test_extract_file_arg() {
        let args = vec![
            "tasklens".to_string(),
            "--file".to_string(),
            "test.yml".to_string(),
        ];
        assert_eq!(extract_file_arg(&args), Some(PathBuf::from("test.yml")));

        let args = vec!["tasklens".to_string(), "-f".to_string(), "t.yml".to_string()];
        assert_eq!(extract_file_arg(&args), Some(PathBuf::from("t.yml")));

        assert_eq!(extract_file_arg(&["tasklens".to_string()]), None);
    }

    #[test]
    fn test_flags_default_off() {
        let matches = build_command().get_matches_from(vec!["tasklens", "build"]);
        assert!(!matches.get_flag("json"));
        assert!(!matches.get_flag("verbose"));
        assert!(!matches.get_flag("show-whitespace"));
        assert!(!matches.get_flag("list-all"));
    }
}
