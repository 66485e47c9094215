//! Integration tests for dry-run compilation and reporting

mod common;

use common::{create_test_taskfile, write_sibling};
use tasklens::config::parse::{parse_taskfile_file, resolve_includes};
use tasklens::runner::Compiler;
use tasklens::template::TemplateEngine;
use tasklens::trace::render::render_text;
use tasklens::trace::render_json::render_json;
use tasklens::trace::{Origin, RenderOptions, Report, Style, Tracer};

fn compile_file(path: &std::path::Path, tasks: &[&str]) -> Report {
    let taskfile = parse_taskfile_file(path).unwrap();
    let base_dir = path.parent().unwrap();
    let includes = resolve_includes(&taskfile, base_dir).unwrap();
    let engine = TemplateEngine::new();
    let tracer = Tracer::new();
    let compiler = Compiler::new(&taskfile, &includes, path, &engine, &tracer);
    let requested: Vec<String> = tasks.iter().map(|s| s.to_string()).collect();
    compiler.compile(&requested).unwrap();
    tracer.finalize()
}

#[test]
fn test_included_task_gets_include_vars() {
    let (dir, path) = create_test_taskfile(
        r#"
version: '3'
includes:
  lib:
    taskfile: lib.yml
    vars:
      MODE: fast
tasks: {}
"#,
    );
    write_sibling(
        &dir,
        "lib.yml",
        r#"
version: '3'
vars:
  LIB_NAME: core
tasks:
  build:
    cmds:
      - cargo build -p {{.LIB_NAME}} --profile {{.MODE}}
"#,
    );

    let report = compile_file(&path, &["lib:build"]);
    let task = report.tasks.iter().find(|t| t.name == "lib:build").unwrap();
    assert_eq!(task.commands[0].resolved, "cargo build -p core --profile fast");

    assert!(report
        .global_vars
        .iter()
        .any(|v| v.name == "MODE" && v.origin == Origin::IncludeVars));
    assert!(report
        .global_vars
        .iter()
        .any(|v| v.name == "LIB_NAME" && v.origin == Origin::IncludedTaskfileVars));
}

#[test]
fn test_dotenv_vars_observed() {
    let (dir, path) = create_test_taskfile(
        r#"
version: '3'
dotenv: ['.env']
tasks:
  show:
    cmds:
      - echo {{.API_URL}}
"#,
    );
    write_sibling(&dir, ".env", "API_URL=https://api.example.com\n");

    let report = compile_file(&path, &["show"]);
    assert!(report
        .global_vars
        .iter()
        .any(|v| v.name == "API_URL" && v.origin == Origin::Dotenv));
    assert_eq!(
        report.tasks[0].commands[0].resolved,
        "echo https://api.example.com"
    );
}

#[test]
fn test_json_report_schema() {
    let (_dir, path) = create_test_taskfile(
        r#"
version: '3'
vars:
  NAME: world
tasks:
  greet:
    cmds:
      - echo {{.NAME | upper}}
"#,
    );

    let report = compile_file(&path, &["greet"]);
    let mut buf = Vec::new();
    render_json(&mut buf, &report).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();

    assert_eq!(json["version"], "1");
    assert!(json["global_vars"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v["name"] == "NAME" && v["origin"] == "taskfile:vars"));
    let task = &json["tasks"][0];
    assert_eq!(task["name"], "greet");
    assert_eq!(task["commands"][0]["resolved"], "echo WORLD");
    let steps = task["templates"][0]["eval_actions"][0]["steps"]
        .as_array()
        .unwrap();
    assert_eq!(steps[0]["operation"], "Resolve a Variable");
    assert_eq!(steps[1]["operation"], "Apply a Function");
}

#[test]
fn test_text_report_sections() {
    let (_dir, path) = create_test_taskfile(
        r#"
version: '3'
vars:
  NAME: world
tasks:
  greet:
    vars:
      NAME: local
    cmds:
      - echo {{.NAME}}
"#,
    );

    let report = compile_file(&path, &["greet"]);
    let mut buf = Vec::new();
    render_text(&mut buf, &report, &RenderOptions::default(), Style::new(false)).unwrap();
    let text = String::from_utf8(buf).unwrap();

    assert!(text.contains("DRY RUN"));
    assert!(text.contains("Global Variables"));
    assert!(text.contains("Task: greet"));
    assert!(text.contains("SHADOWS NAME=\"world\" [taskfile-vars]"));
    assert!(text.contains("End of Dry Run Report"));
}

#[test]
fn test_anomaly_end_to_end() {
    let (_dir, path) = create_test_taskfile(
        r#"
version: '3'
tasks:
  broken:
    vars:
      NAME: hello
    cmds:
      - echo {{printf "%s %s" .NAME}}
"#,
    );

    let report = compile_file(&path, &["broken"]);
    let expr = &report.tasks[0].templates[0];
    assert_eq!(expr.diagnostics.len(), 1);
    let diag = &expr.diagnostics[0];
    assert_eq!(diag.func_name, "printf");
    assert!(diag.error_msg.contains("expects 2 argument(s)"));
    assert!(diag.params.iter().any(|p| p.missing));
}
