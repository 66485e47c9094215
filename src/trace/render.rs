//! Human-readable report rendering
//!
//! Draws the trace report as bordered sections: a variables table with
//! provenance and shadow warnings, per-expression evaluation boxes with
//! numbered steps, reconstructed commands, dependencies and structured
//! diagnostics. Styling is carried by an explicit `Style` value so the
//! renderer stays free of global state and directly testable.

use std::io::{self, Write};

use colored::Colorize;

use crate::template::Value;
use crate::trace::highlight::{
    highlight_errors, highlight_value, make_whitespace_visible, visible_len,
};
use crate::trace::model::{
    CmdTrace, DiagKind, Diagnostic, ExpressionTrace, Report, StepOp, SubtaskCall, TaskTrace,
    VarObservation,
};

/// Controls what the renderers display.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Show environment-origin globals and internal variables.
    pub verbose: bool,
    /// Replace whitespace in values with visible markers.
    pub show_whitespace: bool,
}

/// Terminal styling, passed by value to every render call.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(enabled: bool) -> Self {
        Style { enabled }
    }

    /// Resolve from an explicit choice plus the NO_COLOR convention.
    pub fn from_choice(choice: ColorChoice) -> Self {
        let enabled = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::env::var_os("NO_COLOR").is_none(),
        };
        Style { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn bold(&self, s: &str) -> String {
        self.paint(s, |t| t.bold().to_string())
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint(s, |t| t.dimmed().to_string())
    }

    pub fn red(&self, s: &str) -> String {
        self.paint(s, |t| t.red().to_string())
    }

    pub fn green(&self, s: &str) -> String {
        self.paint(s, |t| t.green().to_string())
    }

    pub fn yellow(&self, s: &str) -> String {
        self.paint(s, |t| t.yellow().to_string())
    }

    pub fn blue(&self, s: &str) -> String {
        self.paint(s, |t| t.blue().to_string())
    }

    pub fn cyan(&self, s: &str) -> String {
        self.paint(s, |t| t.cyan().to_string())
    }

    pub fn heading(&self, s: &str) -> String {
        self.paint(s, |t| t.green().bold().to_string())
    }

    pub fn section(&self, s: &str) -> String {
        self.paint(s, |t| t.yellow().bold().to_string())
    }

    pub fn banner(&self, s: &str) -> String {
        self.paint(s, |t| t.cyan().bold().to_string())
    }

    fn paint(&self, s: &str, f: impl Fn(&str) -> String) -> String {
        if self.enabled {
            f(s)
        } else {
            s.to_string()
        }
    }
}

/// How color output is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

/// Write the full human-readable report.
pub fn render_text(
    w: &mut dyn Write,
    report: &Report,
    opts: &RenderOptions,
    style: Style,
) -> io::Result<()> {
    let transformed;
    let report = if opts.show_whitespace {
        transformed = apply_whitespace_visibility(report);
        &transformed
    } else {
        report
    };

    let header = "DRY RUN \u{2014} Variable & Template Diagnostics";
    let border = "\u{2550}".repeat(header.chars().count() + 4);
    writeln!(w)?;
    writeln!(w, "{}", style.banner(&format!("\u{2554}{}\u{2557}", border)))?;
    writeln!(w, "{}", style.banner(&format!("\u{2551}  {}  \u{2551}", header)))?;
    writeln!(w, "{}", style.banner(&format!("\u{255a}{}\u{255d}", border)))?;
    if opts.show_whitespace {
        writeln!(
            w,
            "{}",
            style.dim(
                "Legend: \u{00b7} = space, \u{2192} = tab, \u{21b5} = newline, \
                 \u{2190} = carriage return, [ESC] = ansi escape"
            )
        )?;
    }
    writeln!(w)?;

    let globals = filter_globals(&report.global_vars, opts.verbose);
    if !globals.is_empty() {
        writeln!(w, "{}", style.heading("\u{2500}\u{2500} Global Variables"))?;
        render_vars(w, &globals, opts, style)?;
        if !opts.verbose && globals.len() < report.global_vars.len() {
            let hidden = report.global_vars.len() - globals.len();
            writeln!(
                w,
                "  {}",
                style.dim(&format!(
                    "({} environment variables hidden, use -v to show)",
                    hidden
                ))
            )?;
        }
        writeln!(w)?;
    }

    for task in &report.tasks {
        render_task(w, task, opts, style)?;
    }

    writeln!(
        w,
        "{}",
        style.banner("\u{255a}\u{2550}\u{2550} End of Dry Run Report \u{2550}\u{2550}\u{255d}")
    )?;
    Ok(())
}

/// Internal bookkeeping variables hidden unless verbose.
fn is_internal_var(name: &str) -> bool {
    name.starts_with("CLI_") || matches!(name, "TASK_INFO" | "TASKFILE_INFO")
}

fn filter_globals(vars: &[VarObservation], verbose: bool) -> Vec<VarObservation> {
    if verbose {
        return vars.to_vec();
    }
    vars.iter()
        .filter(|v| v.origin != crate::trace::model::Origin::Environment)
        .filter(|v| !is_internal_var(&v.name))
        .cloned()
        .collect()
}

fn render_task(
    w: &mut dyn Write,
    task: &TaskTrace,
    opts: &RenderOptions,
    style: Style,
) -> io::Result<()> {
    writeln!(
        w,
        "{}",
        style.heading(&format!("\u{2500}\u{2500} Task: {}", task.name))
    )?;
    if !task.variables.is_empty() {
        render_vars(w, &task.variables, opts, style)?;
    }
    for expr in &task.templates {
        render_expression(w, expr, style)?;
    }
    render_cmds(w, &task.commands, style)?;
    if !task.subtask_calls.is_empty() {
        render_subtask_calls(w, &task.subtask_calls, style)?;
    }
    if !task.dependencies.is_empty() {
        writeln!(
            w,
            "  {} {}",
            style.section("Dependencies:"),
            task.dependencies.join(", ")
        )?;
    }
    writeln!(w)
}

fn var_value_text(var: &VarObservation) -> String {
    // Containers show as JSON so they can be syntax highlighted
    let mut text = match &var.value {
        Value::Map(_) | Value::List(_) => serde_json::to_string(&var.value)
            .unwrap_or_else(|_| var.value.render_string()),
        other => other.render_string(),
    };
    if var.is_dynamic {
        let sh_info = var
            .sh_cmd
            .as_deref()
            .map(|cmd| format!(" (sh: {})", cmd))
            .unwrap_or_default();
        let warn = if text.is_empty() {
            " \u{26a0} DYNAMIC, not evaluated"
        } else {
            ""
        };
        text = format!("(sh) {}{}{}", text, sh_info, warn);
    }
    if var.is_ref {
        text = format!("(ref) {}", text);
    }
    text
}

fn render_vars(
    w: &mut dyn Write,
    vars: &[VarObservation],
    opts: &RenderOptions,
    style: Style,
) -> io::Result<()> {
    writeln!(w, "  {}", style.section("Variables in scope:"))?;

    struct Row {
        name: String,
        origin: String,
        type_label: String,
        value: String,
        shadow: String,
        extra: Vec<String>,
    }

    let mut rows = Vec::with_capacity(vars.len());
    let (mut col_name, mut col_origin, mut col_type, mut col_value, mut col_shadow) =
        (4, 6, 4, 5, 8);
    for var in vars {
        let shadow = match &var.shadows {
            Some(info) => format!(
                "\u{26a0} SHADOWS {}={:?} [{}]",
                info.name,
                info.value.render_string(),
                info.origin.label()
            ),
            None => String::new(),
        };
        let mut extra = Vec::new();
        if var.value_id != 0 {
            extra.push(format!("ptr: 0x{:x}", var.value_id));
        }
        if let Some(ref_name) = &var.ref_name {
            extra.push(format!("\u{2192} aliases: {}", ref_name));
        }
        let row = Row {
            name: var.name.clone(),
            origin: var.origin.label().to_string(),
            type_label: if var.type_label.is_empty() {
                "-".to_string()
            } else {
                var.type_label.clone()
            },
            value: var_value_text(var),
            shadow,
            extra,
        };
        col_name = col_name.max(visible_len(&row.name));
        col_origin = col_origin.max(visible_len(&row.origin));
        col_type = col_type.max(visible_len(&row.type_label));
        col_value = col_value.max(visible_len(&row.value));
        for line in &row.extra {
            col_value = col_value.max(visible_len(line));
        }
        col_shadow = col_shadow.max(visible_len(&row.shadow));
        rows.push(row);
    }

    let widths = [col_name, col_origin, col_type, col_value, col_shadow];
    let h_line = |w: &mut dyn Write, left: &str, mid: &str, right: &str| -> io::Result<()> {
        let mut line = String::from(left);
        for (i, width) in widths.iter().enumerate() {
            line.push_str(&"\u{2500}".repeat(width + 2));
            line.push_str(if i + 1 == widths.len() { right } else { mid });
        }
        writeln!(w, "  {}", style.dim(&line))
    };
    let cell = |s: &str, col: usize| {
        let pad = col + (s.chars().count() - visible_len(s));
        format!("{:<pad$}", s, pad = pad)
    };
    let sep = style.dim("\u{2502}");
    let row_line = |w: &mut dyn Write, cells: [&str; 5]| -> io::Result<()> {
        writeln!(
            w,
            "  {sep} {} {sep} {} {sep} {} {sep} {} {sep} {} {sep}",
            cell(cells[0], col_name),
            cell(cells[1], col_origin),
            cell(cells[2], col_type),
            cell(cells[3], col_value),
            cell(cells[4], col_shadow),
            sep = sep
        )
    };

    h_line(w, "\u{250c}", "\u{252c}", "\u{2510}")?;
    row_line(w, ["Name", "Origin", "Type", "Value", "Shadows?"])?;
    h_line(w, "\u{251c}", "\u{253c}", "\u{2524}")?;
    for row in &rows {
        let shadow = if row.shadow.is_empty() {
            row.shadow.clone()
        } else {
            style.yellow(&row.shadow)
        };
        let value = if row.value.starts_with("(sh)") {
            style.blue(&row.value)
        } else {
            highlight_value(&row.value, style, opts.show_whitespace)
        };
        row_line(w, [&row.name, &row.origin, &row.type_label, &value, &shadow])?;
        for extra in &row.extra {
            row_line(w, ["", "", "", &style.dim(extra), ""])?;
        }
    }
    h_line(w, "\u{2514}", "\u{2534}", "\u{2518}")
}

fn box_start(w: &mut dyn Write, label: &str, style: Style) -> io::Result<()> {
    writeln!(w, "  {}", style.dim(&format!("\u{250c}\u{2500} {}:", label)))
}

fn box_line(w: &mut dyn Write, line: &str, style: Style) -> io::Result<()> {
    writeln!(w, "  {} {}", style.dim("\u{2502}"), line)
}

fn box_end(w: &mut dyn Write, style: Style) -> io::Result<()> {
    writeln!(w, "  {}", style.dim("\u{2514}\u{2500}"))
}

fn box_content(w: &mut dyn Write, label: &str, content: &str, style: Style) -> io::Result<()> {
    box_start(w, label, style)?;
    let mut lines: Vec<&str> = content.split('\n').collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    for line in lines {
        box_line(w, line, style)?;
    }
    box_end(w, style)
}

// Continuation indent aligning with the column after a one-char label
const STEP_FIELD_PAD: &str = "        ";

fn step_field(
    w: &mut dyn Write,
    label: &str,
    content: &str,
    paint: impl Fn(&str) -> String,
    style: Style,
) -> io::Result<()> {
    let mut lines: Vec<&str> = content.split('\n').collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let mut iter = lines.into_iter();
    if let Some(first) = iter.next() {
        box_line(w, &format!("  {}     {}", label, paint(first)), style)?;
        for line in iter {
            box_line(w, &format!("{}{}", STEP_FIELD_PAD, paint(line)), style)?;
        }
    }
    Ok(())
}

fn render_expression(w: &mut dyn Write, expr: &ExpressionTrace, style: Style) -> io::Result<()> {
    let context = expr.context.as_deref().unwrap_or("expression");
    writeln!(
        w,
        "  {}",
        style.section(&format!("Template Evaluation \u{2014} {}:", context))
    )?;

    box_content(w, "Input", &expr.input, style)?;

    if !expr.eval_actions.is_empty() {
        let total = expr.eval_actions.len();
        box_start(w, "Evaluation Steps", style)?;
        for action in &expr.eval_actions {
            box_line(w, "", style)?;
            box_line(
                w,
                &style.dim(&format!(
                    "\u{2500}\u{2500} Action {} of {}, line {}",
                    action.action_index + 1,
                    total,
                    action.source_line
                )),
                style,
            )?;
            step_field(w, "S", &action.source, |s| style.cyan(s), style)?;
            box_line(w, "", style)?;
            for step in &action.steps {
                let op = match step.operation {
                    StepOp::ResolveVar => style.cyan(step.operation.name()),
                    StepOp::ApplyFunc => style.yellow(step.operation.name()),
                };
                box_line(
                    w,
                    &format!(
                        "{} {} \u{2014} {}",
                        style.bold(&format!("Step {}:", step.num)),
                        op,
                        style.dim(&step.target)
                    ),
                    style,
                )?;
                if !step.input.is_empty() {
                    step_field(w, "I", &step.input, |s| s.to_string(), style)?;
                }
                if !step.output.is_empty() {
                    step_field(w, "O", &step.output, |s| style.green(s), style)?;
                }
            }
            box_line(w, "", style)?;
            step_field(w, "R", &action.result, |s| style.green(s), style)?;
        }
        box_line(w, "", style)?;
        box_end(w, style)?;
    } else if !expr.pipe_steps.is_empty() {
        box_start(w, "Pipe Steps", style)?;
        for (i, step) in expr.pipe_steps.iter().enumerate() {
            let args = if step.args_values.is_empty() {
                step.args.join(", ")
            } else {
                step.args_values.join(", ")
            };
            box_line(
                w,
                &format!(
                    "Step {}: {}({}) \u{2192} {}",
                    i + 1,
                    step.func_name,
                    args,
                    style.green(&step.output)
                ),
                style,
            )?;
        }
        box_end(w, style)?;
    }

    box_content(w, "Output", &highlight_errors(&expr.output, style), style)?;

    if !expr.vars_used.is_empty() {
        box_content(w, "Vars used", &expr.vars_used.join(", "), style)?;
    }
    if let Some(error) = &expr.error {
        writeln!(w, "  {}", style.red(&format!("\u{26a0} {}", error)))?;
    }
    for diag in &expr.diagnostics {
        render_diagnostic(w, diag, style)?;
    }
    if expr.diagnostics.is_empty() {
        for tip in &expr.tips {
            writeln!(w, "  {}", style.cyan(&format!("\u{2139} Note: {}", tip)))?;
        }
    }
    Ok(())
}

fn render_diagnostic(w: &mut dyn Write, diag: &Diagnostic, style: Style) -> io::Result<()> {
    let (icon, label) = match diag.diag_type {
        DiagKind::ExecError => ("\u{2716}", "Execution Error"),
        DiagKind::OutputAnomaly => ("\u{26a0}", "Output Anomaly"),
    };
    let header = format!(
        "{} {} \u{2014} {} (Step {})",
        icon, label, diag.func_name, diag.step_num
    );
    let header = match diag.diag_type {
        DiagKind::ExecError => style.red(&header),
        DiagKind::OutputAnomaly => style.yellow(&header),
    };
    writeln!(w, "  {}", header)?;

    if !diag.expression.is_empty() {
        writeln!(
            w,
            "      {}  {}",
            style.dim("Expression"),
            style.cyan(&diag.expression)
        )?;
    }
    if !diag.error_msg.is_empty() {
        writeln!(
            w,
            "      {}       {}",
            style.dim("Error"),
            style.red(&diag.error_msg)
        )?;
    }
    if !diag.output.is_empty() {
        writeln!(
            w,
            "      {}      {}",
            style.dim("Output"),
            style.red(&diag.output)
        )?;
    }
    if !diag.signature.is_empty() {
        let rule = style.dim(&"\u{2508}".repeat(40));
        writeln!(w, "      {}", rule)?;
        writeln!(w, "      {}   {}", style.dim("Signature"), diag.signature)?;
        if !diag.example.is_empty() {
            writeln!(
                w,
                "      {}     {}",
                style.dim("Example"),
                style.cyan(&diag.example)
            )?;
        }
        writeln!(w, "      {}", rule)?;
    }
    if !diag.call.is_empty() {
        writeln!(
            w,
            "      {}        {}",
            style.dim("Call"),
            style.bold(&diag.call)
        )?;
    }
    if !diag.params.is_empty() {
        writeln!(w, "      {}", style.dim("Params"))?;
        for param in &diag.params {
            if param.missing {
                writeln!(
                    w,
                    "        {} {}  {}",
                    style.dim(&format!("{:<12}", param.name)),
                    style.red("\u{26a0} MISSING"),
                    style.dim(&format!("({})", param.param_type))
                )?;
            } else {
                writeln!(
                    w,
                    "        {} {}  {}",
                    style.dim(&format!("{:<12}", param.name)),
                    param.value,
                    style.dim(&format!("({})", param.param_type))
                )?;
            }
        }
    }
    writeln!(w)
}

fn render_cmds(w: &mut dyn Write, cmds: &[CmdTrace], style: Style) -> io::Result<()> {
    for cmd in cmds {
        let header = match &cmd.iteration {
            Some(label) => format!("cmds[{}] ({})", cmd.index, label),
            None => format!("cmds[{}]", cmd.index),
        };
        writeln!(
            w,
            "  {}",
            style.section(&format!("Commands \u{2014} {}:", header))
        )?;
        if cmd.raw == cmd.resolved {
            box_content(w, "Command", &cmd.resolved, style)?;
        } else {
            box_content(w, "Raw", &cmd.raw, style)?;
            box_content(w, "Resolved", &highlight_errors(&cmd.resolved, style), style)?;
        }
    }
    Ok(())
}

fn render_subtask_calls(
    w: &mut dyn Write,
    calls: &[SubtaskCall],
    style: Style,
) -> io::Result<()> {
    writeln!(w, "  {}", style.section("Subtask calls:"))?;
    for call in calls {
        writeln!(
            w,
            "    {} \u{2192} {}",
            style.dim(&format!("cmds[{}]", call.cmd_index)),
            style.cyan(&call.task_name)
        )?;
    }
    Ok(())
}

/// Copy of the report with whitespace made visible in every value field.
/// The original stays untouched so the JSON renderer sees real characters.
pub fn apply_whitespace_visibility(report: &Report) -> Report {
    let mut copy = report.clone();
    ws_vars(&mut copy.global_vars);
    for task in &mut copy.tasks {
        ws_vars(&mut task.variables);
        for expr in &mut task.templates {
            expr.output = make_whitespace_visible(&expr.output);
            for action in &mut expr.eval_actions {
                action.source = make_whitespace_visible(&action.source);
                action.result = make_whitespace_visible(&action.result);
                for step in &mut action.steps {
                    step.input = make_whitespace_visible(&step.input);
                    step.output = make_whitespace_visible(&step.output);
                }
            }
            for diag in &mut expr.diagnostics {
                diag.expression = make_whitespace_visible(&diag.expression);
                diag.call = make_whitespace_visible(&diag.call);
                diag.output = make_whitespace_visible(&diag.output);
                diag.error_msg = make_whitespace_visible(&diag.error_msg);
                for param in &mut diag.params {
                    param.value = make_whitespace_visible(&param.value);
                }
            }
        }
        for cmd in &mut task.commands {
            cmd.resolved = make_whitespace_visible(&cmd.resolved);
        }
    }
    copy
}

fn ws_vars(vars: &mut [VarObservation]) {
    for var in vars {
        if let Value::Str(s) = &var.value {
            var.value = Value::Str(make_whitespace_visible(s));
        }
        if let Some(cmd) = &var.sh_cmd {
            var.sh_cmd = Some(make_whitespace_visible(cmd));
        }
        if let Some(shadow) = &mut var.shadows {
            if let Value::Str(s) = &shadow.value {
                shadow.value = Value::Str(make_whitespace_visible(s));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::model::{ActionTrace, EvalStep, Origin};

    fn plain() -> Style {
        Style::new(false)
    }

    fn sample_report() -> Report {
        Report {
            version: crate::trace::model::REPORT_VERSION.to_string(),
            global_vars: vec![
                VarObservation::new("PATH", Value::from("/usr/bin"), Origin::Environment),
                VarObservation::new("GREETING", Value::from("hi"), Origin::TaskfileVars),
            ],
            tasks: vec![TaskTrace {
                name: "greet".to_string(),
                variables: vec![VarObservation::new(
                    "NAME",
                    Value::from("world"),
                    Origin::TaskVars,
                )],
                templates: vec![ExpressionTrace {
                    input: "{{.NAME | upper}}".to_string(),
                    output: "WORLD".to_string(),
                    context: Some("cmds[0]".to_string()),
                    vars_used: vec!["NAME".to_string()],
                    eval_actions: vec![ActionTrace {
                        action_index: 0,
                        source_line: 1,
                        source: "{{.NAME | upper}}".to_string(),
                        result: "WORLD".to_string(),
                        steps: vec![
                            EvalStep {
                                num: 1,
                                operation: StepOp::ResolveVar,
                                target: ".NAME".to_string(),
                                input: "world".to_string(),
                                output: String::new(),
                            },
                            EvalStep {
                                num: 2,
                                operation: StepOp::ApplyFunc,
                                target: "upper".to_string(),
                                input: "upper \"world\"".to_string(),
                                output: "WORLD".to_string(),
                            },
                        ],
                    }],
                    ..ExpressionTrace::default()
                }],
                commands: vec![CmdTrace {
                    index: 0,
                    raw: "echo {{.NAME | upper}}".to_string(),
                    resolved: "echo WORLD".to_string(),
                    iteration: None,
                }],
                dependencies: vec!["setup".to_string()],
                subtask_calls: Vec::new(),
            }],
        }
    }

    fn render_to_string(report: &Report, opts: &RenderOptions) -> String {
        let mut buf = Vec::new();
        render_text(&mut buf, report, opts, plain()).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_render_contains_sections() {
        let out = render_to_string(&sample_report(), &RenderOptions::default());
        assert!(out.contains("DRY RUN"));
        assert!(out.contains("Global Variables"));
        assert!(out.contains("Task: greet"));
        assert!(out.contains("Variables in scope:"));
        assert!(out.contains("Template Evaluation \u{2014} cmds[0]:"));
        assert!(out.contains("Step 1:"));
        assert!(out.contains("Resolve a Variable"));
        assert!(out.contains("Apply a Function"));
        assert!(out.contains("Dependencies: setup"));
        assert!(out.contains("End of Dry Run Report"));
    }

    #[test]
    fn test_env_globals_hidden_without_verbose() {
        let out = render_to_string(&sample_report(), &RenderOptions::default());
        assert!(!out.contains("PATH"));
        assert!(out.contains("GREETING"));
        assert!(out.contains("1 environment variables hidden"));

        let out = render_to_string(
            &sample_report(),
            &RenderOptions {
                verbose: true,
                ..RenderOptions::default()
            },
        );
        assert!(out.contains("PATH"));
    }

    #[test]
    fn test_internal_vars_hidden() {
        let mut report = sample_report();
        report.global_vars.push(VarObservation::new(
            "CLI_ARGS",
            Value::from(""),
            Origin::Special,
        ));
        let out = render_to_string(&report, &RenderOptions::default());
        assert!(!out.contains("CLI_ARGS"));
    }

    #[test]
    fn test_raw_and_resolved_commands() {
        let out = render_to_string(&sample_report(), &RenderOptions::default());
        assert!(out.contains("Commands \u{2014} cmds[0]:"));
        assert!(out.contains("echo {{.NAME | upper}}"));
        assert!(out.contains("echo WORLD"));
    }

    #[test]
    fn test_identical_raw_resolved_collapses() {
        let mut report = sample_report();
        report.tasks[0].commands[0].raw = "echo hi".to_string();
        report.tasks[0].commands[0].resolved = "echo hi".to_string();
        let out = render_to_string(&report, &RenderOptions::default());
        assert!(out.contains("Command:"));
        assert!(!out.contains("Resolved:"));
    }

    #[test]
    fn test_whitespace_visibility_in_render() {
        let mut report = sample_report();
        report.tasks[0].templates[0].output = "WORLD  ".to_string();
        let out = render_to_string(
            &report,
            &RenderOptions {
                show_whitespace: true,
                ..RenderOptions::default()
            },
        );
        assert!(out.contains("WORLD\u{00b7}\u{00b7}"));
        assert!(out.contains("Legend:"));
        assert!(out.contains("\u{21b5} = newline"));
        assert!(out.contains("\u{2190} = carriage return"));
        assert!(out.contains("[ESC] = ansi escape"));
    }

    #[test]
    fn test_container_value_shown_as_json() {
        use std::collections::BTreeMap;
        use std::sync::Arc;
        let mut report = sample_report();
        let mut entries = BTreeMap::new();
        entries.insert("host".to_string(), Value::from("db"));
        entries.insert("port".to_string(), Value::Int(5432));
        report.tasks[0].variables.push(VarObservation::new(
            "DB",
            Value::Map(Arc::new(entries)),
            Origin::TaskVars,
        ));
        let out = render_to_string(&report, &RenderOptions::default());
        assert!(out.contains(r#"{"host":"db","port":5432}"#));
    }

    #[test]
    fn test_container_value_is_syntax_highlighted() {
        use std::collections::BTreeMap;
        use std::sync::Arc;
        colored::control::set_override(true);
        let mut report = sample_report();
        let mut entries = BTreeMap::new();
        entries.insert("host".to_string(), Value::from("db"));
        report.tasks[0].variables.push(VarObservation::new(
            "DB",
            Value::Map(Arc::new(entries)),
            Origin::TaskVars,
        ));
        let mut buf = Vec::new();
        render_text(&mut buf, &report, &RenderOptions::default(), Style::new(true)).unwrap();
        colored::control::unset_override();
        let out = String::from_utf8(buf).unwrap();
        // The key is painted cyan by the JSON highlighter
        assert!(out.contains("\u{1b}[36m\"host\""));
    }

    #[test]
    fn test_whitespace_transform_leaves_original_untouched() {
        let report = sample_report();
        let copy = apply_whitespace_visibility(&report);
        assert_eq!(report.tasks[0].templates[0].output, "WORLD");
        assert_eq!(copy.tasks[0].templates[0].output, "WORLD");
    }

    #[test]
    fn test_shadow_warning_rendered() {
        let mut report = sample_report();
        let mut var = VarObservation::new("NAME", Value::from("inner"), Origin::CallVars);
        var.shadows = Some(Box::new(crate::trace::model::ShadowInfo {
            name: "NAME".to_string(),
            value: Value::from("outer"),
            origin: Origin::TaskfileVars,
        }));
        report.tasks[0].variables.push(var);
        let out = render_to_string(&report, &RenderOptions::default());
        assert!(out.contains("SHADOWS NAME=\"outer\" [taskfile-vars]"));
    }

    #[test]
    fn test_diagnostic_rendering() {
        let mut report = sample_report();
        report.tasks[0].templates[0].diagnostics.push(Diagnostic {
            diag_type: DiagKind::OutputAnomaly,
            func_name: "printf".to_string(),
            step_num: 2,
            expression: "{{printf \"%s %s\" .NAME}}".to_string(),
            signature: "printf(format string, args ...any) string".to_string(),
            example: "{{printf \"%s: %s\" .KEY .VALUE}}".to_string(),
            call: "printf \"%s %s\" \"world\"".to_string(),
            params: vec![crate::trace::model::ParamMapping {
                name: "args[1]".to_string(),
                param_type: "any".to_string(),
                value: String::new(),
                variadic: true,
                missing: true,
            }],
            error_msg: "format string \"%s %s\" expects 2 argument(s), but only 1 provided"
                .to_string(),
            output: "world %!s(MISSING)".to_string(),
        });
        report.tasks[0].templates[0].tips =
            vec!["this tip is suppressed by the diagnostic".to_string()];
        let out = render_to_string(&report, &RenderOptions::default());
        assert!(out.contains("Output Anomaly \u{2014} printf (Step 2)"));
        assert!(out.contains("MISSING"));
        assert!(out.contains("Signature"));
        assert!(!out.contains("this tip is suppressed"));
    }

    #[test]
    fn test_dynamic_var_marker() {
        let mut report = sample_report();
        report.tasks[0].variables.push(
            VarObservation::new("HOST", Value::from(""), Origin::TaskVars).dynamic("hostname"),
        );
        let out = render_to_string(&report, &RenderOptions::default());
        assert!(out.contains("(sh)"));
        assert!(out.contains("sh: hostname"));
        assert!(out.contains("DYNAMIC"));
    }
}
