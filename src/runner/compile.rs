//! Dry-run task compilation
//!
//! Compiles tasks the way a real run would resolve them, without executing
//! anything: scopes merge chronologically into a data context, every merge
//! step is observed by the tracer, templated strings render through the
//! engine with full step reconstruction, and dependencies plus `task:`
//! calls recurse through the execution tree with a visited set.

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::parse::ResolvedInclude;
use crate::config::types::{Cmd, Dep, ForSpec, Task, Taskfile, VarMap, VarSpec};
use crate::error::{ConfigError, Result};
use crate::template::{render_or_placeholder, DataContext, Engine, Value};
use crate::trace::diagnostics::{collect_diagnostics, generate_error_hints};
use crate::trace::model::{CmdTrace, ExpressionTrace, Origin, VarObservation};
use crate::trace::pipes::{analyze_pipes, extract_var_names, pipe_tips, type_mismatch_warnings};
use crate::trace::steps::analyze_actions;
use crate::trace::Tracer;

/// Loop items bind to this variable inside the repeated command.
const FOR_ITEM_VAR: &str = "ITEM";

/// Compiles tasks against a tracer without executing anything.
pub struct Compiler<'a> {
    root: &'a Taskfile,
    includes: &'a [ResolvedInclude],
    taskfile_path: PathBuf,
    engine: &'a dyn Engine,
    tracer: &'a Tracer,
    cli_args: String,
}

impl<'a> Compiler<'a> {
    pub fn new(
        root: &'a Taskfile,
        includes: &'a [ResolvedInclude],
        taskfile_path: impl Into<PathBuf>,
        engine: &'a dyn Engine,
        tracer: &'a Tracer,
    ) -> Self {
        Compiler {
            root,
            includes,
            taskfile_path: taskfile_path.into(),
            engine,
            tracer,
            cli_args: String::new(),
        }
    }

    /// Extra command-line arguments exposed to templates as CLI_ARGS.
    pub fn with_cli_args(mut self, args: impl Into<String>) -> Self {
        self.cli_args = args.into();
        self
    }

    /// All invocable task names, namespaced includes included, sorted.
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.root.tasks.keys().cloned().collect();
        for include in self.includes {
            for task in include.taskfile.tasks.keys() {
                names.push(format!("{}:{}", include.namespace, task));
            }
        }
        names.sort();
        names
    }

    /// Compile the requested tasks and everything they reach. A missing
    /// requested task is an error; failures further down the tree become
    /// warnings so sibling branches still get traced.
    pub fn compile(&self, requested: &[String]) -> Result<Vec<String>> {
        let mut visited = HashSet::new();
        let mut warnings = Vec::new();
        for name in requested {
            if self.lookup(name).is_none() {
                return Err(ConfigError::TaskNotFound(name.clone()).into());
            }
            self.compile_task(name, None, &mut visited, &mut warnings);
        }
        self.tracer.separate_global_vars();
        Ok(warnings)
    }

    fn lookup(&self, name: &str) -> Option<(&Task, Option<&ResolvedInclude>)> {
        if let Some(task) = self.root.tasks.get(name) {
            return Some((task, None));
        }
        let (namespace, local) = name.split_once(':')?;
        let include = self.includes.iter().find(|i| i.namespace == namespace)?;
        include
            .taskfile
            .tasks
            .get(local)
            .map(|task| (task, Some(include)))
    }

    fn compile_task(
        &self,
        name: &str,
        call_vars: Option<&VarMap>,
        visited: &mut HashSet<String>,
        warnings: &mut Vec<String>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        let (task, include) = match self.lookup(name) {
            Some(found) => found,
            None => {
                warnings.push(format!("task '{}' is not defined, skipping", name));
                return;
            }
        };

        self.tracer.enter_scope(name);
        let mut ctx = DataContext::new();
        self.merge_scopes(name, task, include, call_vars, &mut ctx);

        // Commands first, recursion after, so the task's own trace stays
        // contiguous before its subtrees are compiled
        let mut pending: Vec<(String, Option<VarMap>)> = Vec::new();
        let mut cmd_index = 0;
        for cmd in &task.cmds {
            match cmd {
                Cmd::Simple(line) => {
                    self.record_command(cmd_index, line, None, &ctx);
                    cmd_index += 1;
                }
                Cmd::Detailed(detail) => {
                    self.record_command(cmd_index, &detail.cmd, None, &ctx);
                    cmd_index += 1;
                }
                Cmd::Call(call) => {
                    self.tracer.observe_subtask_call(cmd_index, &call.task);
                    pending.push((call.task.clone(), Some(call.vars.clone())));
                    cmd_index += 1;
                }
                Cmd::ForLoop(for_cmd) => {
                    let items = self.loop_items(&for_cmd.for_spec, &ctx, warnings);
                    for item in items {
                        let mut iter_ctx = ctx.clone();
                        self.tracer.observe_var(VarObservation::new(
                            FOR_ITEM_VAR,
                            Value::from(item.clone()),
                            Origin::ForLoop,
                        ));
                        iter_ctx.insert(FOR_ITEM_VAR.to_string(), Value::from(item.clone()));
                        let label = format!("{}={}", FOR_ITEM_VAR, item);
                        self.record_command(cmd_index, &for_cmd.cmd, Some(label), &iter_ctx);
                        cmd_index += 1;
                    }
                }
            }
        }

        for dep in &task.deps {
            self.tracer.observe_dep(dep.task_name());
        }
        for dep in &task.deps {
            let (dep_name, dep_vars) = match dep {
                Dep::Simple(name) => (name.clone(), None),
                Dep::Detailed(call) => (call.task.clone(), Some(call.vars.clone())),
            };
            pending.push((dep_name, dep_vars));
        }

        for (sub_name, sub_vars) in pending {
            if self.lookup(&sub_name).is_none() {
                warnings.push(format!(
                    "could not compile '{}' (reached from '{}'): task is not defined",
                    sub_name, name
                ));
                continue;
            }
            self.compile_task(&sub_name, sub_vars.as_ref(), visited, warnings);
        }
    }

    /// Merge every scope that contributes to `name`, oldest first, observing
    /// each variable as it lands.
    fn merge_scopes(
        &self,
        name: &str,
        task: &Task,
        include: Option<&ResolvedInclude>,
        call_vars: Option<&VarMap>,
        ctx: &mut DataContext,
    ) {
        self.merge_special(name, task, ctx);
        self.merge_environment(ctx);
        self.merge_dotenv(ctx);
        self.merge_var_map(&self.root.env, Origin::TaskfileEnv, ctx);
        self.merge_var_map(&self.root.vars, Origin::TaskfileVars, ctx);
        if let Some(include) = include {
            self.merge_var_map(&include.taskfile.env, Origin::IncludedTaskfileVars, ctx);
            self.merge_var_map(&include.taskfile.vars, Origin::IncludedTaskfileVars, ctx);
            self.merge_var_map(&include.vars, Origin::IncludeVars, ctx);
        }
        if let Some(vars) = call_vars {
            self.merge_var_map(vars, Origin::CallVars, ctx);
        }
        self.merge_var_map(&task.env, Origin::TaskVars, ctx);
        self.merge_var_map(&task.vars, Origin::TaskVars, ctx);
    }

    fn merge_special(&self, task_name: &str, task: &Task, ctx: &mut DataContext) {
        let dir = self
            .taskfile_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .display()
            .to_string();
        let cwd = env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let specials = [
            ("TASK", Value::from(task_name)),
            ("TASKFILE", Value::from(self.taskfile_path.display().to_string())),
            ("TASKFILE_DIR", Value::from(dir.clone())),
            ("USER_WORKING_DIR", Value::from(cwd)),
            ("CLI_ARGS", Value::from(self.cli_args.clone())),
            ("TASK_INFO", task_info_map(task_name, task)),
            ("TASKFILE_INFO", self.taskfile_info_map(dir)),
        ];
        for (name, value) in specials {
            self.tracer
                .observe_var(VarObservation::new(name, value.clone(), Origin::Special));
            ctx.insert(name.to_string(), value);
        }
    }

    /// Metadata map exposed as TASKFILE_INFO, addressable with dotted paths
    /// like `{{.TASKFILE_INFO.Version}}`.
    fn taskfile_info_map(&self, dir: String) -> Value {
        let mut map = BTreeMap::new();
        map.insert(
            "Path".to_string(),
            Value::from(self.taskfile_path.display().to_string()),
        );
        map.insert("Dir".to_string(), Value::from(dir));
        map.insert(
            "Version".to_string(),
            Value::from(self.root.version.clone().unwrap_or_default()),
        );
        map.insert("NumTasks".to_string(), Value::Int(self.root.tasks.len() as i64));
        Value::Map(Arc::new(map))
    }

    fn merge_environment(&self, ctx: &mut DataContext) {
        let mut pairs: Vec<(String, String)> = env::vars().collect();
        pairs.sort();
        for (name, value) in pairs {
            let value = Value::from(value);
            self.tracer.observe_var(VarObservation::new(
                name.clone(),
                value.clone(),
                Origin::Environment,
            ));
            ctx.insert(name, value);
        }
    }

    fn merge_dotenv(&self, ctx: &mut DataContext) {
        let base_dir = self
            .taskfile_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        for file in &self.root.dotenv {
            let path = base_dir.join(file);
            let entries = match dotenvy::from_path_iter(&path) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries {
                let (name, value) = match entry {
                    Ok(pair) => pair,
                    Err(_) => continue,
                };
                let value = Value::from(value);
                self.tracer.observe_var(VarObservation::new(
                    name.clone(),
                    value.clone(),
                    Origin::Dotenv,
                ));
                ctx.insert(name, value);
            }
        }
    }

    fn merge_var_map(&self, vars: &VarMap, origin: Origin, ctx: &mut DataContext) {
        for (name, spec) in vars.iter() {
            let (value, observation) = self.resolve_var(name, spec, origin, ctx);
            self.tracer.observe_var(observation);
            ctx.insert(name.to_string(), value);
        }
    }

    /// Resolve one variable definition against the context built so far.
    /// Dynamic `sh:` variables are never executed in a dry run; they land as
    /// empty strings flagged dynamic.
    fn resolve_var(
        &self,
        name: &str,
        spec: &VarSpec,
        origin: Origin,
        ctx: &DataContext,
    ) -> (Value, VarObservation) {
        match spec {
            VarSpec::Static(yaml) => {
                let value = match Value::from_yaml(yaml) {
                    Value::Str(text) if text.contains("{{") => {
                        self.record_expression(&text, ctx, format!("vars.{}", name));
                        Value::Str(render_or_placeholder(self.engine, &text, ctx))
                    }
                    other => other,
                };
                let observation = VarObservation::new(name, value.clone(), origin);
                (value, observation)
            }
            VarSpec::Sh { sh } => {
                let rendered_cmd = if sh.contains("{{") {
                    render_or_placeholder(self.engine, sh, ctx)
                } else {
                    sh.clone()
                };
                let value = Value::from("");
                let observation =
                    VarObservation::new(name, value.clone(), origin).dynamic(rendered_cmd);
                (value, observation)
            }
            VarSpec::Ref { ref_name } => {
                let value = ctx.get(ref_name).cloned().unwrap_or(Value::Nil);
                let mut observation =
                    VarObservation::new(name, value.clone(), origin).reference(ref_name.clone());
                if matches!(value, Value::Nil) {
                    observation.warning =
                        Some(format!("reference to undefined variable {}", ref_name));
                }
                (value, observation)
            }
        }
    }

    fn record_command(
        &self,
        index: usize,
        raw: &str,
        iteration: Option<String>,
        ctx: &DataContext,
    ) {
        self.tracer.set_context(format!("cmds[{}]", index));
        let resolved = if raw.contains("{{") {
            self.record_expression(raw, ctx, format!("cmds[{}]", index))
        } else {
            raw.to_string()
        };
        self.tracer.observe_command(CmdTrace {
            index,
            raw: raw.to_string(),
            resolved,
            iteration,
        });
    }

    /// Render `input` and record the full expression trace: output, steps,
    /// pipe breakdown, diagnostics and tips. Returns the rendered text.
    fn record_expression(&self, input: &str, ctx: &DataContext, context: String) -> String {
        let output = render_or_placeholder(self.engine, input, ctx);
        let eval_actions = analyze_actions(self.engine, input, ctx);
        let diagnostics = collect_diagnostics(input, &eval_actions);

        let mut tips = pipe_tips(self.engine, input);
        tips.extend(type_mismatch_warnings(self.engine, input, ctx));
        tips.extend(generate_error_hints(&diagnostics));

        let error = match self.engine.render(input, ctx) {
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };

        self.tracer.observe_expression(ExpressionTrace {
            input: input.to_string(),
            output: output.clone(),
            context: Some(context),
            vars_used: extract_var_names(input),
            pipe_steps: analyze_pipes(self.engine, input, ctx),
            eval_actions,
            diagnostics,
            tips,
            error,
        });
        output
    }

    fn loop_items(
        &self,
        spec: &ForSpec,
        ctx: &DataContext,
        warnings: &mut Vec<String>,
    ) -> Vec<String> {
        match spec {
            ForSpec::List(items) => items.clone(),
            ForSpec::Var(for_var) => match ctx.get(&for_var.var) {
                Some(Value::List(items)) => {
                    items.iter().map(Value::render_string).collect()
                }
                Some(value) => {
                    let text = value.render_string();
                    match &for_var.split {
                        Some(sep) => text.split(sep.as_str()).map(str::to_string).collect(),
                        None => text.split_whitespace().map(str::to_string).collect(),
                    }
                }
                None => {
                    warnings.push(format!(
                        "for-loop variable '{}' is not defined",
                        for_var.var
                    ));
                    Vec::new()
                }
            },
        }
    }
}

/// Metadata map exposed as TASK_INFO, addressable with dotted paths like
/// `{{.TASK_INFO.Name}}`.
fn task_info_map(name: &str, task: &Task) -> Value {
    let mut map = BTreeMap::new();
    map.insert("Name".to_string(), Value::from(name));
    map.insert(
        "Desc".to_string(),
        Value::from(task.desc.clone().unwrap_or_default()),
    );
    let deps: Vec<Value> = task
        .deps
        .iter()
        .map(|d| Value::from(d.task_name()))
        .collect();
    map.insert("Deps".to_string(), Value::List(Arc::new(deps)));
    map.insert("NumCmds".to_string(), Value::Int(task.cmds.len() as i64));
    Value::Map(Arc::new(map))
}
