//! The tracer
//!
//! A single `Tracer` is shared by everything that participates in a dry run.
//! All mutation goes through one internal mutex, so hooks may fire from any
//! thread. A disabled tracer accepts every call as a no-op, which keeps the
//! recording hooks unconditional at their call sites.

use std::sync::Mutex;

use crate::trace::model::{
    CmdTrace, ExpressionTrace, Origin, Report, ShadowInfo, SubtaskCall, TaskTrace,
    VarObservation, REPORT_VERSION,
};

#[derive(Default)]
struct TracerState {
    global_vars: Vec<VarObservation>,
    tasks: Vec<TaskTrace>,
    /// Index into `tasks` of the scope observations are routed to.
    current: Option<usize>,
    /// Label attached to the next expression observations.
    context: Option<String>,
    snapshot: Option<Report>,
}

/// Records observations during a dry run and flattens them into a `Report`.
pub struct Tracer {
    inner: Option<Mutex<TracerState>>,
}

impl Tracer {
    /// A recording tracer.
    pub fn new() -> Self {
        Tracer {
            inner: Some(Mutex::new(TracerState::default())),
        }
    }

    /// A tracer that records nothing. Every observation call is a no-op and
    /// `finalize` yields an empty report.
    pub fn disabled() -> Self {
        Tracer { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    fn with_state<T: Default>(&self, f: impl FnOnce(&mut TracerState) -> T) -> T {
        match &self.inner {
            Some(lock) => match lock.lock() {
                Ok(mut state) => f(&mut state),
                // A poisoned lock means a panic mid-observation; the trace
                // so far is still worth keeping.
                Err(poisoned) => f(&mut poisoned.into_inner()),
            },
            None => T::default(),
        }
    }

    /// Open (or re-enter) the scope for `task`. Observations that follow are
    /// recorded against it until the next `enter_scope`.
    pub fn enter_scope(&self, task: &str) {
        self.with_state(|state| {
            let idx = match state.tasks.iter().position(|t| t.name == task) {
                Some(idx) => idx,
                None => {
                    state.tasks.push(TaskTrace {
                        name: task.to_string(),
                        ..TaskTrace::default()
                    });
                    state.tasks.len() - 1
                }
            };
            state.current = Some(idx);
            state.context = None;
        });
    }

    /// Attach a context label (e.g. `cmds[0]`) to subsequent expression
    /// observations. Cleared by `enter_scope`.
    pub fn set_context(&self, context: impl Into<String>) {
        let context = context.into();
        self.with_state(|state| {
            state.context = if context.is_empty() {
                None
            } else {
                Some(context)
            };
        });
    }

    /// Record one variable observation in the current scope. If an earlier
    /// observation of the same name exists in this task's scope or the
    /// global scope, the new one is annotated with what it shadows.
    pub fn observe_var(&self, mut var: VarObservation) {
        var.type_label = var.value.type_label().to_string();
        var.value_id = var.value.identity_id();
        self.with_state(|state| {
            let prior = state
                .current
                .and_then(|idx| {
                    state.tasks[idx]
                        .variables
                        .iter()
                        .rev()
                        .find(|v| v.name == var.name)
                })
                .or_else(|| {
                    state
                        .global_vars
                        .iter()
                        .rev()
                        .find(|v| v.name == var.name)
                });
            if let Some(prev) = prior {
                var.shadows = Some(Box::new(ShadowInfo {
                    name: prev.name.clone(),
                    value: prev.value.clone(),
                    origin: prev.origin,
                }));
                if var.warning.is_none() {
                    var.warning = Some(format!(
                        "shadows earlier {} definition of {}",
                        prev.origin.name(),
                        prev.name
                    ));
                }
            }
            match state.current {
                Some(idx) => state.tasks[idx].variables.push(var),
                None => state.global_vars.push(var),
            }
        });
    }

    /// Record one rendered expression in the current scope. Observations
    /// made outside any task scope are dropped.
    pub fn observe_expression(&self, mut expr: ExpressionTrace) {
        self.with_state(|state| {
            if expr.context.is_none() {
                expr.context = state.context.clone();
            }
            if let Some(idx) = state.current {
                state.tasks[idx].templates.push(expr);
            }
        });
    }

    /// Record a raw/resolved command pair in the current scope.
    pub fn observe_command(&self, cmd: CmdTrace) {
        self.with_state(|state| {
            if let Some(idx) = state.current {
                state.tasks[idx].commands.push(cmd);
            }
        });
    }

    /// Record a dependency edge of the current task.
    pub fn observe_dep(&self, dep: &str) {
        self.with_state(|state| {
            if let Some(idx) = state.current {
                let deps = &mut state.tasks[idx].dependencies;
                if !deps.iter().any(|d| d == dep) {
                    deps.push(dep.to_string());
                }
            }
        });
    }

    /// Record a `task:` call found inside a command list.
    pub fn observe_subtask_call(&self, cmd_index: usize, task: &str) {
        self.with_state(|state| {
            if let Some(idx) = state.current {
                state.tasks[idx].subtask_calls.push(SubtaskCall {
                    cmd_index,
                    task_name: task.to_string(),
                });
            }
        });
    }

    /// Move global-origin variables out of the first task's scope into the
    /// global collection, and drop their duplicates from later tasks. Task
    /// compilation re-merges the global scope every time, so without this
    /// pass every task would repeat the same taskfile-level variables.
    pub fn separate_global_vars(&self) {
        self.with_state(|state| {
            let first = match state.tasks.first_mut() {
                Some(task) => task,
                None => return,
            };
            let (globals, task_only): (Vec<_>, Vec<_>) = first
                .variables
                .drain(..)
                .partition(|v| v.origin.is_global());
            first.variables = task_only;
            let global_names: Vec<String> =
                globals.iter().map(|v| v.name.clone()).collect();
            state.global_vars.extend(globals);

            for task in state.tasks.iter_mut().skip(1) {
                task.variables
                    .retain(|v| !(v.origin.is_global() && global_names.contains(&v.name)));
            }
        });
    }

    /// Flatten everything recorded so far into a `Report`. The first call
    /// snapshots the state; later calls return the same snapshot even if
    /// more observations arrive in between.
    pub fn finalize(&self) -> Report {
        self.with_state(|state| {
            if let Some(snapshot) = &state.snapshot {
                return snapshot.clone();
            }
            let report = Report {
                version: REPORT_VERSION.to_string(),
                global_vars: state.global_vars.clone(),
                tasks: state.tasks.clone(),
            };
            state.snapshot = Some(report.clone());
            report
        })
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Tracer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Value;

    #[test]
    fn test_disabled_tracer_records_nothing() {
        let tracer = Tracer::disabled();
        assert!(!tracer.is_enabled());
        tracer.enter_scope("build");
        tracer.observe_var(VarObservation::new(
            "NAME",
            Value::from("x"),
            Origin::TaskVars,
        ));
        tracer.observe_dep("lint");
        let report = tracer.finalize();
        assert!(report.tasks.is_empty());
        assert!(report.global_vars.is_empty());
    }

    #[test]
    fn test_global_vs_task_scope_routing() {
        let tracer = Tracer::new();
        tracer.observe_var(VarObservation::new(
            "GREETING",
            Value::from("hello"),
            Origin::TaskfileVars,
        ));
        tracer.enter_scope("build");
        tracer.observe_var(VarObservation::new(
            "TARGET",
            Value::from("release"),
            Origin::TaskVars,
        ));
        let report = tracer.finalize();
        assert_eq!(report.global_vars.len(), 1);
        assert_eq!(report.global_vars[0].name, "GREETING");
        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].name, "build");
        assert_eq!(report.tasks[0].variables[0].name, "TARGET");
    }

    #[test]
    fn test_shadow_detection_against_global() {
        let tracer = Tracer::new();
        tracer.observe_var(VarObservation::new(
            "NAME",
            Value::from("global"),
            Origin::TaskfileVars,
        ));
        tracer.enter_scope("greet");
        tracer.observe_var(VarObservation::new(
            "NAME",
            Value::from("local"),
            Origin::TaskVars,
        ));
        let report = tracer.finalize();
        let var = &report.tasks[0].variables[0];
        let shadow = var.shadows.as_ref().unwrap();
        assert_eq!(shadow.name, "NAME");
        assert_eq!(shadow.value, Value::from("global"));
        assert_eq!(shadow.origin, Origin::TaskfileVars);
        assert!(var.warning.as_ref().unwrap().contains("taskfile:vars"));
    }

    #[test]
    fn test_shadow_prefers_task_scope_over_global() {
        let tracer = Tracer::new();
        tracer.observe_var(VarObservation::new(
            "V",
            Value::from("g"),
            Origin::TaskfileVars,
        ));
        tracer.enter_scope("t");
        tracer.observe_var(VarObservation::new("V", Value::from("a"), Origin::CallVars));
        tracer.observe_var(VarObservation::new("V", Value::from("b"), Origin::TaskVars));
        let report = tracer.finalize();
        let vars = &report.tasks[0].variables;
        assert_eq!(vars.len(), 2);
        // The second task-scope observation shadows the first, not the global
        let shadow = vars[1].shadows.as_ref().unwrap();
        assert_eq!(shadow.origin, Origin::CallVars);
        assert_eq!(shadow.value, Value::from("a"));
    }

    #[test]
    fn test_type_and_identity_filled_on_observe() {
        let tracer = Tracer::new();
        tracer.enter_scope("t");
        let list = Value::from(vec![Value::from("a")]);
        tracer.observe_var(VarObservation::new("L", list.clone(), Origin::TaskVars));
        tracer.observe_var(VarObservation::new("S", Value::from("x"), Origin::TaskVars));
        let report = tracer.finalize();
        let vars = &report.tasks[0].variables;
        assert_eq!(vars[0].type_label, "list");
        assert_eq!(vars[0].value_id, list.identity_id());
        assert_ne!(vars[0].value_id, 0);
        assert_eq!(vars[1].type_label, "string");
        assert_eq!(vars[1].value_id, 0);
    }

    #[test]
    fn test_context_label_attaches_to_expressions() {
        let tracer = Tracer::new();
        tracer.enter_scope("t");
        tracer.set_context("cmds[0]");
        tracer.observe_expression(ExpressionTrace {
            input: "{{.X}}".into(),
            output: "1".into(),
            ..ExpressionTrace::default()
        });
        tracer.enter_scope("u");
        tracer.observe_expression(ExpressionTrace {
            input: "{{.Y}}".into(),
            output: "2".into(),
            ..ExpressionTrace::default()
        });
        let report = tracer.finalize();
        assert_eq!(
            report.tasks[0].templates[0].context.as_deref(),
            Some("cmds[0]")
        );
        // enter_scope clears the context label
        assert_eq!(report.tasks[1].templates[0].context, None);
    }

    #[test]
    fn test_dep_dedup_and_subtask_calls() {
        let tracer = Tracer::new();
        tracer.enter_scope("t");
        tracer.observe_dep("lint");
        tracer.observe_dep("lint");
        tracer.observe_subtask_call(2, "package");
        let report = tracer.finalize();
        assert_eq!(report.tasks[0].dependencies, vec!["lint".to_string()]);
        assert_eq!(report.tasks[0].subtask_calls[0].cmd_index, 2);
        assert_eq!(report.tasks[0].subtask_calls[0].task_name, "package");
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let tracer = Tracer::new();
        tracer.enter_scope("t");
        tracer.observe_dep("a");
        let first = tracer.finalize();
        tracer.observe_dep("b");
        let second = tracer.finalize();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reentering_scope_appends() {
        let tracer = Tracer::new();
        tracer.enter_scope("t");
        tracer.observe_dep("a");
        tracer.enter_scope("u");
        tracer.enter_scope("t");
        tracer.observe_dep("b");
        let report = tracer.finalize();
        assert_eq!(report.tasks.len(), 2);
        assert_eq!(
            report.tasks[0].dependencies,
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_separate_global_vars_deduplicates() {
        let tracer = Tracer::new();
        tracer.enter_scope("first");
        tracer.observe_var(VarObservation::new(
            "GREETING",
            Value::from("hello"),
            Origin::TaskfileVars,
        ));
        tracer.observe_var(VarObservation::new("LOCAL", Value::from("a"), Origin::TaskVars));
        tracer.enter_scope("second");
        tracer.observe_var(VarObservation::new(
            "GREETING",
            Value::from("hello"),
            Origin::TaskfileVars,
        ));
        tracer.observe_var(VarObservation::new("OWN", Value::from("b"), Origin::TaskVars));

        tracer.separate_global_vars();
        let report = tracer.finalize();
        assert_eq!(report.global_vars.len(), 1);
        assert_eq!(report.global_vars[0].name, "GREETING");
        assert_eq!(report.tasks[0].variables.len(), 1);
        assert_eq!(report.tasks[0].variables[0].name, "LOCAL");
        assert_eq!(report.tasks[1].variables.len(), 1);
        assert_eq!(report.tasks[1].variables[0].name, "OWN");
    }
}
