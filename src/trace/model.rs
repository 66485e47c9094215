//! Trace data model
//!
//! Everything the tracer records is an immutable observation; the whole set
//! flattens into a versioned `Report` at the end of a session. The structs
//! here serialize directly to the stable JSON report schema — absent
//! optional fields are omitted, never null.

use serde::{Serialize, Serializer};

use crate::template::Value;

/// Report format version tag.
pub const REPORT_VERSION: &str = "1";

/// Provenance category of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Special,
    Environment,
    TaskfileEnv,
    TaskfileVars,
    IncludeVars,
    IncludedTaskfileVars,
    CallVars,
    TaskVars,
    ForLoop,
    Dotenv,
}

impl Origin {
    /// Canonical name used in the JSON report.
    pub fn name(self) -> &'static str {
        match self {
            Origin::Special => "special",
            Origin::Environment => "environment",
            Origin::TaskfileEnv => "taskfile:env",
            Origin::TaskfileVars => "taskfile:vars",
            Origin::IncludeVars => "include:vars",
            Origin::IncludedTaskfileVars => "included:taskfile:vars",
            Origin::CallVars => "call:vars",
            Origin::TaskVars => "task:vars",
            Origin::ForLoop => "for:loop",
            Origin::Dotenv => "dotenv",
        }
    }

    /// Short label used in the text report's variables table.
    pub fn label(self) -> &'static str {
        match self {
            Origin::Special => "special",
            Origin::Environment => "env",
            Origin::TaskfileEnv => "taskfile-env",
            Origin::TaskfileVars => "taskfile-vars",
            Origin::IncludeVars => "include-vars",
            Origin::IncludedTaskfileVars => "included-tf",
            Origin::CallVars => "call-vars",
            Origin::TaskVars => "task-vars",
            Origin::ForLoop => "for-loop",
            Origin::Dotenv => "dotenv",
        }
    }

    /// True for origins that belong to the taskfile/global scope rather
    /// than a specific task.
    pub fn is_global(self) -> bool {
        matches!(
            self,
            Origin::Special
                | Origin::Environment
                | Origin::TaskfileEnv
                | Origin::TaskfileVars
                | Origin::IncludeVars
                | Origin::IncludedTaskfileVars
                | Origin::Dotenv
        )
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Verbatim copy of the observation an inner-scope variable overrides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowInfo {
    pub name: String,
    pub value: Value,
    pub origin: Origin,
}

/// One fact about a single variable as seen in one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarObservation {
    pub name: String,
    pub origin: Origin,
    #[serde(rename = "type")]
    pub type_label: String,
    pub value: Value,
    /// Identity id for container values, 0 for scalars. Serialized in hex.
    #[serde(
        skip_serializing_if = "is_zero",
        serialize_with = "serialize_hex_id"
    )]
    pub value_id: usize,
    #[serde(skip_serializing_if = "is_false")]
    pub is_ref: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_dynamic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sh_cmd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadows: Option<Box<ShadowInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl VarObservation {
    /// A plain static observation; extras are filled in via the builders.
    /// Type and identity id are derived from the value.
    pub fn new(name: impl Into<String>, value: Value, origin: Origin) -> Self {
        let type_label = value.type_label().to_string();
        let value_id = value.identity_id();
        VarObservation {
            name: name.into(),
            origin,
            type_label,
            value,
            value_id,
            is_ref: false,
            ref_name: None,
            is_dynamic: false,
            sh_cmd: None,
            shadows: None,
            warning: None,
        }
    }

    /// Mark as resolved through a shell command (not executed in dry-run).
    pub fn dynamic(mut self, sh_cmd: impl Into<String>) -> Self {
        self.is_dynamic = true;
        self.sh_cmd = Some(sh_cmd.into());
        self
    }

    /// Mark as an alias of another variable.
    pub fn reference(mut self, ref_name: impl Into<String>) -> Self {
        self.is_ref = true;
        self.ref_name = Some(ref_name.into());
        self
    }
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn serialize_hex_id<S: Serializer>(id: &usize, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{:x}", id))
}

/// Kind of an atomic sub-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
    ResolveVar,
    ApplyFunc,
}

impl StepOp {
    pub fn name(self) -> &'static str {
        match self {
            StepOp::ResolveVar => "Resolve a Variable",
            StepOp::ApplyFunc => "Apply a Function",
        }
    }
}

impl Serialize for StepOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// One atomic sub-evaluation inside an expression. Step numbers increase in
/// true evaluation order across all actions of one expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalStep {
    #[serde(rename = "step")]
    pub num: usize,
    pub operation: StepOp,
    pub target: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub input: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// One template action with its reconstructed evaluation steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionTrace {
    pub action_index: usize,
    pub source_line: usize,
    /// Full text of the source line containing the action.
    pub source: String,
    /// The source line with its actions rendered.
    pub result: String,
    pub steps: Vec<EvalStep>,
}

/// One stage of a `|`-chained expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipeStep {
    #[serde(rename = "func")]
    pub func_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args_values: Vec<String>,
    pub output: String,
}

/// Kind of a diagnosed problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    ExecError,
    OutputAnomaly,
}

impl DiagKind {
    pub fn name(self) -> &'static str {
        match self {
            DiagKind::ExecError => "exec_error",
            DiagKind::OutputAnomaly => "output_anomaly",
        }
    }
}

impl Serialize for DiagKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// One parameter of a reconstructed call, zipped against the supplied
/// argument values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamMapping {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip_serializing_if = "is_false")]
    pub variadic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub missing: bool,
}

/// A root-caused anomaly attributed to one producing call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub diag_type: DiagKind,
    pub func_name: String,
    pub step_num: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expression: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub example: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub call: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamMapping>,
    pub error_msg: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// One templated expression instance as rendered for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ExpressionTrace {
    pub input: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vars_used: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pipe_steps: Vec<PipeStep>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub eval_actions: Vec<ActionTrace>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A raw/resolved command pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CmdTrace {
    pub index: usize,
    pub raw: String,
    pub resolved: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<String>,
}

/// A `task:` call found inside a command list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtaskCall {
    pub cmd_index: usize,
    pub task_name: String,
}

/// Everything recorded for one task, in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct TaskTrace {
    pub name: String,
    pub variables: Vec<VarObservation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<ExpressionTrace>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CmdTrace>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtask_calls: Vec<SubtaskCall>,
}

/// The root aggregate handed to renderers. Built once by `Tracer::finalize`
/// and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Report {
    pub version: String,
    pub global_vars: Vec<VarObservation>,
    pub tasks: Vec<TaskTrace>,
}
