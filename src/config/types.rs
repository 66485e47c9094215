//! Core configuration types
//!
//! This module defines the data structures that represent a taskfile.
//! Variable maps preserve their declaration order because scope merging is
//! chronological: a later definition may shadow an earlier one, and the
//! trace must show them in the order they happened.

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Top-level taskfile structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Taskfile {
    /// Schema version (accepted as string or number)
    #[serde(default, deserialize_with = "deserialize_version")]
    pub version: Option<String>,

    /// Dotenv files to load before anything else
    #[serde(default)]
    pub dotenv: Vec<String>,

    /// Environment entries declared at taskfile level
    #[serde(default)]
    pub env: VarMap,

    /// Variables declared at taskfile level
    #[serde(default)]
    pub vars: VarMap,

    /// Included taskfiles keyed by namespace
    #[serde(default)]
    pub includes: HashMap<String, Include>,

    /// Tasks defined in the taskfile
    #[serde(default)]
    pub tasks: HashMap<String, Task>,
}

/// An included taskfile reference
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Include {
    /// Bare path shorthand
    Simple(String),

    /// Path plus variables passed into the include
    Detailed(IncludeDetail),
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncludeDetail {
    pub taskfile: String,

    #[serde(default)]
    pub vars: VarMap,
}

impl Include {
    pub fn taskfile_path(&self) -> &str {
        match self {
            Include::Simple(path) => path,
            Include::Detailed(detail) => &detail.taskfile,
        }
    }

    pub fn vars(&self) -> Option<&VarMap> {
        match self {
            Include::Simple(_) => None,
            Include::Detailed(detail) => Some(&detail.vars),
        }
    }
}

/// A task definition
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Task {
    /// Short description for task listings
    #[serde(default)]
    pub desc: Option<String>,

    /// Variables scoped to this task
    #[serde(default)]
    pub vars: VarMap,

    /// Environment entries scoped to this task
    #[serde(default)]
    pub env: VarMap,

    /// Tasks that must run before this one
    #[serde(default)]
    pub deps: Vec<Dep>,

    /// Commands to execute
    #[serde(default)]
    pub cmds: Vec<Cmd>,
}

/// A dependency entry
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Dep {
    /// Bare task name
    Simple(String),

    /// Task name plus call variables
    Detailed(TaskCall),
}

impl Dep {
    pub fn task_name(&self) -> &str {
        match self {
            Dep::Simple(name) => name,
            Dep::Detailed(call) => &call.task,
        }
    }
}

/// A `task:` invocation with optional call variables
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCall {
    pub task: String,

    #[serde(default)]
    pub vars: VarMap,
}

/// A command entry. Order matters for the untagged match: the for-loop form
/// must be tried before the plain detailed form, which would otherwise
/// swallow it by ignoring the `for` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Cmd {
    /// Simple string command
    Simple(String),

    /// Subtask invocation
    Call(TaskCall),

    /// Command repeated per loop item
    ForLoop(ForCmd),

    /// Explicit command form
    Detailed(CmdDetail),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmdDetail {
    pub cmd: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForCmd {
    #[serde(rename = "for")]
    pub for_spec: ForSpec,

    pub cmd: String,
}

/// What a for-loop iterates over
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ForSpec {
    /// Literal list of items
    List(Vec<String>),

    /// Items taken from a variable, optionally split on a separator
    Var(ForVar),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForVar {
    pub var: String,

    #[serde(default)]
    pub split: Option<String>,
}

/// One variable definition
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VarSpec {
    /// Value produced by a shell command
    Sh { sh: String },

    /// Alias of another variable, sharing its backing value
    Ref {
        #[serde(rename = "ref")]
        ref_name: String,
    },

    /// Static YAML value (scalar, list or map)
    Static(serde_yaml::Value),
}

/// An order-preserving variable map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarMap(pub Vec<(String, VarSpec)>);

impl VarMap {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarSpec)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'de> Deserialize<'de> for VarMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VarMapVisitor;

        impl<'de> Visitor<'de> for VarMapVisitor {
            type Value = VarMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of variable names to values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, VarSpec>()? {
                    entries.push((key, value));
                }
                Ok(VarMap(entries))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(VarMap::default())
            }
        }

        deserializer.deserialize_any(VarMapVisitor)
    }
}

fn deserialize_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        other => Some(
            serde_yaml::to_string(&other)
                .unwrap_or_default()
                .trim_end()
                .to_string(),
        ),
    })
}
