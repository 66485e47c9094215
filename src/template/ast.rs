//! Parsed expression tree for template actions
//!
//! A template is plain text interleaved with `{{ ... }}` actions. Each
//! action holds a chain of stages joined by `|`; each stage is a head node
//! (field reference, function identifier or literal) followed by argument
//! nodes. The node set is a closed sum type so analyzers can match it
//! exhaustively.

use std::fmt;

/// A fully parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    /// The actions of the template, in source order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Action(a) => Some(a),
            Segment::Text(_) => None,
        })
    }
}

/// One segment of a template: literal text or an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Action(Action),
}

/// A `{{ ... }}` action with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub chain: Chain,
    /// 1-based line number the action starts on.
    pub source_line: usize,
    /// Full text of the source line containing the action.
    pub line_text: String,
}

/// A pipe chain: `stage0 | stage1 | ... | stageN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub stages: Vec<Stage>,
}

impl Chain {
    /// Reconstruct the textual form of the stages up to and including
    /// `last`, wrapped in action delimiters: `{{s0 | ... | slast}}`.
    /// Re-rendering this prefix through the engine is how analyzers obtain
    /// intermediate values without re-implementing evaluation.
    pub fn prefix_text(&self, last: usize) -> String {
        let parts: Vec<String> = self.stages[..=last].iter().map(Stage::text).collect();
        format!("{{{{{}}}}}", parts.join(" | "))
    }

    /// Textual form of the whole chain without delimiters.
    pub fn text(&self) -> String {
        let parts: Vec<String> = self.stages.iter().map(Stage::text).collect();
        parts.join(" | ")
    }
}

/// One stage of a chain. The first node is the head (what is being resolved
/// or applied), the rest are its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub nodes: Vec<Node>,
}

impl Stage {
    pub fn head(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn args(&self) -> &[Node] {
        &self.nodes[1..]
    }

    /// Source-text reconstruction of the stage.
    pub fn text(&self) -> String {
        let parts: Vec<String> = self.nodes.iter().map(Node::to_string).collect();
        parts.join(" ")
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `.NAME` or `.NAME.SUB` — a data-context field reference.
    Field(Vec<String>),
    /// A bare identifier, i.e. a function name.
    Ident(String),
    /// A string literal.
    Str(String),
    /// An integer literal.
    Int(i64),
    /// A boolean literal.
    Bool(bool),
    /// A parenthesized sub-chain used as an argument.
    SubChain(Chain),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Field(path) => write!(f, ".{}", path.join(".")),
            Node::Ident(name) => write!(f, "{}", name),
            Node::Str(s) => write!(f, "{:?}", s),
            Node::Int(i) => write!(f, "{}", i),
            Node::Bool(b) => write!(f, "{}", b),
            Node::SubChain(chain) => write!(f, "({})", chain.text()),
        }
    }
}
