//! The templating-engine boundary
//!
//! Analyzers never walk evaluator internals: they hold an `Engine`, ask it
//! to parse input into an expression tree, and obtain intermediate values by
//! re-rendering syntactically valid sub-expression text through the same
//! engine. `TemplateEngine` is the built-in implementation.

use std::collections::HashMap;

use crate::error::{TemplateError, TemplateResult};
use crate::template::ast::{Chain, Node, Segment, Stage, Template};
use crate::template::funcs::FuncMap;
use crate::template::parser;
use crate::template::value::Value;

/// The data context a template is rendered against.
pub type DataContext = HashMap<String, Value>;

/// The result of rendering a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub output: String,
    /// Field references that resolved to nothing (rendered as "").
    pub missing: Vec<String>,
}

/// The engine contract: parse an expression into a tree, or render it
/// against a data context. Implementations must be pure with respect to the
/// context — rendering the same input twice yields the same output.
pub trait Engine {
    fn parse(&self, input: &str) -> TemplateResult<Template>;
    fn render(&self, input: &str, ctx: &DataContext) -> TemplateResult<Rendered>;
}

/// Built-in template engine over the closed expression AST.
#[derive(Default)]
pub struct TemplateEngine {
    funcs: FuncMap,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for TemplateEngine {
    fn parse(&self, input: &str) -> TemplateResult<Template> {
        parser::parse(input)
    }

    fn render(&self, input: &str, ctx: &DataContext) -> TemplateResult<Rendered> {
        let template = self.parse(input)?;
        let mut output = String::new();
        let mut missing = Vec::new();
        for segment in &template.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Action(action) => {
                    let value = eval_chain(&action.chain, ctx, &self.funcs, &mut missing)?;
                    output.push_str(&value.render_string());
                }
            }
        }
        Ok(Rendered { output, missing })
    }
}

/// Render `input`, degrading failures to placeholder text instead of an
/// error. Dry-run analyzers must never abort a trace over a render failure,
/// and diagnostics pattern-match the placeholder prefixes.
pub fn render_or_placeholder(engine: &dyn Engine, input: &str, ctx: &DataContext) -> String {
    match engine.render(input, ctx) {
        Ok(rendered) => rendered.output,
        Err(TemplateError::Parse(msg)) => format!("<parse error: {}>", msg),
        Err(TemplateError::Exec(msg)) => format!("<exec error: {}>", msg),
    }
}

/// Look up a dotted field path in the context. Missing segments yield Nil.
pub fn lookup_field(ctx: &DataContext, path: &[String]) -> Value {
    let mut current = match path.first().and_then(|head| ctx.get(head)) {
        Some(v) => v.clone(),
        None => return Value::Nil,
    };
    for key in &path[1..] {
        current = match &current {
            Value::Map(entries) => match entries.get(key) {
                Some(v) => v.clone(),
                None => return Value::Nil,
            },
            _ => return Value::Nil,
        };
    }
    current
}

fn eval_chain(
    chain: &Chain,
    ctx: &DataContext,
    funcs: &FuncMap,
    missing: &mut Vec<String>,
) -> TemplateResult<Value> {
    let mut piped: Option<Value> = None;
    for stage in &chain.stages {
        let value = eval_stage(stage, piped.take(), ctx, funcs, missing)?;
        piped = Some(value);
    }
    // A chain always has at least one stage
    Ok(piped.unwrap_or(Value::Nil))
}

fn eval_stage(
    stage: &Stage,
    piped: Option<Value>,
    ctx: &DataContext,
    funcs: &FuncMap,
    missing: &mut Vec<String>,
) -> TemplateResult<Value> {
    match stage.head() {
        Node::Ident(name) => {
            let def = funcs.get(name).ok_or_else(|| {
                TemplateError::Exec(format!("function {:?} not defined", name))
            })?;
            let mut args = Vec::with_capacity(stage.args().len() + 1);
            for node in stage.args() {
                args.push(eval_arg(node, ctx, funcs, missing)?);
            }
            // The piped value becomes the final argument of the call
            if let Some(value) = piped {
                args.push(value);
            }
            def.call(&args).map_err(TemplateError::Exec)
        }
        head => {
            if !stage.args().is_empty() {
                return Err(TemplateError::Exec(format!(
                    "{} is not a function and takes no arguments",
                    head
                )));
            }
            if piped.is_some() {
                return Err(TemplateError::Exec(format!(
                    "cannot pipe into non-function {}",
                    head
                )));
            }
            eval_arg(head, ctx, funcs, missing)
        }
    }
}

fn eval_arg(
    node: &Node,
    ctx: &DataContext,
    funcs: &FuncMap,
    missing: &mut Vec<String>,
) -> TemplateResult<Value> {
    match node {
        Node::Field(path) => {
            let value = lookup_field(ctx, path);
            if matches!(value, Value::Nil) {
                missing.push(format!(".{}", path.join(".")));
            }
            Ok(value)
        }
        Node::Ident(name) => {
            // A bare identifier in argument position is a zero-arg call
            let def = funcs.get(name).ok_or_else(|| {
                TemplateError::Exec(format!("function {:?} not defined", name))
            })?;
            def.call(&[]).map_err(TemplateError::Exec)
        }
        Node::Str(s) => Ok(Value::Str(s.clone())),
        Node::Int(i) => Ok(Value::Int(*i)),
        Node::Bool(b) => Ok(Value::Bool(*b)),
        Node::SubChain(chain) => eval_chain(chain, ctx, funcs, missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, Value)]) -> DataContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_plain_text() {
        let engine = TemplateEngine::new();
        let out = engine.render("just text", &DataContext::new()).unwrap();
        assert_eq!(out.output, "just text");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn test_render_field() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("world"))]);
        let out = engine.render("hello {{.NAME}}", &data).unwrap();
        assert_eq!(out.output, "hello world");
    }

    #[test]
    fn test_render_pipe_chain() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("  hello  "))]);
        let out = engine.render("{{.NAME | trim | upper}}", &data).unwrap();
        assert_eq!(out.output, "HELLO");
    }

    #[test]
    fn test_render_missing_field_is_empty_and_reported() {
        let engine = TemplateEngine::new();
        let out = engine.render("x{{.NOPE}}y", &DataContext::new()).unwrap();
        assert_eq!(out.output, "xy");
        assert_eq!(out.missing, vec![".NOPE".to_string()]);
    }

    #[test]
    fn test_render_function_args() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("node")), ("N", Value::Int(8))]);
        let out = engine
            .render(r#"{{printf "%s: %*s" "ENGINE" .N .NAME}}"#, &data)
            .unwrap();
        assert_eq!(out.output, "ENGINE:     node");
    }

    #[test]
    fn test_render_subchain_argument() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("  hi  "))]);
        let out = engine
            .render(r#"{{printf "[%s]" (.NAME | trim)}}"#, &data)
            .unwrap();
        assert_eq!(out.output, "[hi]");
    }

    #[test]
    fn test_render_unknown_function() {
        let engine = TemplateEngine::new();
        let err = engine
            .render("{{nosuch .X}}", &DataContext::new())
            .unwrap_err();
        match err {
            TemplateError::Exec(msg) => assert!(msg.contains("not defined")),
            other => panic!("expected exec error, got {:?}", other),
        }
    }

    #[test]
    fn test_render_wrong_arity() {
        let engine = TemplateEngine::new();
        let err = engine.render("{{trim}}", &DataContext::new()).unwrap_err();
        match err {
            TemplateError::Exec(msg) => {
                assert!(msg.contains("wrong number of args for trim: want 1 got 0"))
            }
            other => panic!("expected exec error, got {:?}", other),
        }
    }

    #[test]
    fn test_render_or_placeholder() {
        let engine = TemplateEngine::new();
        let out = render_or_placeholder(&engine, "{{trim}}", &DataContext::new());
        assert!(out.starts_with("<exec error:"));
        let out = render_or_placeholder(&engine, "{{oops...", &DataContext::new());
        assert!(out.starts_with("<parse error:"));
    }

    #[test]
    fn test_overflow_degrades_to_placeholder() {
        let engine = TemplateEngine::new();
        let out = render_or_placeholder(
            &engine,
            "{{add 9223372036854775807 1}}",
            &DataContext::new(),
        );
        assert!(out.starts_with("<exec error:"));
        assert!(out.contains("integer overflow"));
    }

    #[test]
    fn test_lookup_dotted_field() {
        use std::collections::BTreeMap;
        use std::sync::Arc;
        let mut inner = BTreeMap::new();
        inner.insert("Name".to_string(), Value::from("build"));
        let data = ctx(&[("TASK", Value::Map(Arc::new(inner)))]);
        assert_eq!(
            lookup_field(&data, &["TASK".to_string(), "Name".to_string()]),
            Value::from("build")
        );
        assert_eq!(
            lookup_field(&data, &["TASK".to_string(), "Nope".to_string()]),
            Value::Nil
        );
    }

    #[test]
    fn test_anomaly_markers_flow_through_render() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("hello"))]);
        let out = engine
            .render(r#"{{printf "%s %s" .NAME}}"#, &data)
            .unwrap();
        assert_eq!(out.output, "hello %!s(MISSING)");
    }
}
