//! Pipe chain analysis
//!
//! Breaks a `|` chain into per-stage records, flags stages whose argument
//! shape commonly surprises users (the piped value lands as the final
//! argument of a multi-argument call), and warns about values of the wrong
//! type flowing into numeric functions.

use crate::template::ast::Node;
use crate::template::engine::lookup_field;
use crate::template::funcs::{is_multi_arg_func, is_numeric_func};
use crate::template::{render_or_placeholder, DataContext, Engine};
use crate::trace::model::PipeStep;

/// Break the first multi-stage chain of `input` into per-stage records.
/// Each record carries the stage's textual arguments, their resolved
/// display values, and the chain output up to that stage. Inputs without a
/// multi-stage chain yield nothing.
pub fn analyze_pipes(engine: &dyn Engine, input: &str, ctx: &DataContext) -> Vec<PipeStep> {
    let template = match engine.parse(input) {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };

    let chain = match template.actions().find(|a| a.chain.stages.len() >= 2) {
        Some(action) => &action.chain,
        None => return Vec::new(),
    };

    let mut out = Vec::with_capacity(chain.stages.len());
    for (i, stage) in chain.stages.iter().enumerate() {
        let mut args = Vec::new();
        let mut args_values = Vec::new();
        for arg in stage.args() {
            args.push(arg.to_string());
            args_values.push(arg_value(engine, arg, ctx));
        }
        out.push(PipeStep {
            func_name: stage.head().to_string(),
            args,
            args_values,
            output: render_or_placeholder(engine, &chain.prefix_text(i), ctx),
        });
    }
    out
}

fn arg_value(engine: &dyn Engine, node: &Node, ctx: &DataContext) -> String {
    match node {
        Node::Field(path) => lookup_field(ctx, path).display_arg(),
        Node::SubChain(sub) => {
            let last = sub.stages.len() - 1;
            let out = render_or_placeholder(engine, &sub.prefix_text(last), ctx);
            format!("{:?}", out)
        }
        literal => literal.to_string(),
    }
}

/// Tips about pipe behavior that is legal but commonly misread.
pub fn pipe_tips(engine: &dyn Engine, input: &str) -> Vec<String> {
    let template = match engine.parse(input) {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };

    let mut tips = Vec::new();
    for action in template.actions() {
        for (i, stage) in action.chain.stages.iter().enumerate() {
            if i == 0 {
                continue;
            }
            if let Node::Ident(name) = stage.head() {
                if is_multi_arg_func(name) {
                    let tip = format!(
                        "the piped value becomes the LAST argument of '{}'",
                        name
                    );
                    if !tips.contains(&tip) {
                        tips.push(tip);
                    }
                }
            }
        }
    }
    tips
}

/// Warnings about non-numeric values piped into numeric functions.
pub fn type_mismatch_warnings(
    engine: &dyn Engine,
    input: &str,
    ctx: &DataContext,
) -> Vec<String> {
    let template = match engine.parse(input) {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };

    let mut warnings = Vec::new();
    for action in template.actions() {
        for (i, stage) in action.chain.stages.iter().enumerate() {
            if i == 0 {
                continue;
            }
            let name = match stage.head() {
                Node::Ident(name) if is_numeric_func(name) => name,
                _ => continue,
            };
            let piped = render_or_placeholder(engine, &action.chain.prefix_text(i - 1), ctx);
            if piped.trim().parse::<i64>().is_err() {
                warnings.push(format!(
                    "'{}' expects a numeric input but receives {:?}",
                    name, piped
                ));
            }
        }
    }
    warnings
}

/// Variable names referenced by `input` as `.NAME` fields, in order of
/// first appearance. Only uppercase-led names count, matching the taskfile
/// variable convention.
pub fn extract_var_names(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'.' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while end < bytes.len()
            && ((bytes[end] as char).is_ascii_alphanumeric() || bytes[end] == b'_')
        {
            end += 1;
        }
        if end > start && (bytes[start] as char).is_ascii_uppercase() {
            let name = &input[start..end];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        i = end.max(i + 1);
    }
    names
}
