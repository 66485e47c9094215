//! Expression step reconstruction
//!
//! Rebuilds the atomic evaluation steps of every action in a template:
//! resolving a variable, then applying each function of the pipe chain in
//! true evaluation order. Intermediate values come from re-rendering chain
//! prefixes through the engine, never from re-implementing evaluation.

use crate::template::ast::{Chain, Node};
use crate::template::engine::lookup_field;
use crate::template::{render_or_placeholder, DataContext, Engine};
use crate::trace::model::{ActionTrace, EvalStep, StepOp};

/// Reconstruct the evaluation steps for every action in `input`. Step
/// numbers increase in evaluation order across all actions of the
/// expression. An unparsable input yields no actions.
pub fn analyze_actions(
    engine: &dyn Engine,
    input: &str,
    ctx: &DataContext,
) -> Vec<ActionTrace> {
    let template = match engine.parse(input) {
        Ok(t) => t,
        Err(_) => return Vec::new(),
    };

    let mut counter = 0usize;
    let mut out = Vec::new();
    for (idx, action) in template.actions().enumerate() {
        let mut steps = Vec::new();
        walk_chain(engine, &action.chain, ctx, &mut counter, &mut steps);
        out.push(ActionTrace {
            action_index: idx,
            source_line: action.source_line,
            source: action.line_text.clone(),
            result: render_or_placeholder(engine, &action.line_text, ctx),
            steps,
        });
    }
    out
}

fn walk_chain(
    engine: &dyn Engine,
    chain: &Chain,
    ctx: &DataContext,
    counter: &mut usize,
    steps: &mut Vec<EvalStep>,
) {
    for (i, stage) in chain.stages.iter().enumerate() {
        match stage.head() {
            Node::Ident(name) => {
                // Arguments evaluate depth-first, before the call itself
                let mut parts = Vec::with_capacity(stage.nodes.len());
                for arg in stage.args() {
                    parts.push(arg_display(engine, arg, ctx, counter, steps));
                }
                if i > 0 {
                    let piped = render_or_placeholder(engine, &chain.prefix_text(i - 1), ctx);
                    parts.push(format!("{:?}", piped));
                }
                *counter += 1;
                let input = if parts.is_empty() {
                    name.clone()
                } else {
                    format!("{} {}", name, parts.join(" "))
                };
                steps.push(EvalStep {
                    num: *counter,
                    operation: StepOp::ApplyFunc,
                    target: name.clone(),
                    input,
                    output: render_or_placeholder(engine, &chain.prefix_text(i), ctx),
                });
            }
            Node::Field(path) => {
                *counter += 1;
                steps.push(EvalStep {
                    num: *counter,
                    operation: StepOp::ResolveVar,
                    target: stage.head().to_string(),
                    input: lookup_field(ctx, path).render_string(),
                    output: String::new(),
                });
            }
            Node::SubChain(sub) => walk_chain(engine, sub, ctx, counter, steps),
            // Literal heads are not resolved, they contribute no step
            _ => {}
        }
    }
}

/// Display form of an argument for the reconstructed call text. Field and
/// sub-chain arguments contribute their own steps first.
fn arg_display(
    engine: &dyn Engine,
    node: &Node,
    ctx: &DataContext,
    counter: &mut usize,
    steps: &mut Vec<EvalStep>,
) -> String {
    match node {
        Node::Field(path) => {
            let value = lookup_field(ctx, path);
            *counter += 1;
            steps.push(EvalStep {
                num: *counter,
                operation: StepOp::ResolveVar,
                target: node.to_string(),
                input: value.render_string(),
                output: String::new(),
            });
            value.display_arg()
        }
        Node::SubChain(sub) => {
            walk_chain(engine, sub, ctx, counter, steps);
            let last = sub.stages.len() - 1;
            let out = render_or_placeholder(engine, &sub.prefix_text(last), ctx);
            format!("{:?}", out)
        }
        Node::Str(s) => format!("{:?}", s),
        Node::Int(n) => n.to_string(),
        Node::Bool(b) => b.to_string(),
        Node::Ident(name) => {
            // Zero-arg call in argument position
            let out = render_or_placeholder(engine, &format!("{{{{{}}}}}", name), ctx);
            format!("{:?}", out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{TemplateEngine, Value};

    fn ctx(pairs: &[(&str, Value)]) -> DataContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_pipe_chain_steps() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("  hello  "))]);
        let actions = analyze_actions(&engine, "{{.NAME | trim | upper}}", &data);
        assert_eq!(actions.len(), 1);
        let steps = &actions[0].steps;
        assert_eq!(steps.len(), 3);

        assert_eq!(steps[0].num, 1);
        assert_eq!(steps[0].operation, StepOp::ResolveVar);
        assert_eq!(steps[0].target, ".NAME");
        assert_eq!(steps[0].input, "  hello  ");
        assert_eq!(steps[0].output, "");

        assert_eq!(steps[1].num, 2);
        assert_eq!(steps[1].operation, StepOp::ApplyFunc);
        assert_eq!(steps[1].target, "trim");
        assert_eq!(steps[1].input, "trim \"  hello  \"");
        assert_eq!(steps[1].output, "hello");

        assert_eq!(steps[2].num, 3);
        assert_eq!(steps[2].target, "upper");
        assert_eq!(steps[2].input, "upper \"hello\"");
        assert_eq!(steps[2].output, "HELLO");
    }

    #[test]
    fn test_function_args_resolve_before_call() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("node")), ("COUNT", Value::Int(3))]);
        let actions =
            analyze_actions(&engine, r#"{{printf "%s x%d" .NAME .COUNT}}"#, &data);
        let steps = &actions[0].steps;
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].operation, StepOp::ResolveVar);
        assert_eq!(steps[0].target, ".NAME");
        assert_eq!(steps[1].operation, StepOp::ResolveVar);
        assert_eq!(steps[1].target, ".COUNT");
        assert_eq!(steps[1].input, "3");
        assert_eq!(steps[2].operation, StepOp::ApplyFunc);
        assert_eq!(steps[2].target, "printf");
        assert_eq!(steps[2].input, "printf \"%s x%d\" \"node\" 3");
        assert_eq!(steps[2].output, "node x3");
    }

    #[test]
    fn test_subchain_args_are_depth_first() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("  hi  "))]);
        let actions = analyze_actions(&engine, r#"{{printf "[%s]" (.NAME | trim)}}"#, &data);
        let steps = &actions[0].steps;
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].target, ".NAME");
        assert_eq!(steps[1].target, "trim");
        assert_eq!(steps[1].output, "hi");
        assert_eq!(steps[2].target, "printf");
        assert_eq!(steps[2].input, "printf \"[%s]\" \"hi\"");
        assert_eq!(steps[2].output, "[hi]");
    }

    #[test]
    fn test_step_numbers_continue_across_actions() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("A", Value::from("a")), ("B", Value::from("b"))]);
        let actions = analyze_actions(&engine, "{{.A}} and {{.B | upper}}", &data);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].steps[0].num, 1);
        assert_eq!(actions[1].steps[0].num, 2);
        assert_eq!(actions[1].steps[1].num, 3);
        assert_eq!(actions[0].action_index, 0);
        assert_eq!(actions[1].action_index, 1);
    }

    #[test]
    fn test_source_line_and_result() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("A", Value::from("one")), ("B", Value::from("two"))]);
        let actions = analyze_actions(&engine, "first {{.A}}\nsecond {{.B}}", &data);
        assert_eq!(actions[0].source_line, 1);
        assert_eq!(actions[0].source, "first {{.A}}");
        assert_eq!(actions[0].result, "first one");
        assert_eq!(actions[1].source_line, 2);
        assert_eq!(actions[1].result, "second two");
    }

    #[test]
    fn test_anomalous_output_flows_into_steps() {
        let engine = TemplateEngine::new();
        let data = ctx(&[("NAME", Value::from("hello"))]);
        let actions = analyze_actions(&engine, r#"{{printf "%s %s" .NAME}}"#, &data);
        let steps = &actions[0].steps;
        assert_eq!(steps[1].target, "printf");
        assert_eq!(steps[1].output, "hello %!s(MISSING)");
    }

    #[test]
    fn test_exec_error_becomes_placeholder_output() {
        let engine = TemplateEngine::new();
        let actions = analyze_actions(&engine, "{{.X | nosuch}}", &DataContext::new());
        let steps = &actions[0].steps;
        assert_eq!(steps.len(), 2);
        assert!(steps[1].output.starts_with("<exec error:"));
    }

    #[test]
    fn test_literal_chain_head_produces_no_step() {
        let engine = TemplateEngine::new();
        let actions =
            analyze_actions(&engine, r#"{{"x" | upper}}"#, &DataContext::new());
        let steps = &actions[0].steps;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].operation, StepOp::ApplyFunc);
        assert_eq!(steps[0].target, "upper");
        assert_eq!(steps[0].output, "X");
    }

    #[test]
    fn test_parse_failure_yields_no_actions() {
        let engine = TemplateEngine::new();
        assert!(analyze_actions(&engine, "{{oops...", &DataContext::new()).is_empty());
    }

    #[test]
    fn test_missing_var_resolves_to_empty() {
        let engine = TemplateEngine::new();
        let actions = analyze_actions(&engine, "{{.NOPE | upper}}", &DataContext::new());
        let steps = &actions[0].steps;
        assert_eq!(steps[0].input, "");
        assert_eq!(steps[1].output, "");
    }
}
