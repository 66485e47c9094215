//! Anomaly diagnosis and blame attribution
//!
//! Scans reconstructed evaluation steps for anomaly markers and execution
//! failures, attributes each one to the step that PRODUCED it (a step whose
//! input already carried the marker is only forwarding someone else's
//! problem), and reconstructs the offending call against the function's
//! declared signature so the report can show exactly which parameter went
//! missing or wrong.

use crate::template::funcs::{is_format_func, signature_of};
use crate::trace::model::{ActionTrace, DiagKind, Diagnostic, EvalStep, ParamMapping, StepOp};

const EXEC_ERROR_PREFIX: &str = "<exec error: ";
const PARSE_ERROR_PREFIX: &str = "<parse error: ";

/// True if `s` carries a C-style format anomaly marker.
pub fn contains_format_error(s: &str) -> bool {
    s.contains("%!")
}

fn contains_placeholder_error(s: &str) -> bool {
    s.contains(EXEC_ERROR_PREFIX) || s.contains(PARSE_ERROR_PREFIX)
}

/// Diagnose every anomaly in the steps of `actions`, blaming the producing
/// call. `expression` is the full template text the steps came from.
pub fn collect_diagnostics(expression: &str, actions: &[ActionTrace]) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for action in actions {
        for step in &action.steps {
            if step.operation != StepOp::ApplyFunc {
                continue;
            }
            if contains_placeholder_error(&step.output) {
                // Blame only the step that raised the error, not the ones
                // downstream that re-render the same failing prefix
                if contains_placeholder_error(&step.input) {
                    continue;
                }
                out.push(exec_error_diagnostic(expression, step));
            } else if contains_format_error(&step.output) {
                if contains_format_error(&step.input) {
                    continue;
                }
                out.push(anomaly_diagnostic(expression, step));
            }
        }
    }
    out
}

fn exec_error_diagnostic(expression: &str, step: &EvalStep) -> Diagnostic {
    let (signature, example) = signature_of(&step.target)
        .map(|(s, e)| (s.to_string(), e.to_string()))
        .unwrap_or_default();
    let (_, args) = parse_input_args(&step.input);
    let params = if signature.is_empty() {
        Vec::new()
    } else {
        build_param_mappings(&parse_sig_params(&signature), &args, None)
    };
    Diagnostic {
        diag_type: DiagKind::ExecError,
        func_name: step.target.clone(),
        step_num: step.num,
        expression: expression.to_string(),
        signature,
        example,
        call: step.input.clone(),
        params,
        error_msg: extract_placeholder_message(&step.output),
        output: String::new(),
    }
}

fn anomaly_diagnostic(expression: &str, step: &EvalStep) -> Diagnostic {
    let (signature, example) = signature_of(&step.target)
        .map(|(s, e)| (s.to_string(), e.to_string()))
        .unwrap_or_default();
    let (_, args) = parse_input_args(&step.input);

    let (error_msg, params) = if is_format_func(&step.target) && !args.is_empty() {
        let format = &args[0];
        let supplied = &args[1..];
        let expected = count_format_verbs(format);
        let params = if signature.is_empty() {
            Vec::new()
        } else {
            build_param_mappings(&parse_sig_params(&signature), &args, Some(expected))
        };
        (
            analyze_format_error(format, supplied.len(), &step.output),
            params,
        )
    } else {
        let params = if signature.is_empty() {
            Vec::new()
        } else {
            build_param_mappings(&parse_sig_params(&signature), &args, None)
        };
        (
            "Output contains format error pattern(s)".to_string(),
            params,
        )
    };

    Diagnostic {
        diag_type: DiagKind::OutputAnomaly,
        func_name: step.target.clone(),
        step_num: step.num,
        expression: expression.to_string(),
        signature,
        example,
        call: step.input.clone(),
        params,
        error_msg,
        output: step.output.clone(),
    }
}

/// Strip the placeholder wrapping from `<exec error: msg>` output.
fn extract_placeholder_message(output: &str) -> String {
    for prefix in [EXEC_ERROR_PREFIX, PARSE_ERROR_PREFIX] {
        if let Some(start) = output.find(prefix) {
            let rest = &output[start + prefix.len()..];
            let end = rest.find('>').unwrap_or(rest.len());
            return rest[..end].to_string();
        }
    }
    output.to_string()
}

/// Number of argument slots a format string consumes. `%%` consumes none;
/// a `*` width consumes one extra slot on top of the verb's own.
pub fn count_format_verbs(format: &str) -> usize {
    let bytes = format.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        i += 1;
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'%' {
            i += 1;
            continue;
        }
        // flags
        while i < bytes.len() && matches!(bytes[i], b'-' | b'+' | b'0' | b' ' | b'#') {
            i += 1;
        }
        // width: literal digits consume nothing extra, `*` consumes a slot
        if i < bytes.len() && bytes[i] == b'*' {
            count += 1;
            i += 1;
        } else {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i < bytes.len() {
            // the verb itself
            count += 1;
            i += 1;
        }
    }
    count
}

/// Explain a format anomaly in terms of the format string and the number of
/// arguments actually supplied.
pub fn analyze_format_error(format: &str, provided: usize, output: &str) -> String {
    if output.contains("%!(BADWIDTH)") {
        return format!(
            "format string {:?} uses a '*' width specifier but received a non-integer width argument",
            format
        );
    }
    let expected = count_format_verbs(format);
    if provided < expected {
        return format!(
            "format string {:?} expects {} argument(s), but only {} provided",
            format, expected, provided
        );
    }
    "Output contains format error pattern(s)".to_string()
}

/// One parameter parsed out of a declared signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SigParam {
    pub name: String,
    pub param_type: String,
    pub variadic: bool,
}

/// Parse the parameter list of a signature like
/// `printf(format string, args ...any) string` or `add(a, b int) int`.
/// A parameter without its own type inherits the type of the next one that
/// has one, Go-style.
pub fn parse_sig_params(signature: &str) -> Vec<SigParam> {
    let open = match signature.find('(') {
        Some(i) => i,
        None => return Vec::new(),
    };
    let close = match signature[open..].find(')') {
        Some(i) => open + i,
        None => return Vec::new(),
    };
    let list = &signature[open + 1..close];
    if list.trim().is_empty() {
        return Vec::new();
    }

    let mut params: Vec<SigParam> = list
        .split(',')
        .map(|part| {
            let part = part.trim();
            let mut words = part.split_whitespace();
            let name = words.next().unwrap_or_default().to_string();
            let ty = words.next().unwrap_or_default();
            let variadic = ty.starts_with("...");
            SigParam {
                name,
                param_type: ty.trim_start_matches("...").to_string(),
                variadic,
            }
        })
        .collect();

    // Back-fill elided types from the right
    let mut next_type: Option<(String, bool)> = None;
    for param in params.iter_mut().rev() {
        if param.param_type.is_empty() {
            if let Some((ty, variadic)) = &next_type {
                param.param_type = ty.clone();
                param.variadic = *variadic;
            }
        } else {
            next_type = Some((param.param_type.clone(), param.variadic));
        }
    }
    params
}

/// Split reconstructed call text like `printf "%s: %s" "ENGINE"` into the
/// function name and its argument values (quotes stripped, escapes undone).
pub fn parse_input_args(input: &str) -> (String, Vec<String>) {
    let mut tokens: Vec<String> = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' => i += 1,
            b'"' => {
                let mut value = String::new();
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        i += 1;
                        match bytes[i] {
                            b'n' => value.push('\n'),
                            b't' => value.push('\t'),
                            b'r' => value.push('\r'),
                            other => value.push(other as char),
                        }
                        i += 1;
                    } else {
                        let ch_len =
                            input[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                        value.push_str(&input[i..i + ch_len]);
                        i += ch_len;
                    }
                }
                i += 1;
                tokens.push(value);
            }
            _ => {
                let start = i;
                while i < bytes.len() && bytes[i] != b' ' && bytes[i] != b'\t' {
                    i += 1;
                }
                tokens.push(input[start..i].to_string());
            }
        }
    }
    if tokens.is_empty() {
        return (String::new(), Vec::new());
    }
    let func = tokens.remove(0);
    (func, tokens)
}

/// Zip declared parameters against supplied argument values. A required
/// parameter without an argument is flagged missing. A variadic parameter
/// expands to one indexed mapping per supplied value; when
/// `expected_variadic` is given (format functions, from the verb count),
/// unfilled slots are emitted as missing too.
pub fn build_param_mappings(
    params: &[SigParam],
    args: &[String],
    expected_variadic: Option<usize>,
) -> Vec<ParamMapping> {
    let mut out = Vec::new();
    let mut arg_idx = 0;

    for param in params {
        if param.variadic {
            let supplied = args.len().saturating_sub(arg_idx);
            let total = expected_variadic.unwrap_or(supplied).max(supplied);
            for j in 0..total {
                let value = args.get(arg_idx + j).cloned();
                out.push(ParamMapping {
                    name: format!("{}[{}]", param.name, j),
                    param_type: param.param_type.clone(),
                    value: value.clone().unwrap_or_default(),
                    variadic: true,
                    missing: value.is_none(),
                });
            }
            arg_idx = args.len();
        } else {
            let value = args.get(arg_idx).cloned();
            out.push(ParamMapping {
                name: param.name.clone(),
                param_type: param.param_type.clone(),
                value: value.clone().unwrap_or_default(),
                variadic: false,
                missing: value.is_none(),
            });
            arg_idx += 1;
        }
    }
    out
}

/// Actionable hints derived from the collected diagnostics, deduplicated.
pub fn generate_error_hints(diagnostics: &[Diagnostic]) -> Vec<String> {
    let mut hints = Vec::new();
    let mut push = |hint: String| {
        if !hints.contains(&hint) {
            hints.push(hint);
        }
    };

    for diag in diagnostics {
        if diag.error_msg.contains("non-integer width") {
            push(format!(
                "the '*' width in '{}' consumes one integer argument before the value it pads",
                diag.func_name
            ));
        } else if diag.error_msg.contains("but only") {
            let missing = diag.params.iter().filter(|p| p.missing).count();
            push(format!(
                "supply {} more argument(s) to '{}' to match its format string",
                missing, diag.func_name
            ));
        } else if diag.error_msg.contains("wrong number of args") {
            if diag.signature.is_empty() {
                push(format!("check the arguments of '{}'", diag.func_name));
            } else {
                push(format!(
                    "check the call against the signature: {}",
                    diag.signature
                ));
            }
        } else if diag.error_msg.contains("not defined") {
            push(format!(
                "'{}' is not a known function; check the spelling",
                diag.func_name
            ));
        } else {
            push(format!(
                "inspect step {}: '{}' produced a malformed value",
                diag.step_num, diag.func_name
            ));
        }
        if !diag.example.is_empty() {
            push(format!("example: {}", diag.example));
        }
    }
    hints
}
