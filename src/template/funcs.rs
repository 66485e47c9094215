//! Built-in template functions
//!
//! The function table mirrors the string/number helpers a taskfile template
//! can call. `printf` follows C-style formatting semantics, including the
//! anomaly markers emitted for under-supplied arguments (`%!s(MISSING)`) and
//! non-integer dynamic widths (`%!(BADWIDTH)`), which the diagnostics engine
//! later detects in rendered output.

use std::collections::BTreeMap;

use crate::template::value::Value;

/// A registered template function.
pub struct FuncDef {
    pub name: &'static str,
    /// Human-readable signature shown in diagnostics.
    pub signature: &'static str,
    /// Example usage shown in diagnostics.
    pub example: &'static str,
    /// Required argument count (variadic functions may take more).
    pub arity: usize,
    pub variadic: bool,
    call: fn(&[Value]) -> Result<Value, String>,
}

impl FuncDef {
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        if args.len() < self.arity || (!self.variadic && args.len() > self.arity) {
            return Err(format!(
                "wrong number of args for {}: want {} got {}",
                self.name, self.arity, args.len()
            ));
        }
        (self.call)(args)
    }
}

/// The function table used by the built-in engine.
pub struct FuncMap {
    funcs: BTreeMap<&'static str, FuncDef>,
}

impl FuncMap {
    pub fn get(&self, name: &str) -> Option<&FuncDef> {
        self.funcs.get(name)
    }

}

impl Default for FuncMap {
    fn default() -> Self {
        builtin_funcs()
    }
}

/// Signature and example for a function name, for diagnostic hints. Static
/// so the diagnostics engine can consult it without an engine instance.
pub fn signature_of(name: &str) -> Option<(&'static str, &'static str)> {
    builtin_funcs()
        .funcs
        .get(name)
        .map(|f| (f.signature, f.example))
}

/// Functions whose multi-argument call shape surprises users when piped.
pub fn is_multi_arg_func(name: &str) -> bool {
    matches!(name, "printf" | "print" | "println" | "replace" | "join" | "split")
}

/// Functions that require numeric arguments.
pub fn is_numeric_func(name: &str) -> bool {
    matches!(name, "add" | "sub" | "mul" | "div" | "mod")
}

/// Format-style functions whose output can carry C-style anomaly markers.
pub fn is_format_func(name: &str) -> bool {
    matches!(name, "printf" | "print" | "println")
}

fn str_arg(v: &Value) -> String {
    v.render_string()
}

fn int_arg(v: &Value) -> Result<i64, String> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected integer, got {:?}", s)),
        other => Err(format!("expected integer, got {}", other.type_label())),
    }
}

macro_rules! numeric_func {
    ($name:ident, $method:ident, $label:expr, $checks_zero:expr) => {
        fn $name(args: &[Value]) -> Result<Value, String> {
            let a = int_arg(&args[0])?;
            let b = int_arg(&args[1])?;
            if $checks_zero && b == 0 {
                return Err("division by zero".to_string());
            }
            a.$method(b)
                .map(Value::Int)
                .ok_or_else(|| format!("integer overflow in {}", $label))
        }
    };
}

numeric_func!(f_add, checked_add, "add", false);
numeric_func!(f_sub, checked_sub, "sub", false);
numeric_func!(f_mul, checked_mul, "mul", false);
numeric_func!(f_div, checked_div, "div", true);
numeric_func!(f_mod, checked_rem, "mod", true);

fn builtin_funcs() -> FuncMap {
    let mut funcs = BTreeMap::new();
    let mut add = |def: FuncDef| {
        funcs.insert(def.name, def);
    };

    add(FuncDef {
        name: "trim",
        signature: "trim(s string) string",
        example: "{{.VAR | trim}}",
        arity: 1,
        variadic: false,
        call: |args| Ok(Value::Str(str_arg(&args[0]).trim().to_string())),
    });
    add(FuncDef {
        name: "upper",
        signature: "upper(s string) string",
        example: "{{.VAR | upper}}",
        arity: 1,
        variadic: false,
        call: |args| Ok(Value::Str(str_arg(&args[0]).to_uppercase())),
    });
    add(FuncDef {
        name: "lower",
        signature: "lower(s string) string",
        example: "{{.VAR | lower}}",
        arity: 1,
        variadic: false,
        call: |args| Ok(Value::Str(str_arg(&args[0]).to_lowercase())),
    });
    add(FuncDef {
        name: "title",
        signature: "title(s string) string",
        example: "{{.VAR | title}}",
        arity: 1,
        variadic: false,
        call: |args| Ok(Value::Str(title_case(&str_arg(&args[0])))),
    });
    add(FuncDef {
        name: "quote",
        signature: "quote(s string) string",
        example: "{{.VAR | quote}}",
        arity: 1,
        variadic: false,
        call: |args| Ok(Value::Str(format!("{:?}", str_arg(&args[0])))),
    });
    add(FuncDef {
        name: "squote",
        signature: "squote(s string) string",
        example: "{{.VAR | squote}}",
        arity: 1,
        variadic: false,
        call: |args| Ok(Value::Str(format!("'{}'", str_arg(&args[0])))),
    });
    add(FuncDef {
        name: "trimPrefix",
        signature: "trimPrefix(prefix string, s string) string",
        example: "{{trimPrefix \"v\" .VERSION}}",
        arity: 2,
        variadic: false,
        call: |args| {
            let prefix = str_arg(&args[0]);
            let s = str_arg(&args[1]);
            Ok(Value::Str(
                s.strip_prefix(&prefix).unwrap_or(&s).to_string(),
            ))
        },
    });
    add(FuncDef {
        name: "trimSuffix",
        signature: "trimSuffix(suffix string, s string) string",
        example: "{{trimSuffix \".exe\" .FILE}}",
        arity: 2,
        variadic: false,
        call: |args| {
            let suffix = str_arg(&args[0]);
            let s = str_arg(&args[1]);
            Ok(Value::Str(
                s.strip_suffix(&suffix).unwrap_or(&s).to_string(),
            ))
        },
    });
    add(FuncDef {
        name: "replace",
        signature: "replace(old string, new string, s string) string",
        example: "{{replace \"-\" \"_\" .VAR}}",
        arity: 3,
        variadic: false,
        call: |args| {
            let old = str_arg(&args[0]);
            let new = str_arg(&args[1]);
            Ok(Value::Str(str_arg(&args[2]).replace(&old, &new)))
        },
    });
    add(FuncDef {
        name: "contains",
        signature: "contains(substr string, s string) bool",
        example: "{{if contains \"test\" .VAR}}...{{end}}",
        arity: 2,
        variadic: false,
        call: |args| {
            let needle = str_arg(&args[0]);
            Ok(Value::Bool(str_arg(&args[1]).contains(&needle)))
        },
    });
    add(FuncDef {
        name: "default",
        signature: "default(defaultVal any, val any) any",
        example: "{{default \"fallback\" .VAR}}",
        arity: 2,
        variadic: false,
        call: |args| {
            let empty = match &args[1] {
                Value::Nil => true,
                Value::Str(s) => s.is_empty(),
                _ => false,
            };
            Ok(if empty { args[0].clone() } else { args[1].clone() })
        },
    });
    add(FuncDef {
        name: "join",
        signature: "join(sep string, list []string) string",
        example: "{{join \",\" .LIST}}",
        arity: 2,
        variadic: false,
        call: |args| {
            let sep = str_arg(&args[0]);
            match &args[1] {
                Value::List(items) => {
                    let parts: Vec<String> = items.iter().map(Value::render_string).collect();
                    Ok(Value::Str(parts.join(&sep)))
                }
                other => Ok(Value::Str(other.render_string())),
            }
        },
    });
    add(FuncDef {
        name: "split",
        signature: "split(sep string, s string) []string",
        example: "{{split \",\" .LIST}}",
        arity: 2,
        variadic: false,
        call: |args| {
            let sep = str_arg(&args[0]);
            let s = str_arg(&args[1]);
            let items: Vec<Value> = s.split(&sep as &str).map(Value::from).collect();
            Ok(Value::List(std::sync::Arc::new(items)))
        },
    });
    add(FuncDef {
        name: "len",
        signature: "len(v any) int",
        example: "{{len .LIST}}",
        arity: 1,
        variadic: false,
        call: |args| {
            let n = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                Value::Nil => 0,
                _ => return Err("len of non-collection value".to_string()),
            };
            Ok(Value::Int(n as i64))
        },
    });
    add(FuncDef {
        name: "add",
        signature: "add(a, b int) int",
        example: "{{add .X 1}}",
        arity: 2,
        variadic: false,
        call: f_add,
    });
    add(FuncDef {
        name: "sub",
        signature: "sub(a, b int) int",
        example: "{{sub .X 1}}",
        arity: 2,
        variadic: false,
        call: f_sub,
    });
    add(FuncDef {
        name: "mul",
        signature: "mul(a, b int) int",
        example: "{{mul .X 2}}",
        arity: 2,
        variadic: false,
        call: f_mul,
    });
    add(FuncDef {
        name: "div",
        signature: "div(a, b int) int",
        example: "{{div .X 2}}",
        arity: 2,
        variadic: false,
        call: f_div,
    });
    add(FuncDef {
        name: "mod",
        signature: "mod(a, b int) int",
        example: "{{mod .X 2}}",
        arity: 2,
        variadic: false,
        call: f_mod,
    });
    add(FuncDef {
        name: "printf",
        signature: "printf(format string, args ...any) string",
        example: "{{printf \"%s: %s\" .KEY .VALUE}}",
        arity: 1,
        variadic: true,
        call: |args| Ok(Value::Str(sprintf(&str_arg(&args[0]), &args[1..]))),
    });
    add(FuncDef {
        name: "print",
        signature: "print(args ...any) string",
        example: "{{print .A \" \" .B}}",
        arity: 0,
        variadic: true,
        call: |args| {
            let parts: Vec<String> = args.iter().map(Value::render_string).collect();
            Ok(Value::Str(parts.join("")))
        },
    });
    add(FuncDef {
        name: "println",
        signature: "println(args ...any) string",
        example: "{{println .A .B}}",
        arity: 0,
        variadic: true,
        call: |args| {
            let parts: Vec<String> = args.iter().map(Value::render_string).collect();
            Ok(Value::Str(format!("{}\n", parts.join(" "))))
        },
    });

    FuncMap { funcs }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// C-style string formatting over `Value` arguments.
///
/// Supported verbs: `%s` `%d` `%v` `%q` `%t` `%f` `%x`, optional `-` flag
/// and a numeric or `*` (dynamic) width. A verb with no argument left emits
/// `%!<verb>(MISSING)`; a `*` width whose argument is not an integer emits
/// `%!(BADWIDTH)` and still consumes the slot.
/// Upper bound on padding width so a dynamic `*` width cannot request an
/// absurd allocation.
const MAX_PAD_WIDTH: usize = 1 << 16;

pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
                continue;
            }
            None => {
                out.push('%');
                break;
            }
            _ => {}
        }

        // Flags
        let mut left_align = false;
        while let Some(&f) = chars.peek() {
            match f {
                '-' => {
                    left_align = true;
                    chars.next();
                }
                '+' | ' ' | '0' | '#' => {
                    chars.next();
                }
                _ => break,
            }
        }

        // Width: literal digits or dynamic '*'
        let mut width: Option<usize> = None;
        let mut bad_width = false;
        if chars.peek() == Some(&'*') {
            chars.next();
            match args.get(next_arg) {
                Some(Value::Int(n)) if *n >= 0 => {
                    width = Some((*n as usize).min(MAX_PAD_WIDTH))
                }
                Some(_) => bad_width = true,
                None => bad_width = true,
            }
            if next_arg < args.len() {
                next_arg += 1;
            }
        } else {
            let mut digits = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            if !digits.is_empty() {
                width = digits.parse::<usize>().ok().map(|w| w.min(MAX_PAD_WIDTH));
            }
        }

        let verb = match chars.next() {
            Some(v) => v,
            None => break,
        };

        if bad_width {
            out.push_str("%!(BADWIDTH)");
        }

        let formatted = match args.get(next_arg) {
            None => {
                out.push_str(&format!("%!{}(MISSING)", verb));
                continue;
            }
            Some(arg) => {
                next_arg += 1;
                match verb {
                    's' | 'v' => arg.render_string(),
                    'd' | 'x' => match arg {
                        Value::Int(i) => {
                            if verb == 'x' {
                                format!("{:x}", i)
                            } else {
                                i.to_string()
                            }
                        }
                        other => format!("%!{}({})", verb, other.render_string()),
                    },
                    'q' => format!("{:?}", arg.render_string()),
                    't' => match arg {
                        Value::Bool(b) => b.to_string(),
                        other => format!("%!t({})", other.render_string()),
                    },
                    'f' => match arg {
                        Value::Float(x) => format!("{:.6}", x),
                        Value::Int(i) => format!("{:.6}", *i as f64),
                        other => format!("%!f({})", other.render_string()),
                    },
                    other_verb => format!("%!{}({})", other_verb, arg.render_string()),
                }
            }
        };

        match width {
            Some(w) if formatted.len() < w => {
                let pad = " ".repeat(w - formatted.len());
                if left_align {
                    out.push_str(&formatted);
                    out.push_str(&pad);
                } else {
                    out.push_str(&pad);
                    out.push_str(&formatted);
                }
            }
            _ => out.push_str(&formatted),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprintf_basic() {
        assert_eq!(
            sprintf("%s: %d", &[Value::from("port"), Value::Int(8080)]),
            "port: 8080"
        );
    }

    #[test]
    fn test_sprintf_missing_arg() {
        assert_eq!(
            sprintf("%s %s", &[Value::from("hello")]),
            "hello %!s(MISSING)"
        );
    }

    #[test]
    fn test_sprintf_dynamic_width() {
        assert_eq!(
            sprintf("%s: %*s", &[Value::from("ENGINE"), Value::Int(20), Value::from("node")]),
            "ENGINE:                 node"
        );
    }

    #[test]
    fn test_sprintf_bad_width() {
        // Non-integer width argument: BADWIDTH marker, slot still consumed,
        // value slot now missing.
        assert_eq!(
            sprintf("%s: %*s", &[Value::from("ENGINE"), Value::from(".SPACE")]),
            "ENGINE: %!(BADWIDTH)%!s(MISSING)"
        );
    }

    #[test]
    fn test_sprintf_percent_literal() {
        assert_eq!(sprintf("100%%", &[]), "100%");
    }

    #[test]
    fn test_sprintf_left_align() {
        assert_eq!(sprintf("%-6s|", &[Value::from("ab")]), "ab    |");
    }

    #[test]
    fn test_func_arity_error() {
        let funcs = FuncMap::default();
        let err = funcs.get("trim").unwrap().call(&[]).unwrap_err();
        assert!(err.contains("wrong number of args for trim: want 1 got 0"));
    }

    #[test]
    fn test_trim_upper() {
        let funcs = FuncMap::default();
        let v = funcs
            .get("trim")
            .unwrap()
            .call(&[Value::from("  hello  ")])
            .unwrap();
        assert_eq!(v, Value::from("hello"));
        let v = funcs.get("upper").unwrap().call(&[v]).unwrap();
        assert_eq!(v, Value::from("HELLO"));
    }

    #[test]
    fn test_default_func() {
        let funcs = FuncMap::default();
        let v = funcs
            .get("default")
            .unwrap()
            .call(&[Value::from("fallback"), Value::Nil])
            .unwrap();
        assert_eq!(v, Value::from("fallback"));
        let v = funcs
            .get("default")
            .unwrap()
            .call(&[Value::from("fallback"), Value::from("set")])
            .unwrap();
        assert_eq!(v, Value::from("set"));
    }

    #[test]
    fn test_numeric_funcs() {
        let funcs = FuncMap::default();
        let v = funcs
            .get("add")
            .unwrap()
            .call(&[Value::Int(2), Value::Int(3)])
            .unwrap();
        assert_eq!(v, Value::Int(5));
        assert!(funcs
            .get("div")
            .unwrap()
            .call(&[Value::Int(1), Value::Int(0)])
            .is_err());
    }

    #[test]
    fn test_numeric_overflow_is_an_error() {
        let funcs = FuncMap::default();
        let err = funcs
            .get("add")
            .unwrap()
            .call(&[Value::Int(i64::MAX), Value::Int(1)])
            .unwrap_err();
        assert!(err.contains("integer overflow in add"));
        let err = funcs
            .get("mul")
            .unwrap()
            .call(&[Value::Int(i64::MIN), Value::Int(-1)])
            .unwrap_err();
        assert!(err.contains("integer overflow in mul"));
    }

    #[test]
    fn test_sprintf_width_is_capped() {
        let out = sprintf("%*s|", &[Value::Int(i64::MAX), Value::from("x")]);
        assert!(out.len() <= MAX_PAD_WIDTH + 2);
        assert!(out.ends_with("x|"));
    }

    #[test]
    fn test_signature_of() {
        let (sig, example) = signature_of("printf").unwrap();
        assert_eq!(sig, "printf(format string, args ...any) string");
        assert!(example.contains("printf"));
        assert!(signature_of("unknownFunc").is_none());
    }
}
