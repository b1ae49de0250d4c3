//! Script runtime seam
//!
//! The UI core never parses script text. Widget windows, bindings and the
//! command line hand opaque `Code` blocks to a `ScriptRuntime` and read back a
//! `Value`. `NativeRuntime` is the in-crate runtime: closures for UI blocks and
//! a tiny command dispatcher for plain statements.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ui::build::UiBuilder;

/// A script value (int, float, string or nothing)
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Int(i32),
    Float(f32),
    Str(String),
}

impl Value {
    pub fn as_float(&self) -> f32 {
        match self {
            Value::Null => 0.0,
            Value::Int(i) => *i as f32,
            Value::Float(f) => *f,
            Value::Str(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    pub fn as_int(&self) -> i32 {
        match self {
            Value::Null => 0,
            Value::Int(i) => *i,
            Value::Float(f) => *f as i32,
            Value::Str(s) => {
                let s = s.trim();
                s.parse::<i32>()
                    .or_else(|_| s.parse::<f32>().map(|f| f as i32))
                    .unwrap_or(0)
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty() && s != "0",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", float_str(*v)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(b as i32)
    }
}

/// Integral floats keep one decimal so they read back as floats.
pub fn float_str(v: f32) -> String {
    if v.fract() == 0.0 && v.abs() < 1e9 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

pub type BuildFn = Rc<dyn Fn(&mut dyn ScriptRuntime, &mut UiBuilder<'_>) -> Value>;
pub type ActionFn = Rc<dyn Fn(&mut dyn ScriptRuntime) -> Value>;

/// An opaque compiled block.
///
/// `Exit` is the empty block: building a container from it clears the
/// container without calling into the runtime.
#[derive(Clone, Default)]
pub enum Code {
    #[default]
    Exit,
    Source(Rc<str>),
    Build(BuildFn),
    Action(ActionFn),
}

impl Code {
    pub fn source(text: &str) -> Self {
        if text.trim().is_empty() {
            Code::Exit
        } else {
            Code::Source(Rc::from(text))
        }
    }

    pub fn build<F>(f: F) -> Self
    where
        F: Fn(&mut dyn ScriptRuntime, &mut UiBuilder<'_>) -> Value + 'static,
    {
        Code::Build(Rc::new(f))
    }

    pub fn action<F>(f: F) -> Self
    where
        F: Fn(&mut dyn ScriptRuntime) -> Value + 'static,
    {
        Code::Action(Rc::new(f))
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Code::Exit)
    }

    /// Source text, if the block came from text
    pub fn text(&self) -> Option<&str> {
        match self {
            Code::Source(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Exit => f.write_str("Code::Exit"),
            Code::Source(s) => write!(f, "Code::Source({:?})", s),
            Code::Build(_) => f.write_str("Code::Build(..)"),
            Code::Action(_) => f.write_str("Code::Action(..)"),
        }
    }
}

/// The script engine as seen by the UI, console and bindings
pub trait ScriptRuntime {
    /// Run a block while a UI build is in progress.
    fn execute_build(&mut self, code: &Code, ui: &mut UiBuilder<'_>) -> Value;

    /// Run a block outside of any UI build (bindings, command line, window hooks).
    fn execute(&mut self, code: &Code) -> Value;

    fn execute_str(&mut self, source: &str) -> Value {
        self.execute(&Code::source(source))
    }

    /// Invoke a named command with already-typed arguments.
    fn execute_command(&mut self, name: &str, args: &[Value]) -> Value;

    /// Set a string alias (used for `commandbuf` before running a prompt action).
    fn set_alias(&mut self, name: &str, value: &str);

    fn get_var(&self, name: &str) -> Option<Value>;

    fn set_var(&mut self, name: &str, value: Value);

    /// (min, max) for a bounded numeric variable
    fn var_bounds(&self, name: &str) -> Option<(f32, f32)>;

    /// Every identifier name, for command-name completion.
    fn ident_names(&self) -> Vec<String>;
}

pub type CommandFn = Box<dyn FnMut(&[Value]) -> Value>;

struct Var {
    value: Value,
    bounds: Option<(f32, f32)>,
}

const MAX_ALIAS_DEPTH: usize = 32;

/// Closure-backed runtime.
///
/// Text statements are `name arg arg; name arg`, where an argument may be
/// `"quoted"`, `[bracketed]` or `$alias`. Names resolve to registered
/// commands, then aliases, then variables.
#[derive(Default)]
pub struct NativeRuntime {
    commands: HashMap<String, CommandFn>,
    vars: HashMap<String, Var>,
    aliases: HashMap<String, String>,
    /// Every statement run, newest last
    pub executed: Vec<String>,
    depth: usize,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: FnMut(&[Value]) -> Value + 'static,
    {
        self.commands.insert(name.to_string(), Box::new(f));
    }

    pub fn define_var(&mut self, name: &str, value: Value, bounds: Option<(f32, f32)>) {
        self.vars.insert(name.to_string(), Var { value, bounds });
    }

    pub fn alias_value(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    fn run_statement(&mut self, stmt: &str) -> Value {
        let words = explode_list(stmt);
        let Some((name, rest)) = words.split_first() else {
            return Value::Null;
        };
        let args: Vec<Value> = rest
            .iter()
            .map(|w| match w.strip_prefix('$') {
                Some(id) => self
                    .aliases
                    .get(id)
                    .cloned()
                    .map(Value::Str)
                    .or_else(|| self.vars.get(id).map(|v| v.value.clone()))
                    .unwrap_or_default(),
                None => Value::Str(w.clone()),
            })
            .collect();
        self.executed.push(stmt.trim().to_string());

        if let Some(cmd) = self.commands.get_mut(name) {
            return cmd(&args);
        }
        if let Some(body) = self.aliases.get(name).cloned() {
            if self.depth >= MAX_ALIAS_DEPTH {
                tracing::warn!("Alias recursion limit hit in '{}'", name);
                return Value::Null;
            }
            self.depth += 1;
            let result = self.run_source(&body);
            self.depth -= 1;
            return result;
        }
        if let Some(var) = self.vars.get_mut(name) {
            match args.first() {
                Some(v) => var.value = clamp_to_bounds(v.clone(), &var.value, var.bounds),
                None => return var.value.clone(),
            }
            return Value::Null;
        }
        tracing::warn!("Unknown command: {}", name);
        Value::Null
    }

    fn run_source(&mut self, source: &str) -> Value {
        let mut result = Value::Null;
        for stmt in split_statements(source) {
            result = self.run_statement(&stmt);
        }
        result
    }
}

fn clamp_to_bounds(value: Value, current: &Value, bounds: Option<(f32, f32)>) -> Value {
    let Some((lo, hi)) = bounds else {
        return value;
    };
    match current {
        Value::Int(_) => Value::Int((value.as_int() as f32).clamp(lo, hi) as i32),
        Value::Float(_) => Value::Float(value.as_float().clamp(lo, hi)),
        _ => value,
    }
}

impl ScriptRuntime for NativeRuntime {
    fn execute_build(&mut self, code: &Code, ui: &mut UiBuilder<'_>) -> Value {
        match code {
            Code::Build(f) => f(self, ui),
            _ => self.execute(code),
        }
    }

    fn execute(&mut self, code: &Code) -> Value {
        match code {
            Code::Exit => Value::Null,
            Code::Source(src) => self.run_source(src),
            Code::Action(f) => f(self),
            Code::Build(_) => {
                tracing::warn!("UI block executed outside of a UI build");
                Value::Null
            }
        }
    }

    fn execute_command(&mut self, name: &str, args: &[Value]) -> Value {
        let line = std::iter::once(name.to_string())
            .chain(args.iter().map(|a| a.to_string()))
            .collect::<Vec<_>>()
            .join(" ");
        self.executed.push(line);
        match self.commands.get_mut(name) {
            Some(cmd) => cmd(args),
            None => {
                tracing::warn!("Unknown command: {}", name);
                Value::Null
            }
        }
    }

    fn set_alias(&mut self, name: &str, value: &str) {
        self.aliases.insert(name.to_string(), value.to_string());
    }

    fn get_var(&self, name: &str) -> Option<Value> {
        self.vars.get(name).map(|v| v.value.clone())
    }

    fn set_var(&mut self, name: &str, value: Value) {
        match self.vars.get_mut(name) {
            Some(var) => var.value = clamp_to_bounds(value, &var.value, var.bounds),
            None => {
                self.vars.insert(name.to_string(), Var { value, bounds: None });
            }
        }
    }

    fn var_bounds(&self, name: &str) -> Option<(f32, f32)> {
        self.vars.get(name).and_then(|v| v.bounds)
    }

    fn ident_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .keys()
            .chain(self.vars.keys())
            .chain(self.aliases.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Split source on `;` and newlines outside quotes and brackets.
fn split_statements(source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut depth = 0usize;
    let mut quoted = false;
    for c in source.chars() {
        match c {
            '"' => quoted = !quoted,
            '[' | '(' if !quoted => depth += 1,
            ']' | ')' if !quoted => depth = depth.saturating_sub(1),
            ';' | '\n' if !quoted && depth == 0 => {
                if !cur.trim().is_empty() {
                    out.push(std::mem::take(&mut cur));
                }
                cur.clear();
                continue;
            }
            _ => {}
        }
        cur.push(c);
    }
    if !cur.trim().is_empty() {
        out.push(cur);
    }
    out
}

/// Split a whitespace separated list, keeping `"quoted"` and `[bracketed]`
/// elements whole (without their delimiters).
pub fn explode_list(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut item = String::new();
        match first {
            '"' => {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '^' => match chars.next() {
                            Some('n') => item.push('\n'),
                            Some('t') => item.push('\t'),
                            Some('f') => item.push('\x0c'),
                            Some(other) => item.push(other),
                            None => break,
                        },
                        _ => item.push(c),
                    }
                }
            }
            '[' | '(' => {
                let (open, close) = if first == '[' { ('[', ']') } else { ('(', ')') };
                chars.next();
                let mut depth = 1;
                for c in chars.by_ref() {
                    if c == open {
                        depth += 1;
                    } else if c == close {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    item.push(c);
                }
            }
            _ => {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    item.push(c);
                    chars.next();
                }
            }
        }
        out.push(item);
    }
    out
}

/// Quote a string, escaping `\n \t \f " ^` with `^`.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("^n"),
            '\t' => out.push_str("^t"),
            '\x0c' => out.push_str("^f"),
            '"' => out.push_str("^\""),
            '^' => out.push_str("^^"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote an identifier only if it would not parse as a bare word.
pub fn escape_id(s: &str) -> String {
    let needs_quotes = s
        .chars()
        .any(|c| matches!(c, '"' | '/' | ';' | '(' | ')' | '[' | ']' | '@') || c.is_whitespace());
    if needs_quotes {
        escape_string(s)
    } else {
        s.to_string()
    }
}

const MAX_BRACKET_DEPTH: usize = 100;

/// True if `s` can be written verbatim inside `[...]` and read back unchanged.
pub fn validate_block(s: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    let bytes: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            '[' | '(' => {
                if stack.len() >= MAX_BRACKET_DEPTH {
                    return false;
                }
                stack.push(bytes[i]);
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            '"' => {
                i += 1;
                loop {
                    match bytes.get(i) {
                        None | Some('\r') | Some('\n') => return false,
                        Some('"') => break,
                        Some('^') => i += 2,
                        Some(_) => i += 1,
                    }
                }
            }
            '/' if bytes.get(i + 1) == Some(&'/') => return false,
            '@' | '\x0c' => return false,
            _ => {}
        }
        i += 1;
    }
    stack.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("say \"hi\""), "\"say ^\"hi^\"\"");
        assert_eq!(escape_string("a\nb^"), "\"a^nb^^\"");
    }

    #[test]
    fn test_escape_id() {
        assert_eq!(escape_id("forward"), "forward");
        assert_eq!(escape_id("two words"), "\"two words\"");
        assert_eq!(escape_id("a;b"), "\"a;b\"");
    }

    #[test]
    fn test_validate_block() {
        assert!(validate_block("say hello"));
        assert!(validate_block("if (x) [echo \"a]\"]"));
        assert!(!validate_block("echo ]"));
        assert!(!validate_block("echo [ (]"));
        assert!(!validate_block("echo \"unterminated"));
        assert!(!validate_block("echo // comment"));
        assert!(!validate_block("echo @x"));
    }

    #[test]
    fn test_explode_list() {
        assert_eq!(
            explode_list("one \"two three\" [four five] six"),
            vec!["one", "two three", "four five", "six"]
        );
        assert!(explode_list("   ").is_empty());
    }

    #[test]
    fn test_native_runtime_dispatch() {
        let said = Rc::new(RefCell::new(Vec::new()));
        let sink = said.clone();
        let mut rt = NativeRuntime::new();
        rt.register("say", move |args| {
            let text: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            sink.borrow_mut().push(text.join(" "));
            Value::Null
        });
        rt.set_alias("greet", "say hello; say there");

        rt.execute_str("greet");
        rt.execute_str("say [quoted words]");

        assert_eq!(*said.borrow(), vec!["hello", "there", "quoted words"]);
    }

    #[test]
    fn test_native_runtime_vars_clamp() {
        let mut rt = NativeRuntime::new();
        rt.define_var("volume", Value::Int(5), Some((0.0, 10.0)));
        rt.execute_str("volume 20");
        assert_eq!(rt.get_var("volume"), Some(Value::Int(10)));
        assert_eq!(rt.execute_str("volume"), Value::Int(10));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::from("7").as_int(), 7);
        assert!(!Value::from("0").is_truthy());
    }
}
