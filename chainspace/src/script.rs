//! Line-oriented probe scripts: each line names one engine operation, so a
//! namespace graph can be built and inspected without a compiler in front.

use std::{collections::HashMap, fmt, sync::Arc};

use log::debug;

use crate::{
    CodeId, DefinitionContext, Namespace, NamespaceCreateInfo, NamespaceError, NamespaceId,
    Registry, Value, Visibility,
};

#[derive(Debug)]
pub enum ScriptErrorKind {
    Parse(String),
    UnknownNamespace(String),
    Namespace(NamespaceError),
}

#[derive(Debug)]
pub struct ScriptError {
    /// 1-based
    pub line: usize,
    pub kind: ScriptErrorKind,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ScriptErrorKind::Parse(message) => write!(f, "line {}: {message}", self.line),
            ScriptErrorKind::UnknownNamespace(name) => {
                write!(f, "line {}: unknown namespace `{name}`", self.line)
            }
            ScriptErrorKind::Namespace(err) => write!(f, "line {}: {err}", self.line),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ScriptErrorKind::Namespace(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NamespaceError> for ScriptErrorKind {
    fn from(value: NamespaceError) -> Self {
        Self::Namespace(value)
    }
}

pub struct Script {
    registry: Registry,
    namespaces: HashMap<String, Arc<Namespace>>,
    contexts: HashMap<NamespaceId, DefinitionContext>,
    next_code: u64,
}

type LineResult = Result<Option<String>, ScriptErrorKind>;

fn parse_error(message: impl Into<String>) -> ScriptErrorKind {
    ScriptErrorKind::Parse(message.into())
}

fn parse_visibility(word: &str) -> Result<Visibility, ScriptErrorKind> {
    match word {
        "public" => Ok(Visibility::Public),
        "private" => Ok(Visibility::Private),
        "protected" => Ok(Visibility::Protected),
        "module_function" => Ok(Visibility::ModuleFunction),
        other => Err(parse_error(format!("unknown visibility `{other}`"))),
    }
}

impl Script {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            namespaces: HashMap::new(),
            contexts: HashMap::new(),
            next_code: 0,
        }
    }

    /// Run every line of `source`, appending output lines to `out`. Stops at
    /// the first failing line.
    pub fn run(&mut self, source: &str, out: &mut Vec<String>) -> Result<(), ScriptError> {
        for (index, raw) in source.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let words: Vec<&str> = line.split_whitespace().collect();
            match self.run_line(&words) {
                Ok(Some(output)) => out.push(output),
                Ok(None) => {}
                Err(kind) => {
                    return Err(ScriptError {
                        line: index + 1,
                        kind,
                    });
                }
            }
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Arc<Namespace>, ScriptErrorKind> {
        self.namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptErrorKind::UnknownNamespace(name.to_string()))
    }

    fn next_code(&mut self) -> CodeId {
        self.next_code += 1;
        CodeId(self.next_code)
    }

    fn parse_value(&self, word: &str) -> Value {
        if let Ok(n) = word.parse::<i64>() {
            return Value::Fixnum(n);
        }
        match word {
            "nil" => Value::Nil,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => {
                if let Some(ns) = self.namespaces.get(word) {
                    Value::Namespace(ns.clone())
                } else if let Some(symbol) = word.strip_prefix(':') {
                    Value::Symbol(self.registry.intern(symbol))
                } else {
                    Value::from(word)
                }
            }
        }
    }

    fn run_line(&mut self, words: &[&str]) -> LineResult {
        debug!("probe: {}", words.join(" "));
        match words {
            ["module", name, rest @ ..] => self.create(name, None, rest, false),
            ["class", name, "<", superclass, rest @ ..] => {
                self.create(name, Some(*superclass), rest, true)
            }
            ["class", name, rest @ ..] => self.create(name, None, rest, true),
            ["def", ns, method, rest @ ..] => {
                let ns = self.get(ns)?;
                let code = self.next_code();
                match rest {
                    [] => {
                        let ctx = self.contexts.get(&ns.id()).copied().unwrap_or_default();
                        ns.define_in_context(&ctx, method, code)?;
                    }
                    [visibility] => ns.define(method, parse_visibility(visibility)?, code)?,
                    _ => return Err(parse_error("usage: def NS METHOD [VISIBILITY]")),
                }
                Ok(None)
            }
            ["remove", ns, method] => {
                self.get(ns)?.remove_method(method)?;
                Ok(None)
            }
            ["undef", ns, method] => {
                self.get(ns)?.undefine(method)?;
                Ok(None)
            }
            ["alias", ns, new_name, old_name] => {
                self.get(ns)?.alias(new_name, old_name)?;
                Ok(None)
            }
            ["visibility", ns, visibility, methods @ ..] => {
                let ns = self.get(ns)?;
                let visibility = parse_visibility(visibility)?;
                let ctx = self.contexts.entry(ns.id()).or_default();
                ns.set_visibility(ctx, methods, visibility)?;
                Ok(None)
            }
            ["include", ns, module] => {
                let module = self.get(module)?;
                self.get(ns)?.include(&module)?;
                Ok(None)
            }
            ["append", ns, other] => {
                let other = self.get(other)?;
                self.get(ns)?.append_features(&other)?;
                Ok(None)
            }
            ["const", ns, name, value] => {
                let value = self.parse_value(value);
                self.get(ns)?.set_constant(name, value)?;
                Ok(None)
            }
            ["private_const", ns, name] => {
                self.get(ns)?.set_constant_private(name)?;
                Ok(None)
            }
            ["remove_const", ns, name] => {
                self.get(ns)?.remove_constant(name)?;
                Ok(None)
            }
            ["cvar", ns, name, value] => {
                let value = self.parse_value(value);
                self.get(ns)?.set_shared_variable(name, value)?;
                Ok(None)
            }
            ["remove_cvar", ns, name] => {
                self.get(ns)?.remove_shared_variable(name)?;
                Ok(None)
            }
            ["freeze", ns] => {
                self.get(ns)?.freeze();
                Ok(None)
            }
            ["lookup", ns_name, method] => {
                let ns = self.get(ns_name)?;
                let result = match ns.lookup_method(method) {
                    None => "not found".to_string(),
                    Some(found) if found.is_undefined() => format!("undefined ({})", found.owner),
                    Some(found) => format!("{}#{} ({})", found.owner, found.name, found.visibility),
                };
                Ok(Some(format!("{ns_name}#{method} -> {result}")))
            }
            ["constant", ns_name, name] => {
                let ns = self.get(ns_name)?;
                let result = match ns.lookup_constant(name) {
                    None => "not found".to_string(),
                    Some(entry) if entry.is_private() => format!("{} (private)", entry.value()),
                    Some(entry) => entry.value().to_string(),
                };
                Ok(Some(format!("{ns_name}::{name} -> {result}")))
            }
            ["cvar?", ns_name, name] => {
                let ns = self.get(ns_name)?;
                let result = ns
                    .lookup_shared_variable(name)
                    .map_or_else(|| "not found".to_string(), |value| value.to_string());
                Ok(Some(format!("{ns_name} {name} -> {result}")))
            }
            ["methods", ns_name] => {
                let names: Vec<String> = self
                    .get(ns_name)?
                    .method_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                Ok(Some(format!("{ns_name}: {}", names.join(" "))))
            }
            ["ancestors", ns_name] => {
                let names: Vec<String> = self
                    .get(ns_name)?
                    .ancestors()
                    .iter()
                    .map(|ns| ns.display_name())
                    .collect();
                Ok(Some(names.join(", ")))
            }
            ["version", ns_name] => {
                let version = self.get(ns_name)?.version();
                Ok(Some(format!("{ns_name} {version}")))
            }
            [command, ..] => Err(parse_error(format!("unknown or malformed command `{command}`"))),
            [] => Ok(None),
        }
    }

    fn create(
        &mut self,
        name: &str,
        superclass: Option<&str>,
        rest: &[&str],
        is_class: bool,
    ) -> LineResult {
        let lexical_parent = match rest {
            [] => None,
            ["in", parent] => Some(self.get(parent)?),
            _ => return Err(parse_error("expected `in PARENT` or end of line")),
        };
        let superclass = superclass.map(|s| self.get(s)).transpose()?;

        let info = NamespaceCreateInfo {
            name: Some(name),
            lexical_parent: lexical_parent.as_ref(),
            superclass: superclass.as_ref(),
            allocator: None,
        };
        let ns = if is_class {
            self.registry.create_class(info)?
        } else {
            self.registry.create_module(info)?
        };
        self.namespaces.insert(name.to_string(), ns);
        Ok(None)
    }
}
