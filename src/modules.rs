//! Module declarations and the per-context module registry.
//!
//! `(module name (export ...) body...)` evaluates its body in a child scope and
//! registers the exported bindings under `name`. `import` copies a registered
//! module's exports into the current scope. `require` evaluates a source file
//! once, remembers the module it declared, and binds its exports in full, under
//! an alias, or selectively. `load` evaluates a file straight into the current
//! scope.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::Error;
use crate::ast::{Expr, RequireModifier};
use crate::environment::Environment;
use crate::evaluator::{Context, eval_sequence};
use crate::value::Value;

/// The exported bindings of an evaluated module
#[derive(Debug)]
pub struct Module {
    name: String,
    exports: Vec<String>,
    bindings: HashMap<String, Value>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exported names in declaration order
    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    /// Value of one exported binding
    pub fn export(&self, name: &str) -> Result<Value, Error> {
        self.bindings
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ExportNotFound {
                module: self.name.clone(),
                name: name.to_owned(),
            })
    }

    /// Bind every export, unqualified, in `env`
    fn copy_exports_to_env(&self, env: &Environment) {
        for name in &self.exports {
            if let Some(value) = self.bindings.get(name) {
                env.define(name.as_str(), value.clone());
            }
        }
    }

    /// Bind exactly `names` in `env`; nothing is bound if any name is not exported
    fn copy_selected_to_env(&self, names: &[String], env: &Environment) -> Result<(), Error> {
        let selected = names
            .iter()
            .map(|name| self.export(name).map(|value| (name, value)))
            .collect::<Result<Vec<_>, Error>>()?;
        for (name, value) in selected {
            env.define(name.as_str(), value);
        }
        Ok(())
    }
}

/// A file currently being evaluated by `require`
#[derive(Debug)]
struct PendingFile {
    filename: String,
    declared: Option<Rc<Module>>,
}

/// Registered modules, required files, and the chain of files being loaded
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Rc<Module>>,
    files: HashMap<String, Rc<Module>>,
    loading: Vec<PendingFile>,
}

impl ModuleRegistry {
    /// Look up a module by its declared name
    pub fn get(&self, name: &str) -> Option<Rc<Module>> {
        self.modules.get(name).cloned()
    }

    /// Names of all registered modules, sorted
    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether `filename` has already been required
    pub fn is_file_cached(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    fn register(&mut self, module: Rc<Module>) {
        if let Some(pending) = self.loading.last_mut() {
            pending.declared = Some(Rc::clone(&module));
        }
        self.modules.insert(module.name.clone(), module);
    }

    fn begin_file(&mut self, filename: &str) -> Result<(), Error> {
        if self.loading.iter().any(|pending| pending.filename == filename) {
            let mut chain: Vec<&str> = self.loading.iter().map(|p| p.filename.as_str()).collect();
            chain.push(filename);
            return Err(Error::EvalError(format!(
                "cyclic require: {}",
                chain.join(" -> ")
            )));
        }
        self.loading.push(PendingFile {
            filename: filename.to_owned(),
            declared: None,
        });
        Ok(())
    }

    /// Pop the innermost pending file, returning the last module it declared
    fn end_file(&mut self) -> Option<Rc<Module>> {
        self.loading.pop().and_then(|pending| pending.declared)
    }
}

/// Evaluate a module declaration
pub(crate) fn eval_module(
    name: &str,
    exports: &[String],
    body: &[Expr],
    env: &Environment,
    ctx: &mut Context,
    depth: usize,
) -> Result<Value, Error> {
    let module_env = env.child();
    eval_sequence(body, &module_env, ctx, depth)?;

    let mut bindings = HashMap::with_capacity(exports.len());
    for export in exports {
        let value = module_env.get_local(export).ok_or_else(|| Error::ExportNotFound {
            module: name.to_owned(),
            name: export.clone(),
        })?;
        bindings.insert(export.clone(), value);
    }

    debug!("registered module {name} exporting {exports:?}");
    ctx.registry.register(Rc::new(Module {
        name: name.to_owned(),
        exports: exports.to_vec(),
        bindings,
    }));
    Ok(Value::Unspecified)
}

/// Evaluate `(import name)`
pub(crate) fn eval_import(
    module_name: &str,
    env: &Environment,
    ctx: &mut Context,
) -> Result<Value, Error> {
    let module = ctx
        .registry
        .get(module_name)
        .ok_or_else(|| Error::ModuleNotFound(module_name.to_owned()))?;
    module.copy_exports_to_env(env);
    Ok(Value::Unspecified)
}

/// Evaluate `(require "file" ...)`
pub(crate) fn eval_require(
    filename: &str,
    modifier: Option<&RequireModifier>,
    env: &Environment,
    ctx: &mut Context,
    depth: usize,
) -> Result<Value, Error> {
    let module = match ctx.registry.files.get(filename).cloned() {
        Some(cached) => {
            debug!("require {filename}: already loaded as module {}", cached.name);
            cached
        }
        None => {
            ctx.registry.begin_file(filename)?;
            let result = ctx
                .loader
                .load(filename)
                .and_then(|forms| eval_sequence(&forms, &env.child(), ctx, depth));
            // Always pop the pending file, even if evaluation failed
            let declared = ctx.registry.end_file();
            result?;

            let module = declared.ok_or_else(|| {
                Error::EvalError(format!("required file {filename} does not declare a module"))
            })?;
            debug!("required {filename}: module {}", module.name);
            ctx.registry
                .files
                .insert(filename.to_owned(), Rc::clone(&module));
            module
        }
    };

    match modifier {
        None => module.copy_exports_to_env(env),
        Some(RequireModifier::As(alias)) => {
            env.define(alias.as_str(), Value::Namespace(module));
        }
        Some(RequireModifier::Only(names)) => module.copy_selected_to_env(names, env)?,
    }
    Ok(Value::Unspecified)
}

/// Evaluate `(load "file")` in the current scope
pub(crate) fn eval_load(
    filename: &str,
    env: &Environment,
    ctx: &mut Context,
    depth: usize,
) -> Result<Value, Error> {
    let forms = ctx.loader.load(filename)?;
    debug!("loading {filename}: {} top-level forms", forms.len());
    eval_sequence(&forms, env, ctx, depth)
}
