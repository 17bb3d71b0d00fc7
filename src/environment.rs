use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::builtinops::Arity;
use crate::value::Value;

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Environment for variable bindings
///
/// A handle to one scope in a chain of scopes. Cloning the handle shares the
/// scope: closures keep their defining environment alive after the call that
/// created it has returned. Parent links only point at older scopes.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Environment {
    /// Create an empty root scope
    pub fn new() -> Self {
        Environment::default()
    }

    /// Create a new scope whose parent is this one
    pub fn child(&self) -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// The enclosing scope, if any
    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// Install or overwrite a binding in this scope only
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Look a name up in this scope, then outward through the parents
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let frame = env.0.borrow();
            if let Some(value) = frame.bindings.get(name) {
                return Some(value.clone());
            }
            current = frame.parent.clone();
        }
        None
    }

    /// Like [`Environment::get`], but an unbound name is an error
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    /// Look a name up in this scope only
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.0.borrow().bindings.get(name).cloned()
    }

    /// Whether two handles refer to the same scope
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Register a host function callable from evaluated code.
    ///
    /// The arity is validated on every call before `func` runs.
    ///
    /// # Example
    /// ```
    /// use modlisp::builtinops::Arity;
    /// use modlisp::environment::Environment;
    /// use modlisp::value::Value;
    ///
    /// let env = Environment::new();
    /// env.register_builtin_function("answer", Arity::Exact(0), |_args| Ok(Value::Number(42.0)));
    /// assert!(env.get("answer").is_some());
    /// ```
    pub fn register_builtin_function<F>(&self, name: &str, arity: Arity, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, Error> + 'static,
    {
        self.define(
            name,
            Value::BuiltinFunction {
                id: name.to_owned(),
                arity,
                func: Rc::new(func),
            },
        );
    }

    /// Get all bindings in this environment and its parents
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        // Start with parent bindings (so they can be overridden by local bindings)
        if let Some(parent) = self.parent() {
            for (name, value) in parent.get_all_bindings() {
                bindings.insert(name, value);
            }
        }

        for (name, value) in &self.0.borrow().bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.0.borrow();
        let mut names: Vec<&String> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}
