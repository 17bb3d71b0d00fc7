//! A global environment and an evaluation [`Context`] bundled together.
//!
//! ```
//! use modlisp::Interpreter;
//! use modlisp::value::Value;
//!
//! let mut interp = Interpreter::new();
//! let value = interp.eval_str("(define sq (lambda (x) (* x x))) (sq 7)").unwrap();
//! assert_eq!(value, Value::Number(49.0));
//! ```

use crate::Error;
use crate::ast::Expr;
use crate::builtinops::Arity;
use crate::environment::Environment;
use crate::evaluator::{self, Context, create_global_env};
use crate::loader::SourceLoader;
use crate::parser::parse;
use crate::token::Token;
use crate::value::Value;

pub struct Interpreter {
    env: Environment,
    ctx: Context,
}

impl Interpreter {
    /// An interpreter without a source loader; `load` and `require` fail
    pub fn new() -> Self {
        Interpreter::with_context(Context::new())
    }

    pub fn with_loader(loader: impl SourceLoader + 'static) -> Self {
        Interpreter::with_context(Context::with_loader(loader))
    }

    pub fn with_context(ctx: Context) -> Self {
        Interpreter {
            env: create_global_env(),
            ctx,
        }
    }

    /// Evaluate a single expression in the global environment
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, Error> {
        evaluator::eval(expr, &self.env, &mut self.ctx)
    }

    /// Parse one expression from a token stream and evaluate it
    pub fn eval_tokens(&mut self, tokens: &[Token]) -> Result<Value, Error> {
        let expr = parse(tokens)?;
        self.eval(&expr)
    }

    /// Evaluate every expression in `source`, returning the last value
    ///
    /// Stops at the first error. Source with no expressions yields `Unspecified`.
    #[cfg(feature = "lexer")]
    pub fn eval_str(&mut self, source: &str) -> Result<Value, Error> {
        let tokens = crate::lexer::tokenize(source)?;
        let program = crate::parser::parse_program(&tokens)?;
        program
            .iter()
            .try_fold(Value::Unspecified, |_, expr| self.eval(expr))
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Expose a host function to evaluated code
    pub fn register_builtin_function<F>(&self, name: &str, arity: Arity, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, Error> + 'static,
    {
        self.env.register_builtin_function(name, arity, func);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    #[cfg(feature = "lexer")]
    use crate::loader::MemoryLoader;
    use crate::token::tok::*;
    use crate::value::val;

    #[test]
    fn test_eval_tokens() {
        let mut interp = Interpreter::new();
        let tokens = vec![
            lparen(),
            sym("length"),
            quote(),
            lparen(),
            num("1"),
            num("2"),
            rparen(),
            rparen(),
            eof(),
        ];
        assert_eq!(interp.eval_tokens(&tokens).unwrap(), val(2));

        // A single root only
        let err = interp.eval_tokens(&[num("1"), num("2"), eof()]).unwrap_err();
        assert!(err.to_string().contains("unexpected token after expression"));
    }

    #[test]
    fn test_definitions_persist_between_calls() {
        let mut interp = Interpreter::new();
        let define = crate::ast::list([
            crate::ast::sym("define"),
            crate::ast::sym("x"),
            crate::ast::num(5),
        ]);
        assert_eq!(interp.eval(&define).unwrap(), Value::Unspecified);
        assert_eq!(interp.eval(&crate::ast::sym("x")).unwrap(), val(5));
        assert!(interp.environment().get_local("x").is_some());
    }

    #[test]
    fn test_registered_host_function() {
        let mut interp = Interpreter::new();
        interp.register_builtin_function("twice", Arity::Exact(1), |args| match args {
            [Value::Number(n)] => Ok(Value::Number(n * 2.0)),
            _ => Err(Error::TypeError("twice requires a number".into())),
        });
        let tokens = vec![lparen(), sym("twice"), num("21"), rparen(), eof()];
        assert_eq!(interp.eval_tokens(&tokens).unwrap(), val(42));
    }

    #[cfg(feature = "lexer")]
    #[test]
    fn test_eval_str() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.eval_str("").unwrap(), Value::Unspecified);
        assert_eq!(interp.eval_str("; only a comment").unwrap(), Value::Unspecified);
        assert_eq!(interp.eval_str("(define a 1) (define b 2) (+ a b)").unwrap(), val(3));

        // Forms before the failing one have taken effect
        assert!(interp.eval_str("(define c 3) (first '()) (define d 4)").is_err());
        assert_eq!(interp.eval_str("c").unwrap(), val(3));
        assert!(matches!(interp.eval_str("d"), Err(Error::UnboundVariable(name)) if name == "d"));
    }

    #[cfg(feature = "lexer")]
    #[test]
    fn test_interpreters_do_not_share_modules() {
        let loader = || {
            MemoryLoader::new()
                .with_source("m.lisp", "(module m (export v) (define v 1))")
                .unwrap()
        };
        let mut first = Interpreter::with_loader(loader());
        let mut second = Interpreter::with_loader(loader());

        first.eval_str("(require \"m.lisp\")").unwrap();
        assert_eq!(first.context().registry().module_names(), vec!["m"]);
        assert!(second.context().registry().module_names().is_empty());
        assert!(second.eval_str("(import m)").is_err());
    }

    #[cfg(feature = "lexer")]
    #[test]
    fn test_custom_depth_limit() {
        let mut interp = Interpreter::with_context(Context::new().with_max_depth(8));
        assert!(interp.eval_str("(+ 1 2)").is_ok());
        let err = interp
            .eval_str("(+ 1 (+ 1 (+ 1 (+ 1 (+ 1 (+ 1 (+ 1 (+ 1 1))))))))")
            .unwrap_err();
        assert!(err.to_string().contains("Evaluation depth limit exceeded (max: 8)"));
    }
}
