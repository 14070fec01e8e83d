use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::expr;
use crate::treewalk_interpreter::RuntimeError;
use crate::value::Value;

/// A handle on one scope in the environment chain. Cloning the handle shares
/// the scope, so a closure and the frame that created it see the same
/// bindings.
#[derive(Clone, Default)]
pub struct Environment {
    scope: Rc<RefCell<Scope>>,
}

#[derive(Default)]
struct Scope {
    enclosing: Option<Environment>,
    venv: HashMap<String, Value>,
}

impl Environment {
    pub fn with_enclosing(enclosing: &Environment) -> Environment {
        Environment {
            scope: Rc::new(RefCell::new(Scope {
                enclosing: Some(enclosing.clone()),
                venv: HashMap::new(),
            })),
        }
    }

    /// Always binds in this scope, shadowing any outer binding.
    pub fn define(&self, name: &str, val: Value) {
        self.scope.borrow_mut().venv.insert(name.to_string(), val);
    }

    pub fn get(&self, sym: &expr::Symbol) -> Result<Value, RuntimeError> {
        let mut env = self.clone();
        loop {
            let next = {
                let scope = env.scope.borrow();
                if let Some(val) = scope.venv.get(&sym.name) {
                    return Ok(val.clone());
                }
                scope.enclosing.clone()
            };
            match next {
                Some(enclosing) => env = enclosing,
                None => {
                    return Err(RuntimeError::UndefinedVariable {
                        name: sym.name.clone(),
                        loc: sym.location(),
                    })
                }
            }
        }
    }

    /// Mutates the nearest scope that already binds `sym`; never creates a
    /// binding.
    pub fn assign(&self, sym: &expr::Symbol, val: Value) -> Result<(), RuntimeError> {
        let mut env = self.clone();
        loop {
            let next = {
                let mut scope = env.scope.borrow_mut();
                if let Some(slot) = scope.venv.get_mut(&sym.name) {
                    *slot = val;
                    return Ok(());
                }
                scope.enclosing.clone()
            };
            match next {
                Some(enclosing) => env = enclosing,
                None => {
                    return Err(RuntimeError::UndefinedVariable {
                        name: sym.name.clone(),
                        loc: sym.location(),
                    })
                }
            }
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let scope = self.scope.borrow();
        let mut names: Vec<_> = scope.venv.keys().collect();
        names.sort();
        write!(f, "Environment({:?}", names)?;
        if scope.enclosing.is_some() {
            write!(f, " -> ..")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use crate::environment::Environment;
    use crate::expr::Symbol;
    use crate::treewalk_interpreter::RuntimeError;
    use crate::value::Value;

    fn sym(name: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            line: 1,
            col: 0,
        }
    }

    fn number(env: &Environment, name: &str) -> f64 {
        match env.get(&sym(name)) {
            Ok(Value::Number(n)) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn lookup_walks_outward() {
        let globals = Environment::default();
        globals.define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(&Environment::with_enclosing(&globals));
        assert_eq!(number(&inner, "a"), 1.0);
    }

    #[test]
    fn define_shadows() {
        let globals = Environment::default();
        globals.define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(&globals);
        inner.define("a", Value::Number(2.0));
        assert_eq!(number(&inner, "a"), 2.0);
        assert_eq!(number(&globals, "a"), 1.0);
    }

    #[test]
    fn assign_mutates_nearest_binding() {
        let globals = Environment::default();
        globals.define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(&globals);
        inner.assign(&sym("a"), Value::Number(3.0)).unwrap();
        assert_eq!(number(&globals, "a"), 3.0);
    }

    #[test]
    fn assign_to_undeclared_fails() {
        let globals = Environment::default();
        let err = globals.assign(&sym("nope"), Value::Nil).unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedVariable { ref name, .. } if name == "nope"));
        assert!(globals.get(&sym("nope")).is_err());
    }

    #[test]
    fn clones_share_scope() {
        let env = Environment::default();
        let alias = env.clone();
        alias.define("x", Value::Bool(true));
        assert!(matches!(env.get(&sym("x")), Ok(Value::Bool(true))));
    }
}
