use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};

use crate::config::Config;
use crate::environment::Environment;
use crate::expr;
use crate::value::{type_of, LoxClass, LoxFunction, LoxInstance, Type, Value};

static INIT: &str = "init";
static THIS: &str = "this";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Undefined variable '{}' at line={},col={}", .name, .loc.line, .loc.col)]
    UndefinedVariable {
        name: String,
        loc: expr::SourceLocation,
    },
    #[error(
        "Invalid call at line={},col={}: callee has arity {}, but was called with {} arguments",
        .loc.line, .loc.col, .expected, .found
    )]
    ArityMismatch {
        expected: usize,
        found: usize,
        loc: expr::SourceLocation,
    },
    #[error("value of type {:?} is not callable at line={},col={}", .ty, .loc.line, .loc.col)]
    NotCallable { ty: Type, loc: expr::SourceLocation },
    #[error(
        "Only instances have properties. Found {:?} at line={},col={}",
        .ty, .loc.line, .loc.col
    )]
    NotAnInstance { ty: Type, loc: expr::SourceLocation },
    #[error("Undefined property '{}' at line={},col={}", .name, .loc.line, .loc.col)]
    UndefinedProperty {
        name: String,
        loc: expr::SourceLocation,
    },
    #[error(
        "invalid operands in binary operator {} of type {:?} and {:?} at line={},col={}",
        .op, .lhs, .rhs, .loc.line, .loc.col
    )]
    InvalidOperands {
        op: expr::BinaryOpTy,
        lhs: Type,
        rhs: Type,
        loc: expr::SourceLocation,
    },
    #[error(
        "invalid application of unary op {} to object of type {:?} at line={},col={}",
        .op, .ty, .loc.line, .loc.col
    )]
    InvalidUnaryOperand {
        op: expr::UnaryOpTy,
        ty: Type,
        loc: expr::SourceLocation,
    },
    #[error("division by zero at line={},col={}", .loc.line, .loc.col)]
    DivisionByZero { loc: expr::SourceLocation },
    #[error("return statement not enclosed in a function at line={},col={}", .loc.line, .loc.col)]
    ReturnOutsideFunction { loc: expr::SourceLocation },
    #[error(
        "Only classes should appear as superclasses. '{}' is {:?} at line={},col={}",
        .name, .ty, .loc.line, .loc.col
    )]
    SuperclassNotAClass {
        name: String,
        ty: Type,
        loc: expr::SourceLocation,
    },
    #[error("A class cannot inherit from itself ('{}' at line={},col={})", .name, .loc.line, .loc.col)]
    InheritFromSelf {
        name: String,
        loc: expr::SourceLocation,
    },
    #[error(
        "Stack overflow: maximum call depth of {} exceeded at line={},col={}",
        .max_depth, .loc.line, .loc.col
    )]
    StackOverflow {
        max_depth: usize,
        loc: expr::SourceLocation,
    },
    #[error("interrupted")]
    Interrupted,
    #[error("failed to write output: {what}")]
    Output { what: String },
}

impl RuntimeError {
    pub fn location(&self) -> Option<expr::SourceLocation> {
        match self {
            RuntimeError::UndefinedVariable { loc, .. }
            | RuntimeError::ArityMismatch { loc, .. }
            | RuntimeError::NotCallable { loc, .. }
            | RuntimeError::NotAnInstance { loc, .. }
            | RuntimeError::UndefinedProperty { loc, .. }
            | RuntimeError::InvalidOperands { loc, .. }
            | RuntimeError::InvalidUnaryOperand { loc, .. }
            | RuntimeError::DivisionByZero { loc }
            | RuntimeError::ReturnOutsideFunction { loc }
            | RuntimeError::SuperclassNotAClass { loc, .. }
            | RuntimeError::InheritFromSelf { loc, .. }
            | RuntimeError::StackOverflow { loc, .. } => Some(*loc),
            RuntimeError::Interrupted | RuntimeError::Output { .. } => None,
        }
    }
}

/// How a statement finished. A `return` travels outward as `Flow::Return`
/// until a call frame consumes it; it is never an `Err`.
enum Flow {
    Normal,
    Return(expr::SourceLocation, Value),
}

trait Callable {
    fn arity(&self) -> usize;
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError>;
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.decl.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let env = Environment::with_enclosing(&self.closure);
        for (param, arg) in self.decl.params.iter().zip(args) {
            env.define(&param.name, arg);
        }

        match interpreter.execute_block(&self.decl.body, env)? {
            Flow::Return(_, val) => Ok(val),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

impl Callable for Rc<LoxClass> {
    fn arity(&self) -> usize {
        match self.find_method(INIT) {
            Some(initializer) => initializer.arity(),
            None => 0,
        }
    }

    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(self.clone())));

        if let Some(initializer) = self.find_method(INIT) {
            initializer.bind(instance.clone()).call(interpreter, args)?;
        }

        Ok(Value::LoxInstance(instance))
    }
}

fn as_callable(value: &Value) -> Option<&dyn Callable> {
    match value {
        Value::LoxFunction(f) => Some(f.as_ref()),
        Value::LoxClass(cls) => Some(cls),
        _ => None,
    }
}

pub struct Interpreter<'a> {
    pub globals: Environment,
    env: Environment,
    out: &'a mut dyn Write,
    config: Config,
    call_depth: usize,
    pub interrupted: Arc<AtomicBool>,
}

impl<'a> Interpreter<'a> {
    pub fn new(out: &'a mut dyn Write, config: Config) -> Interpreter<'a> {
        let globals = Environment::default();
        Interpreter {
            env: globals.clone(),
            globals,
            out,
            config,
            call_depth: 0,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs a program against the global scope. Bindings persist across
    /// calls, which is what the REPL relies on.
    pub fn interpret(&mut self, stmts: &[expr::Stmt]) -> Result<(), RuntimeError> {
        self.interrupted.store(false, Ordering::Release);
        self.env = self.globals.clone();
        self.call_depth = 0;

        for stmt in stmts {
            if let Flow::Return(loc, _) = self.execute(stmt)? {
                return Err(RuntimeError::ReturnOutsideFunction { loc });
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &expr::Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            expr::Stmt::Expr(e) => {
                self.interpret_expr(e)?;
                Ok(Flow::Normal)
            }
            expr::Stmt::ClassDecl(decl) => {
                self.class_decl(decl)?;
                Ok(Flow::Normal)
            }
            expr::Stmt::FunDecl(decl) => {
                let lox_function = LoxFunction {
                    decl: decl.clone(),
                    closure: self.env.clone(),
                };
                self.env
                    .define(&decl.name.name, Value::LoxFunction(Rc::new(lox_function)));
                Ok(Flow::Normal)
            }
            expr::Stmt::If(cond, if_true, maybe_if_false) => {
                if self.interpret_expr(cond)?.is_truthy() {
                    return self.execute(if_true);
                }
                if let Some(if_false) = maybe_if_false {
                    return self.execute(if_false);
                }
                Ok(Flow::Normal)
            }
            expr::Stmt::Print(e) => {
                let val = self.interpret_expr(e)?;
                writeln!(self.out, "{}", val).map_err(|err| RuntimeError::Output {
                    what: err.to_string(),
                })?;
                Ok(Flow::Normal)
            }
            expr::Stmt::VarDecl(sym, maybe_expr) => {
                let val = match maybe_expr {
                    Some(expr) => self.interpret_expr(expr)?,
                    None => Value::Nil,
                };
                self.env.define(&sym.name, val);
                Ok(Flow::Normal)
            }
            expr::Stmt::Block(stmts) => {
                let env = Environment::with_enclosing(&self.env);
                self.execute_block(stmts, env)
            }
            expr::Stmt::While(cond, body) => {
                while self.interpret_expr(cond)?.is_truthy() {
                    self.check_interrupted()?;
                    if let flow @ Flow::Return(..) = self.execute(body)? {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            expr::Stmt::Return(loc, maybe_res) => {
                let val = match maybe_res {
                    Some(res) => self.interpret_expr(res)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(*loc, val))
            }
        }
    }

    /// Executes `stmts` in `env`, restoring the current scope afterwards
    /// whether the block completes, returns or fails.
    fn execute_block(
        &mut self,
        stmts: &[expr::Stmt],
        env: Environment,
    ) -> Result<Flow, RuntimeError> {
        let saved_env = std::mem::replace(&mut self.env, env);
        let res = self.execute_stmts(stmts);
        self.env = saved_env;
        res
    }

    fn execute_stmts(&mut self, stmts: &[expr::Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            if let flow @ Flow::Return(..) = self.execute(stmt)? {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn class_decl(&mut self, decl: &expr::ClassDecl) -> Result<(), RuntimeError> {
        let superclass = match &decl.superclass {
            Some(superclass_var) => {
                if superclass_var.name == decl.name.name {
                    return Err(RuntimeError::InheritFromSelf {
                        name: decl.name.name.clone(),
                        loc: superclass_var.location(),
                    });
                }

                match self.env.get(superclass_var)? {
                    Value::LoxClass(cls) => Some(cls),
                    val => {
                        return Err(RuntimeError::SuperclassNotAClass {
                            name: superclass_var.name.clone(),
                            ty: type_of(&val),
                            loc: superclass_var.location(),
                        })
                    }
                }
            }
            None => None,
        };

        let methods = decl
            .methods
            .iter()
            .map(|method| {
                (
                    method.name.name.clone(),
                    Rc::new(LoxFunction {
                        decl: method.clone(),
                        closure: self.env.clone(),
                    }),
                )
            })
            .collect();

        let cls = LoxClass {
            name: decl.name.name.clone(),
            superclass,
            methods,
        };
        debug!(
            "declared class {} with {} methods",
            cls.name,
            cls.methods.len()
        );

        self.env
            .define(&decl.name.name, Value::LoxClass(Rc::new(cls)));
        Ok(())
    }

    fn interpret_expr(&mut self, expr: &expr::Expr) -> Result<Value, RuntimeError> {
        match expr {
            expr::Expr::This(source_location) => self.env.get(&expr::Symbol {
                name: String::from(THIS),
                line: source_location.line,
                col: source_location.col,
            }),
            expr::Expr::Literal(lit) => Ok(Interpreter::interpret_literal(lit)),
            expr::Expr::Unary(op, e) => self.interpret_unary(*op, e),
            expr::Expr::Binary(lhs, op, rhs) => self.interpret_binary(lhs, *op, rhs),
            expr::Expr::Call(callee, loc, args) => self.call(callee, loc, args),
            expr::Expr::Get(lhs, attr) => self.getattr(lhs, attr),
            expr::Expr::Set(lhs, attr, rhs) => self.setattr(lhs, attr, rhs),
            expr::Expr::Grouping(e) => self.interpret_expr(e),
            expr::Expr::Variable(sym) => self.env.get(sym),
            expr::Expr::Assign(sym, val_expr) => {
                let val = self.interpret_expr(val_expr)?;
                self.env.assign(sym, val.clone())?;
                Ok(val)
            }
            expr::Expr::Logical(left_expr, expr::LogicalOp::Or, right_expr) => {
                let left = self.interpret_expr(left_expr)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.interpret_expr(right_expr)
                }
            }
            expr::Expr::Logical(left_expr, expr::LogicalOp::And, right_expr) => {
                let left = self.interpret_expr(left_expr)?;
                if !left.is_truthy() {
                    Ok(left)
                } else {
                    self.interpret_expr(right_expr)
                }
            }
        }
    }

    fn getattr(&mut self, lhs: &expr::Expr, attr: &expr::Symbol) -> Result<Value, RuntimeError> {
        let val = self.interpret_expr(lhs)?;
        match &val {
            Value::LoxInstance(inst) => LoxInstance::getattr(inst, &attr.name).ok_or_else(|| {
                RuntimeError::UndefinedProperty {
                    name: attr.name.clone(),
                    loc: attr.location(),
                }
            }),
            _ => Err(RuntimeError::NotAnInstance {
                ty: type_of(&val),
                loc: attr.location(),
            }),
        }
    }

    fn setattr(
        &mut self,
        lhs_exp: &expr::Expr,
        attr: &expr::Symbol,
        rhs_exp: &expr::Expr,
    ) -> Result<Value, RuntimeError> {
        let lhs = self.interpret_expr(lhs_exp)?;
        match lhs {
            Value::LoxInstance(inst) => {
                let rhs = self.interpret_expr(rhs_exp)?;
                inst.borrow_mut().setattr(&attr.name, rhs.clone());
                Ok(rhs)
            }
            _ => Err(RuntimeError::NotAnInstance {
                ty: type_of(&lhs),
                loc: attr.location(),
            }),
        }
    }

    fn call(
        &mut self,
        callee_expr: &expr::Expr,
        loc: &expr::SourceLocation,
        arg_exprs: &[expr::Expr],
    ) -> Result<Value, RuntimeError> {
        let callee = self.interpret_expr(callee_expr)?;

        let args = arg_exprs
            .iter()
            .map(|arg| self.interpret_expr(arg))
            .collect::<Result<Vec<_>, _>>()?;

        let callable = as_callable(&callee).ok_or(RuntimeError::NotCallable {
            ty: type_of(&callee),
            loc: *loc,
        })?;

        if args.len() != callable.arity() {
            return Err(RuntimeError::ArityMismatch {
                expected: callable.arity(),
                found: args.len(),
                loc: *loc,
            });
        }

        self.check_interrupted()?;
        if let Some(max_depth) = self.config.max_call_depth {
            if self.call_depth >= max_depth {
                return Err(RuntimeError::StackOverflow {
                    max_depth,
                    loc: *loc,
                });
            }
        }

        self.call_depth += 1;
        trace!("call at line={} depth={}", loc.line, self.call_depth);
        let res = callable.call(self, args);
        self.call_depth -= 1;
        res
    }

    fn interpret_binary(
        &mut self,
        lhs_expr: &expr::Expr,
        op: expr::BinaryOp,
        rhs_expr: &expr::Expr,
    ) -> Result<Value, RuntimeError> {
        let lhs = self.interpret_expr(lhs_expr)?;
        let rhs = self.interpret_expr(rhs_expr)?;

        match (&lhs, op.ty, &rhs) {
            (Value::Number(n1), expr::BinaryOpTy::Less, Value::Number(n2)) => {
                Ok(Value::Bool(n1 < n2))
            }
            (Value::Number(n1), expr::BinaryOpTy::LessEqual, Value::Number(n2)) => {
                Ok(Value::Bool(n1 <= n2))
            }
            (Value::Number(n1), expr::BinaryOpTy::Greater, Value::Number(n2)) => {
                Ok(Value::Bool(n1 > n2))
            }
            (Value::Number(n1), expr::BinaryOpTy::GreaterEqual, Value::Number(n2)) => {
                Ok(Value::Bool(n1 >= n2))
            }
            (Value::Number(n1), expr::BinaryOpTy::Plus, Value::Number(n2)) => {
                Ok(Value::Number(n1 + n2))
            }
            (Value::Number(n1), expr::BinaryOpTy::Minus, Value::Number(n2)) => {
                Ok(Value::Number(n1 - n2))
            }
            (Value::Number(n1), expr::BinaryOpTy::Star, Value::Number(n2)) => {
                Ok(Value::Number(n1 * n2))
            }
            (Value::Number(n1), expr::BinaryOpTy::Slash, Value::Number(n2)) => {
                if *n2 != 0.0 {
                    Ok(Value::Number(n1 / n2))
                } else {
                    Err(RuntimeError::DivisionByZero {
                        loc: op.location(),
                    })
                }
            }
            (Value::String(s1), expr::BinaryOpTy::Plus, Value::String(s2)) => {
                Ok(Value::String(format!("{}{}", s1, s2)))
            }
            (_, expr::BinaryOpTy::EqualEqual, _) => Ok(Value::Bool(lhs.equals(&rhs))),
            (_, expr::BinaryOpTy::NotEqual, _) => Ok(Value::Bool(!lhs.equals(&rhs))),
            _ => Err(RuntimeError::InvalidOperands {
                op: op.ty,
                lhs: type_of(&lhs),
                rhs: type_of(&rhs),
                loc: op.location(),
            }),
        }
    }

    fn interpret_unary(
        &mut self,
        op: expr::UnaryOp,
        expr: &expr::Expr,
    ) -> Result<Value, RuntimeError> {
        let val = self.interpret_expr(expr)?;

        match (op.ty, &val) {
            (expr::UnaryOpTy::Minus, Value::Number(n)) => Ok(Value::Number(-n)),
            (expr::UnaryOpTy::Bang, _) => Ok(Value::Bool(!val.is_truthy())),
            (expr::UnaryOpTy::Minus, _) => Err(RuntimeError::InvalidUnaryOperand {
                op: op.ty,
                ty: type_of(&val),
                loc: op.location(),
            }),
        }
    }

    fn interpret_literal(lit: &expr::Literal) -> Value {
        match lit {
            expr::Literal::Number(n) => Value::Number(*n),
            expr::Literal::String(s) => Value::String(s.clone()),
            expr::Literal::True => Value::Bool(true),
            expr::Literal::False => Value::Bool(false),
            expr::Literal::Nil => Value::Nil,
        }
    }

    fn check_interrupted(&self) -> Result<(), RuntimeError> {
        if self.interrupted.load(Ordering::Acquire) {
            return Err(RuntimeError::Interrupted);
        }
        Ok(())
    }
}
