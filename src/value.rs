use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::expr;

static THIS: &str = "this";

#[derive(Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
    LoxFunction(Rc<LoxFunction>),
    LoxClass(Rc<LoxClass>),
    LoxInstance(Rc<RefCell<LoxInstance>>),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Type {
    Number,
    String,
    Bool,
    Nil,
    LoxFunction,
    LoxClass,
    LoxInstance,
}

pub fn type_of(value: &Value) -> Type {
    match value {
        Value::Number(_) => Type::Number,
        Value::String(_) => Type::String,
        Value::Bool(_) => Type::Bool,
        Value::Nil => Type::Nil,
        Value::LoxFunction(_) => Type::LoxFunction,
        Value::LoxClass(_) => Type::LoxClass,
        Value::LoxInstance(_) => Type::LoxInstance,
    }
}

impl Value {
    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    /// Values of different types are never equal. Functions, classes and
    /// instances compare by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(n1), Value::Number(n2)) => n1 == n2,
            (Value::String(s1), Value::String(s2)) => s1 == s2,
            (Value::Bool(b1), Value::Bool(b2)) => b1 == b2,
            (Value::Nil, Value::Nil) => true,
            (Value::LoxFunction(f1), Value::LoxFunction(f2)) => Rc::ptr_eq(f1, f2),
            (Value::LoxClass(c1), Value::LoxClass(c2)) => Rc::ptr_eq(c1, c2),
            (Value::LoxInstance(i1), Value::LoxInstance(i2)) => Rc::ptr_eq(i1, i2),
            (_, _) => false,
        }
    }
}

/// Positional notation for decimal exponents in `-4..16`, otherwise shortest
/// round-trip scientific notation with a signed two-digit exponent (`1e+21`,
/// `1.5e-07`). Integral values carry no fractional part.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        return String::from("nan");
    }
    if n == 0.0 || n.is_infinite() {
        return format!("{}", n);
    }

    let sci = format!("{:e}", n);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return format!("{}", n),
    };
    let exponent: i32 = match exponent.parse() {
        Ok(exponent) => exponent,
        Err(_) => return format!("{}", n),
    };

    if (-4..16).contains(&exponent) {
        format!("{}", n)
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::LoxFunction(func) => write!(f, "<fn {}>", func.name()),
            Value::LoxClass(cls) => write!(f, "{}", cls.name),
            Value::LoxInstance(inst) => write!(f, "{} instance", inst.borrow().class.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            _ => write!(f, "{}", self),
        }
    }
}

/// A function value: its declaration plus the scope it closes over. Methods
/// are stored unbound; `bind` produces the callable form with `this` set.
pub struct LoxFunction {
    pub decl: Rc<expr::FunDecl>,
    pub closure: Environment,
}

impl LoxFunction {
    pub fn name(&self) -> &str {
        &self.decl.name.name
    }

    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let env = Environment::with_enclosing(&self.closure);
        env.define(THIS, Value::LoxInstance(instance));
        LoxFunction {
            decl: self.decl.clone(),
            closure: env,
        }
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LoxFunction({})", self.name())
    }
}

#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Walks the superclass chain, stopping at the first class that defines
    /// `method_name`.
    pub fn find_method(&self, method_name: &str) -> Option<Rc<LoxFunction>> {
        let mut cls = self;
        loop {
            if let Some(method) = cls.methods.get(method_name) {
                return Some(method.clone());
            }
            match &cls.superclass {
                Some(superclass) => cls = superclass,
                None => return None,
            }
        }
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    pub fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> LoxInstance {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    /// Fields shadow methods. A method is bound afresh on every lookup.
    pub fn getattr(instance: &Rc<RefCell<LoxInstance>>, attr: &str) -> Option<Value> {
        let method = {
            let inst = instance.borrow();
            if let Some(val) = inst.fields.get(attr) {
                return Some(val.clone());
            }
            inst.class.find_method(attr)
        };

        method.map(|method| Value::LoxFunction(Rc::new(method.bind(instance.clone()))))
    }

    pub fn setattr(&mut self, attr: &str, val: Value) {
        self.fields.insert(attr.to_string(), val);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use crate::value::{LoxClass, LoxInstance, Value};

    fn class(name: &str, superclass: Option<Rc<LoxClass>>) -> Rc<LoxClass> {
        Rc::new(LoxClass {
            name: name.to_string(),
            superclass,
            methods: HashMap::new(),
        })
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn equality_never_coerces() {
        assert!(!Value::Number(1.0).equals(&Value::String("1".to_string())));
        assert!(Value::Nil.equals(&Value::Nil));
        assert!(!Value::Nil.equals(&Value::Bool(false)));
        assert!(Value::String("a".to_string()).equals(&Value::String("a".to_string())));
    }

    #[test]
    fn instances_compare_by_identity() {
        let cls = class("A", None);
        let a = Rc::new(RefCell::new(LoxInstance::new(cls.clone())));
        let b = Rc::new(RefCell::new(LoxInstance::new(cls)));
        let a_val = Value::LoxInstance(a.clone());
        assert!(a_val.equals(&Value::LoxInstance(a)));
        assert!(!a_val.equals(&Value::LoxInstance(b)));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
        assert_eq!(Value::String("hi".to_string()).to_string(), "hi");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Nil.to_string(), "nil");

        let cls = class("Point", None);
        assert_eq!(Value::LoxClass(cls.clone()).to_string(), "Point");
        let inst = Rc::new(RefCell::new(LoxInstance::new(cls)));
        assert_eq!(Value::LoxInstance(inst).to_string(), "Point instance");
    }

    #[test]
    fn display_extreme_magnitudes() {
        let show = |n: f64| Value::Number(n).to_string();
        assert_eq!(show(1e21), "1e+21");
        assert_eq!(show(0.00001), "1e-05");
        assert_eq!(show(1.5e-7), "1.5e-07");
        assert_eq!(show(-2.5e300), "-2.5e+300");
        assert_eq!(show(1e16), "1e+16");
        assert_eq!(show(1e15), "1000000000000000");
        assert_eq!(show(0.0001), "0.0001");
        assert_eq!(show(123.456), "123.456");
        assert_eq!(show(f64::INFINITY), "inf");
        assert_eq!(show(f64::NEG_INFINITY), "-inf");
        assert_eq!(show(f64::NAN), "nan");
    }

    #[test]
    fn fields_are_per_instance() {
        let cls = class("A", None);
        let a = Rc::new(RefCell::new(LoxInstance::new(cls.clone())));
        let b = Rc::new(RefCell::new(LoxInstance::new(cls)));
        a.borrow_mut().setattr("x", Value::Number(1.0));
        assert!(LoxInstance::getattr(&a, "x").is_some());
        assert!(LoxInstance::getattr(&b, "x").is_none());
    }

    #[test]
    fn missing_method_walks_whole_chain() {
        let base = class("Base", None);
        let derived = class("Derived", Some(base));
        assert!(derived.find_method("nope").is_none());
    }
}
