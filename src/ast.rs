//! The already-checked expression tree consumed by the planner.
//!
//! The engine treats the tree as opaque beyond node identity and per-kind
//! dispatch: ids come from the front end that produced it, and the planner
//! only requires that they are unique within one expression.

use crate::{Box, String, Vec, vec};

/// Operator function names, as spelled in planned call expressions.
///
/// The planner owns the semantics of the first four (jumps and merge steps);
/// the rest resolve through the function registry.
pub mod operators {
    pub const AND: &str = "_&&_";
    pub const OR: &str = "_||_";
    pub const TERNARY: &str = "_?_:_";
    pub const INDEX: &str = "_[_]";
    pub const NOT: &str = "!_";
    pub const NEGATE: &str = "-_";
    pub const EQUALS: &str = "_==_";
    pub const NOT_EQUALS: &str = "_!=_";
    pub const ADD: &str = "_+_";
    pub const SUBTRACT: &str = "_-_";
    pub const DIVIDE: &str = "_/_";
    pub const IN: &str = "@in";
    pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";
}

/// One expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: i64,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Constant),
    Ident(String),
    Select {
        operand: Box<Expr>,
        field: String,
        /// `has(x.f)` form: produce a bool instead of the field value.
        test_only: bool,
    },
    Call {
        /// Receiver for method-style calls; counted as argument zero.
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
    List {
        elements: Vec<Expr>,
    },
    Map {
        entries: Vec<(Expr, Expr)>,
    },
    Struct {
        type_name: String,
        fields: Vec<(String, Expr)>,
    },
    Comprehension(Box<Comprehension>),
}

/// Literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

/// Fold/loop expression form.
///
/// `iter_range` and `accu_init` see the enclosing scope; `loop_condition`
/// and `loop_step` additionally see `iter_var` and `accu_var`; `result`
/// sees `accu_var` only.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub iter_var: String,
    pub iter_range: Expr,
    pub accu_var: String,
    pub accu_init: Expr,
    pub loop_condition: Expr,
    pub loop_step: Expr,
    pub result: Expr,
}

impl Comprehension {
    /// True for the lazily-bound alias shape (`cel.bind`-style): an empty
    /// list range with a literal-false loop condition. The planner extracts
    /// `accu_init` as a lazy subexpression instead of looping.
    pub fn is_bind(&self) -> bool {
        let empty_range = matches!(&self.iter_range.kind, ExprKind::List { elements } if elements.is_empty());
        let never_loops = matches!(
            &self.loop_condition.kind,
            ExprKind::Literal(Constant::Bool(false))
        );
        empty_range && never_loops
    }
}

/// Builds expression nodes with unique, monotonically increasing ids.
#[derive(Debug, Default)]
pub struct ExprFactory {
    next_id: i64,
}

impl ExprFactory {
    pub fn new() -> Self {
        ExprFactory { next_id: 0 }
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        self.next_id += 1;
        Expr {
            id: self.next_id,
            kind,
        }
    }

    pub fn literal(&mut self, constant: Constant) -> Expr {
        self.expr(ExprKind::Literal(constant))
    }

    pub fn null(&mut self) -> Expr {
        self.literal(Constant::Null)
    }

    pub fn bool(&mut self, v: bool) -> Expr {
        self.literal(Constant::Bool(v))
    }

    pub fn int(&mut self, v: i64) -> Expr {
        self.literal(Constant::Int(v))
    }

    pub fn uint(&mut self, v: u64) -> Expr {
        self.literal(Constant::Uint(v))
    }

    pub fn double(&mut self, v: f64) -> Expr {
        self.literal(Constant::Double(v))
    }

    pub fn string(&mut self, v: impl Into<String>) -> Expr {
        self.literal(Constant::String(v.into()))
    }

    pub fn ident(&mut self, name: impl Into<String>) -> Expr {
        self.expr(ExprKind::Ident(name.into()))
    }

    pub fn select(&mut self, operand: Expr, field: impl Into<String>) -> Expr {
        self.expr(ExprKind::Select {
            operand: Box::new(operand),
            field: field.into(),
            test_only: false,
        })
    }

    /// `has(operand.field)`
    pub fn test(&mut self, operand: Expr, field: impl Into<String>) -> Expr {
        self.expr(ExprKind::Select {
            operand: Box::new(operand),
            field: field.into(),
            test_only: true,
        })
    }

    pub fn call(&mut self, function: impl Into<String>, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            target: None,
            function: function.into(),
            args,
        })
    }

    pub fn receiver_call(
        &mut self,
        target: Expr,
        function: impl Into<String>,
        args: Vec<Expr>,
    ) -> Expr {
        self.expr(ExprKind::Call {
            target: Some(Box::new(target)),
            function: function.into(),
            args,
        })
    }

    pub fn list(&mut self, elements: Vec<Expr>) -> Expr {
        self.expr(ExprKind::List { elements })
    }

    pub fn map(&mut self, entries: Vec<(Expr, Expr)>) -> Expr {
        self.expr(ExprKind::Map { entries })
    }

    pub fn struct_(&mut self, type_name: impl Into<String>, fields: Vec<(String, Expr)>) -> Expr {
        self.expr(ExprKind::Struct {
            type_name: type_name.into(),
            fields,
        })
    }

    pub fn comprehension(&mut self, comprehension: Comprehension) -> Expr {
        self.expr(ExprKind::Comprehension(Box::new(comprehension)))
    }

    pub fn and(&mut self, left: Expr, right: Expr) -> Expr {
        self.call(operators::AND, vec![left, right])
    }

    pub fn or(&mut self, left: Expr, right: Expr) -> Expr {
        self.call(operators::OR, vec![left, right])
    }

    pub fn ternary(&mut self, condition: Expr, then: Expr, otherwise: Expr) -> Expr {
        self.call(operators::TERNARY, vec![condition, then, otherwise])
    }

    pub fn index(&mut self, operand: Expr, key: Expr) -> Expr {
        self.call(operators::INDEX, vec![operand, key])
    }

    /// Lazily binds `init` to `name` within `body`.
    pub fn bind(&mut self, name: impl Into<String>, init: Expr, body: Expr) -> Expr {
        let range = self.list(vec![]);
        let never = self.bool(false);
        let unused = self.ident("#unused");
        self.comprehension(Comprehension {
            iter_var: "#unused".into(),
            iter_range: range,
            accu_var: name.into(),
            accu_init: init,
            loop_condition: never,
            loop_step: unused,
            result: body,
        })
    }

    /// Expands the `all`-style fold: accumulate `&&` of `predicate` over
    /// `range`, with the not-strictly-false guard as the loop condition.
    pub fn fold_all(
        &mut self,
        iter_var: impl Into<String>,
        range: Expr,
        predicate: Expr,
    ) -> Expr {
        let iter_var = iter_var.into();
        let accu_var = "__result__";
        let init = self.bool(true);
        let accu_ref = self.ident(accu_var);
        let condition = self.call(operators::NOT_STRICTLY_FALSE, vec![accu_ref]);
        let accu_ref = self.ident(accu_var);
        let step = self.and(accu_ref, predicate);
        let result = self.ident(accu_var);
        self.comprehension(Comprehension {
            iter_var,
            iter_range: range,
            accu_var: accu_var.into(),
            accu_init: init,
            loop_condition: condition,
            loop_step: step,
            result,
        })
    }
}
