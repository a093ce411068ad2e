//! Abstract Syntax Tree for the dataflow process language
use dflowmap_utils::Id;
use strum_macros::{AsRefStr, EnumIter, IntoStaticStr};

/// A parsed source file.
#[derive(Debug, Default)]
pub struct NamespaceDef {
    /// Processes in definition order.
    pub processes: Vec<ProcessDef>,
}

/// Direction of a process port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `chan?`
    Input,
    /// `chan!`
    Output,
}

impl Direction {
    pub fn symbol(&self) -> &'static str {
        match self {
            Direction::Input => "?",
            Direction::Output => "!",
        }
    }
}

/// Type carried by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanType {
    Int(u64),
    Bool,
}

impl ChanType {
    pub fn width(&self) -> u64 {
        match self {
            ChanType::Int(w) => *w,
            ChanType::Bool => 1,
        }
    }
}

impl std::fmt::Display for ChanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChanType::Int(w) => write!(f, "int<{w}>"),
            ChanType::Bool => write!(f, "bool"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortDef {
    pub name: Id,
    pub direction: Direction,
    pub ty: ChanType,
}

/// A local channel declaration. Arrays are expanded by the parser, so
/// `chan(int<8>) u[2]` turns into `u[0]` and `u[1]`.
#[derive(Debug, Clone)]
pub struct ChannelDecl {
    pub name: Id,
    pub ty: ChanType,
}

/// `lhs = rhs;` connects two channel names to the same wire.
#[derive(Debug, Clone)]
pub struct Alias {
    pub lhs: Id,
    pub rhs: Id,
}

/// Binary operators with the mnemonic used in diagnostics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum BinOp {
    And,
    Or,
    Xor,
    Add,
    Minus,
    Mul,
    Div,
    Mod,
    Lsl,
    Lsr,
    Asr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    /// The operator as written in statements and generated names.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Add => "+",
            BinOp::Minus => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lsl => "<<",
            BinOp::Lsr => ">>",
            BinOp::Asr => ">>>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "=",
            BinOp::Ne => "!=",
        }
    }

    /// Does the operator produce a single-bit result?
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum UnOp {
    /// `!`
    Not,
    /// `-`
    Neg,
    /// `~`
    Compl,
}

impl UnOp {
    /// Logical not and complement share the bitwise `~` of the target
    /// language.
    pub fn symbol(&self) -> &'static str {
        match self {
            UnOp::Not | UnOp::Compl => "~",
            UnOp::Neg => "-",
        }
    }

    /// The operator as it appears in source text.
    pub fn source_symbol(&self) -> &'static str {
        match self {
            UnOp::Not => "!",
            UnOp::Compl => "~",
            UnOp::Neg => "-",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Const(u64),
    Var(Id),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        arg: Box<Expr>,
    },
    Query {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    /// `int(e, w)` when `width` is set, `int(e)` otherwise.
    IntCast {
        arg: Box<Expr>,
        width: Option<u64>,
    },
    /// `bool(e)`
    BoolCast(Box<Expr>),
}

/// Right-hand side of `->`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Chan(Id),
    /// `*`
    Unconnected,
}

/// `[depth]` or `[depth, init]` in front of a function output.
#[derive(Debug, Clone)]
pub struct BufferSpec {
    pub depth: u64,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct FuncStmt {
    pub expr: Expr,
    pub buffer: Option<BufferSpec>,
    pub target: Target,
}

#[derive(Debug, Clone)]
pub enum DflowStmt {
    Func(FuncStmt),
    /// `{g} a -> o0, o1, *;`
    Split {
        guard: Id,
        input: Id,
        outputs: Vec<Target>,
    },
    /// `{g} a, b -> o;`
    Merge {
        guard: Id,
        inputs: Vec<Id>,
        output: Id,
    },
    /// `{*} a, b -> o;`
    Mixer { inputs: Vec<Id>, output: Id },
    /// `{|} a, b -> o, ctrl;`
    Arbiter {
        inputs: Vec<Id>,
        output: Id,
        ctrl: Id,
    },
    /// `a -> *;`
    Sink(Id),
    Cluster(Vec<FuncStmt>),
}

#[derive(Debug)]
pub struct ProcessDef {
    pub name: Id,
    pub ports: Vec<PortDef>,
    pub decls: Vec<ChannelDecl>,
    pub aliases: Vec<Alias>,
    pub dataflow: Vec<DflowStmt>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn mnemonics_are_lowercase_names() {
        assert_eq!(BinOp::Minus.as_ref(), "minus");
        assert_eq!(BinOp::Lsl.as_ref(), "lsl");
        assert_eq!(UnOp::Compl.as_ref(), "compl");
    }

    #[test]
    fn symbols_are_unique() {
        let syms: std::collections::HashSet<_> =
            BinOp::iter().map(|op| op.symbol()).collect();
        assert_eq!(syms.len(), BinOp::iter().count());
    }

    #[test]
    fn comparisons() {
        let cmps = BinOp::iter().filter(|op| op.is_comparison()).count();
        assert_eq!(cmps, 6);
    }
}
