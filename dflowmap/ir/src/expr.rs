use crate::Identity;
use dflowmap_frontend::{BinOp, UnOp};

/// Expression computed by a function element. Expressions are read-only
/// input to lowering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(u64),
    Var(Identity),
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
    /// Fixes the width of the value computed by `arg`. A missing width
    /// keeps the width of the surrounding context.
    WidthCast {
        arg: Box<Expr>,
        width: Option<u32>,
    },
}

impl Expr {
    pub fn var(id: Identity) -> Self {
        Expr::Var(id)
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnOp, arg: Expr) -> Self {
        Expr::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    pub fn query(cond: Expr, then: Expr, els: Expr) -> Self {
        Expr::Query {
            cond: Box::new(cond),
            then: Box::new(then),
            els: Box::new(els),
        }
    }

    pub fn cast(arg: Expr, width: Option<u32>) -> Self {
        Expr::WidthCast {
            arg: Box::new(arg),
            width,
        }
    }

    /// The expression underneath any number of width casts.
    pub fn peel_casts(&self) -> &Expr {
        let mut e = self;
        while let Expr::WidthCast { arg, .. } = e {
            e = arg;
        }
        e
    }

    /// The literal value if this expression is a (possibly cast) constant.
    pub fn as_const(&self) -> Option<u64> {
        match self.peel_casts() {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    /// Rewrite every channel reference in place.
    pub fn map_identities<F>(&mut self, f: &mut F)
    where
        F: FnMut(Identity) -> Identity,
    {
        match self {
            Expr::Const(_) => (),
            Expr::Var(id) => *id = f(*id),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.map_identities(f);
                rhs.map_identities(f);
            }
            Expr::Unary { arg, .. } | Expr::WidthCast { arg, .. } => {
                arg.map_identities(f)
            }
            Expr::Query { cond, then, els } => {
                cond.map_identities(f);
                then.map_identities(f);
                els.map_identities(f);
            }
        }
    }
}
