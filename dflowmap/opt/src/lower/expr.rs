//! Expression trees to single-assignment statements.
use crate::analysis::BitwidthIndex;
use crate::metrics::{Assignment, EstimateRequest, ExprNode, Signal};
use crate::naming::{NameBuilder, NameToken};
use dflowmap_ir::{self as ir, BinOp, Identity, UnOp};
use dflowmap_utils::{DflowResult, Error, bits_for_value};
use std::fmt::{self, Display};

use super::FUDescriptor;

/// A value read by a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Argument slot `x{n}`.
    Arg(usize),
    /// Earlier result `res{k}`.
    Res(usize),
    Const(u64),
}

impl Operand {
    /// Short form used in generated names.
    pub fn mnemonic(&self) -> String {
        match self {
            Operand::Arg(n) => n.to_string(),
            Operand::Res(k) => format!("r{k}"),
            Operand::Const(v) => format!("c{v}"),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Arg(n) => write!(f, "x{n}"),
            Operand::Res(k) => write!(f, "res{k}"),
            Operand::Const(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementOp {
    Binary {
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Unary {
        op: UnOp,
        arg: Operand,
    },
    Select {
        cond: Operand,
        then: Operand,
        els: Operand,
    },
    /// Copy an argument to a result unchanged.
    Forward(Operand),
}

/// `res{index} := ...`, computed at `width` bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub index: usize,
    pub op: StatementOp,
    pub width: u32,
}

impl Statement {
    /// Comparison results are declared as booleans.
    pub fn is_bool(&self) -> bool {
        matches!(&self.op, StatementOp::Binary { op, .. } if op.is_comparison())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res{} := ", self.index)?;
        match &self.op {
            StatementOp::Binary { op, lhs, rhs } => {
                write!(f, "{lhs} {} {rhs}", op.symbol())
            }
            StatementOp::Unary { op, arg } => write!(f, "{}{arg}", op.symbol()),
            StatementOp::Select { cond, then, els } => {
                write!(f, "{cond} ? {then} : {els}")
            }
            StatementOp::Forward(arg) => write!(f, "{arg}"),
        }
    }
}

/// Fully expanded expression of every result, in terms of the argument
/// slots. Only the metrics estimator reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExprGraph {
    nodes: Vec<ExprNode>,
}

impl ExprGraph {
    fn node(&self, operand: Operand) -> ExprNode {
        match operand {
            Operand::Arg(n) => ExprNode::Input {
                name: format!("x{n}"),
            },
            Operand::Res(k) => self.nodes[k].clone(),
            Operand::Const(value) => ExprNode::Const { value },
        }
    }

    fn push(&mut self, op: &StatementOp) {
        let node = match op {
            StatementOp::Binary { op, lhs, rhs } => ExprNode::Binary {
                op: op.symbol().to_string(),
                lhs: Box::new(self.node(*lhs)),
                rhs: Box::new(self.node(*rhs)),
            },
            StatementOp::Unary { op, arg } => ExprNode::Unary {
                op: op.source_symbol().to_string(),
                arg: Box::new(self.node(*arg)),
            },
            StatementOp::Select { cond, then, els } => ExprNode::Select {
                cond: Box::new(self.node(*cond)),
                then: Box::new(self.node(*then)),
                els: Box::new(self.node(*els)),
            },
            StatementOp::Forward(arg) => self.node(*arg),
        };
        self.nodes.push(node);
    }

    pub fn get(&self, res: usize) -> Option<&ExprNode> {
        self.nodes.get(res)
    }

    /// The estimator request for `fu`: its inputs, the results that do not
    /// drive an output, and the expression driving each output.
    pub fn request(&self, fu: &FUDescriptor) -> EstimateRequest {
        let inputs = fu
            .arg_widths
            .iter()
            .enumerate()
            .map(|(i, w)| Signal {
                name: format!("x{i}"),
                width: *w,
            })
            .collect();
        let outputs = fu
            .outputs
            .iter()
            .enumerate()
            .map(|(i, out)| Assignment {
                name: format!("out{i}"),
                width: out.width,
                expr: self.node(Operand::Res(out.result)),
            })
            .collect();
        let hidden = fu
            .statements
            .iter()
            .filter(|st| fu.outputs.iter().all(|o| o.result != st.index))
            .map(|st| Assignment {
                name: format!("res{}", st.index),
                width: st.width,
                expr: self.node(Operand::Res(st.index)),
            })
            .collect();
        EstimateRequest {
            name: fu.name.clone(),
            inputs,
            hidden,
            outputs,
        }
    }
}

/// Lowers the expressions of one functional unit.
///
/// Argument slots, result indices and the generated name are shared by all
/// expressions lowered through the same value, which is how the members of
/// a dataflow cluster end up in a single unit.
pub struct ExprLowerer<'a, 'p> {
    widths: &'a BitwidthIndex<'p>,
    /// Rendering of the element being lowered, for diagnostics.
    element: String,
    pub args: Vec<Identity>,
    pub arg_widths: Vec<u32>,
    pub statements: Vec<Statement>,
    pub name: NameBuilder,
    pub graph: ExprGraph,
}

impl<'a, 'p> ExprLowerer<'a, 'p> {
    pub fn new(widths: &'a BitwidthIndex<'p>, element: String) -> Self {
        ExprLowerer {
            widths,
            element,
            args: Vec::new(),
            arg_widths: Vec::new(),
            statements: Vec::new(),
            name: NameBuilder::default(),
            graph: ExprGraph::default(),
        }
    }

    fn malformed(&self, msg: &str) -> Error {
        Error::malformed_element(&self.element, msg)
    }

    fn arg(&mut self, id: Identity) -> DflowResult<Operand> {
        if let Some(n) = self.args.iter().position(|a| *a == id) {
            return Ok(Operand::Arg(n));
        }
        let width = self.widths.width(id)?;
        self.args.push(id);
        self.arg_widths.push(width);
        Ok(Operand::Arg(self.args.len() - 1))
    }

    fn push(&mut self, op: StatementOp, width: u32) -> usize {
        let index = self.statements.len();
        self.graph.push(&op);
        let st = Statement { index, op, width };
        log::trace!("{st}");
        self.statements.push(st);
        index
    }

    /// Width an expression has on its own, used to size the operands of a
    /// comparison.
    fn natural_width(&self, e: &ir::Expr) -> DflowResult<u32> {
        Ok(match e {
            ir::Expr::Const(v) => bits_for_value(*v),
            ir::Expr::Var(id) => self.widths.width(*id)?,
            ir::Expr::Binary { op, .. } if op.is_comparison() => 1,
            ir::Expr::Binary { lhs, rhs, .. } => {
                self.natural_width(lhs)?.max(self.natural_width(rhs)?)
            }
            ir::Expr::Unary { arg, .. } => self.natural_width(arg)?,
            ir::Expr::Query { then, els, .. } => {
                self.natural_width(then)?.max(self.natural_width(els)?)
            }
            ir::Expr::WidthCast {
                width: Some(w), ..
            } => *w,
            ir::Expr::WidthCast { arg, width: None } => self.natural_width(arg)?,
        })
    }

    /// Lower `e` with its result computed at `width` bits. Operands are
    /// lowered before the operator, left to right, and a ternary lowers its
    /// condition (at one bit) before its branches.
    pub fn lower(&mut self, e: &ir::Expr, width: u32) -> DflowResult<Operand> {
        match e {
            ir::Expr::Const(v) => Ok(Operand::Const(*v)),
            ir::Expr::Var(id) => self.arg(*id),
            ir::Expr::WidthCast { arg, width: w } => {
                self.lower(arg, w.unwrap_or(width))
            }
            ir::Expr::Unary { op, arg } => {
                let a = self.lower(arg, width)?;
                if let Operand::Const(_) = a {
                    return Err(self.malformed("unary operator on a constant"));
                }
                self.name.push(NameToken::Unary {
                    op: op.into(),
                    arg: a.mnemonic(),
                });
                let k = self.push(StatementOp::Unary { op: *op, arg: a }, width);
                Ok(Operand::Res(k))
            }
            ir::Expr::Binary { op, lhs, rhs } => {
                let (operand_width, res_width) = if op.is_comparison() {
                    let w = self.natural_width(lhs)?.max(self.natural_width(rhs)?);
                    (w, 1)
                } else {
                    (width, width)
                };
                let l = self.lower(lhs, operand_width)?;
                let r = self.lower(rhs, operand_width)?;
                if let (Operand::Const(_), Operand::Const(_)) = (l, r) {
                    return Err(self.malformed(&format!(
                        "both operands of `{}' are constants",
                        op.symbol()
                    )));
                }
                self.name.push(NameToken::Binary {
                    op: op.into(),
                    lhs: l.mnemonic(),
                    rhs: r.mnemonic(),
                    repeated: l == r,
                });
                let k = self.push(
                    StatementOp::Binary {
                        op: *op,
                        lhs: l,
                        rhs: r,
                    },
                    res_width,
                );
                Ok(Operand::Res(k))
            }
            ir::Expr::Query { cond, then, els } => {
                let c = self.lower(cond, 1)?;
                let t = self.lower(then, width)?;
                let f = self.lower(els, width)?;
                if t == f {
                    return Err(self.malformed("conditional has identical branches"));
                }
                if let (Operand::Const(_), Operand::Const(_), Operand::Const(_)) =
                    (c, t, f)
                {
                    return Err(self.malformed("conditional on constants only"));
                }
                self.name.push(NameToken::Query {
                    then: t.mnemonic(),
                    cond: c.mnemonic(),
                    els: f.mnemonic(),
                });
                let k = self.push(
                    StatementOp::Select {
                        cond: c,
                        then: t,
                        els: f,
                    },
                    width,
                );
                Ok(Operand::Res(k))
            }
        }
    }

    /// Lower a function body to the index of the result that drives its
    /// output. A body that is a bare channel reference becomes a forwarding
    /// statement.
    pub fn lower_output(&mut self, e: &ir::Expr, width: u32) -> DflowResult<usize> {
        match self.lower(e, width)? {
            Operand::Res(k) => Ok(k),
            Operand::Const(_) => Err(self.malformed("constant function body")),
            arg @ Operand::Arg(_) => {
                self.name.push(NameToken::Port);
                Ok(self.push(StatementOp::Forward(arg), width))
            }
        }
    }
}
