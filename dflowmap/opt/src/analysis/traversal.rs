//! The order in which lowering consumes channel references.
//!
//! Both the use counter and the lowering pass walk elements through
//! [element_uses], so the copy output handed to the n-th reference of a
//! channel is the one the use counter planned for it.
use dflowmap_ir::{self as ir, Identity};

/// Push the channels read by `expr` onto `refs`, skipping any already
/// present. Operands are visited left to right and a ternary visits its
/// condition before its branches, which is the order in which the
/// expression lowerer assigns argument slots.
pub fn expr_refs(expr: &ir::Expr, refs: &mut Vec<Identity>) {
    match expr {
        ir::Expr::Const(_) => (),
        ir::Expr::Var(id) => {
            if !refs.contains(id) {
                refs.push(*id);
            }
        }
        ir::Expr::Binary { lhs, rhs, .. } => {
            expr_refs(lhs, refs);
            expr_refs(rhs, refs);
        }
        ir::Expr::Unary { arg, .. } | ir::Expr::WidthCast { arg, .. } => {
            expr_refs(arg, refs)
        }
        ir::Expr::Query { cond, then, els } => {
            expr_refs(cond, refs);
            expr_refs(then, refs);
            expr_refs(els, refs);
        }
    }
}

/// Channel references consumed by one lowering unit, in consumption order.
///
/// A function or a cluster of functions becomes a single functional unit
/// with one argument port per distinct channel, so each channel appears
/// once. Structural elements consume one reference per port.
pub fn element_uses(element: &ir::Element) -> Vec<Identity> {
    match element {
        ir::Element::Func(func) => {
            let mut refs = Vec::new();
            expr_refs(&func.expr, &mut refs);
            refs
        }
        ir::Element::Cluster(funcs) => {
            let mut refs = Vec::new();
            for func in funcs {
                expr_refs(&func.expr, &mut refs);
            }
            refs
        }
        ir::Element::Split(split) => vec![split.input, split.guard],
        ir::Element::Merge(merge) => std::iter::once(merge.guard)
            .chain(merge.inputs.iter().copied())
            .collect(),
        ir::Element::Mixer(mixer) => mixer.inputs.to_vec(),
        ir::Element::Arbiter(arb) => arb.inputs.to_vec(),
        ir::Element::Sink(sink) => vec![sink.input],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflowmap_ir::{BinOp, Expr, ProcessBuilder};

    #[test]
    fn expression_order_is_first_appearance() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let c = b.input("c", 8).unwrap();
        let g = b.input("g", 1).unwrap();
        // g ? (c + a) : a
        let e = Expr::query(
            Expr::var(g),
            Expr::binary(BinOp::Add, Expr::var(c), Expr::var(a)),
            Expr::var(a),
        );
        let mut refs = Vec::new();
        expr_refs(&e, &mut refs);
        assert_eq!(refs, vec![g, c, a]);
    }

    #[test]
    fn structural_port_order() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let x = b.input("x", 8).unwrap();
        let g = b.input("g", 1).unwrap();
        let o = b.output("o", 8).unwrap();
        b.split(g, a, [Some(o), None]);
        b.merge(g, [a, x, a], o);
        b.sink(x);
        let p = b.build();
        assert_eq!(element_uses(&p.elements[0]), vec![a, g]);
        assert_eq!(element_uses(&p.elements[1]), vec![g, a, x, a]);
        assert_eq!(element_uses(&p.elements[2]), vec![x]);
    }

    #[test]
    fn cluster_counts_each_channel_once() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let x = b.input("x", 8).unwrap();
        let o1 = b.output("o1", 8).unwrap();
        let o2 = b.output("o2", 8).unwrap();
        let f1 = ir::Func {
            expr: Expr::binary(BinOp::Add, Expr::var(a), Expr::var(x)),
            output: Some(o1),
            buffer: None,
        };
        let f2 = ir::Func {
            expr: Expr::binary(BinOp::Minus, Expr::var(x), Expr::var(a)),
            output: Some(o2),
            buffer: None,
        };
        b.cluster(vec![f1, f2]);
        let p = b.build();
        assert_eq!(element_uses(&p.elements[0]), vec![a, x]);
    }
}
