use dflowmap_ir::{self as ir, Printer};
use dflowmap_utils::{DflowResult, Error};

/// Check the shape of one dataflow element before anything is counted or
/// lowered.
pub fn check_element(el: &ir::Element, sc: &ir::Scope) -> DflowResult<()> {
    let malformed =
        |msg: &str| Error::malformed_element(Printer::element_to_str(el, sc), msg);
    match el {
        ir::Element::Func(func) => check_func(func).map_err(|msg| malformed(msg)),
        ir::Element::Cluster(funcs) => {
            if funcs.is_empty() {
                return Err(malformed("dataflow cluster has no functions"));
            }
            funcs
                .iter()
                .try_for_each(check_func)
                .map_err(|msg| malformed(msg))
        }
        ir::Element::Split(split) => {
            if split.outputs.len() < 2 {
                Err(malformed("split requires at least 2 outputs"))
            } else {
                Ok(())
            }
        }
        ir::Element::Merge(ir::Merge { inputs, .. }) => {
            at_least_two(inputs.len(), "merge").map_err(|msg| malformed(&msg))
        }
        ir::Element::Mixer(ir::Mixer { inputs, .. }) => {
            at_least_two(inputs.len(), "mixer").map_err(|msg| malformed(&msg))
        }
        ir::Element::Arbiter(ir::Arbiter { inputs, .. }) => {
            at_least_two(inputs.len(), "arbiter").map_err(|msg| malformed(&msg))
        }
        ir::Element::Sink(_) => Ok(()),
    }
}

fn at_least_two(inputs: usize, kind: &str) -> Result<(), String> {
    if inputs < 2 {
        Err(format!(
            "{kind} requires at least 2 inputs, found {inputs}"
        ))
    } else {
        Ok(())
    }
}

fn check_func(func: &ir::Func) -> Result<(), &'static str> {
    if func.output.is_none() {
        return Err("function has no output");
    }
    let Some(buf) = &func.buffer else {
        return Ok(());
    };
    if func.expr.as_const().is_some() {
        return Err("constant source cannot be buffered");
    }
    match &buf.init {
        Some(init) if init.as_const().is_none() => {
            Err("initial token must be a constant")
        }
        None if buf.depth == 0 => {
            Err("buffer of depth 0 without an initial token")
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflowmap_ir::{BinOp, Expr, ProcessBuilder};
    use dflowmap_utils::ErrorKind;

    #[test]
    fn merge_with_one_input() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let g = b.input("g", 1).unwrap();
        let o = b.output("o", 8).unwrap();
        b.merge(g, [a], o);
        let p = b.build();
        let err = check_element(&p.elements[0], &p.scope).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedElement { .. }));
        let msg = err.to_string();
        assert!(msg.contains("{g} a -> o"), "{msg}");
        assert!(msg.contains("merge requires at least 2 inputs"), "{msg}");
    }

    #[test]
    fn arbiter_and_mixer_shapes() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let x = b.input("x", 8).unwrap();
        let o = b.output("o", 8).unwrap();
        let c = b.output("c", 1).unwrap();
        b.mixer([a], o);
        b.arbiter([a, x], o, c);
        let p = b.build();
        assert!(check_element(&p.elements[0], &p.scope).is_err());
        assert!(check_element(&p.elements[1], &p.scope).is_ok());
    }

    #[test]
    fn function_shapes() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let o = b.output("o", 8).unwrap();
        b.add(ir::Element::Func(ir::Func {
            expr: Expr::var(a),
            output: None,
            buffer: None,
        }));
        b.buffered_func(Expr::Const(3), o, 1, None);
        b.buffered_func(Expr::var(a), o, 0, None);
        b.buffered_func(
            Expr::binary(BinOp::Add, Expr::var(a), Expr::Const(1)),
            o,
            2,
            Some(0),
        );
        let p = b.build();
        let results: Vec<_> = p
            .elements
            .iter()
            .map(|el| check_element(el, &p.scope).is_ok())
            .collect();
        assert_eq!(results, vec![false, false, false, true]);
    }
}
