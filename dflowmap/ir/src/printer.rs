//! Implements a formatter for the in-memory representation of processes.
//! The output is valid input to the parser.
use crate::{ChannelKind, Context, Element, Expr, Func, Identity, Process, Scope};
use itertools::Itertools;
use std::collections::HashSet;
use std::io;

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Prints out the program context.
    pub fn write_context<F: io::Write>(
        ctx: &Context,
        f: &mut F,
    ) -> io::Result<()> {
        for process in &ctx.processes {
            Self::write_process(process, f)?;
            writeln!(f)?;
        }
        Ok(())
    }

    pub fn write_process<F: io::Write>(
        process: &Process,
        f: &mut F,
    ) -> io::Result<()> {
        let sc = &process.scope;
        let ports = Self::group_ids(sc, &process.ports)
            .into_iter()
            .filter_map(|(name, id)| {
                let ch = sc.channel(id)?;
                let dir = match ch.kind {
                    ChannelKind::Port(d) => d.symbol(),
                    _ => "?",
                };
                Some(format!("chan{dir}({}) {name}", ch.ty))
            })
            .join("; ");
        writeln!(f, "defproc {}({}) {{", process.name, ports)?;

        let locals = sc
            .channels()
            .filter(|(_, ch)| !matches!(ch.kind, ChannelKind::Port(_)))
            .map(|(id, _)| id)
            .collect_vec();
        for (name, id) in Self::group_ids(sc, &locals) {
            let ty = sc.channel(id).map(|ch| ch.ty.to_string());
            writeln!(f, "  chan({}) {name};", ty.unwrap_or_default())?;
        }
        for (id, ch) in sc.channels().filter(|(id, _)| !sc.is_canonical(*id)) {
            writeln!(f, "  {} = {};", ch.name, sc.name_of(sc.canonical(id)))?;
        }

        writeln!(f, "  dataflow {{")?;
        for el in &process.elements {
            let term = if matches!(el, Element::Cluster(_)) { "" } else { ";" };
            writeln!(f, "    {}{term}", Self::element_to_str(el, sc))?;
        }
        writeln!(f, "  }}")?;
        write!(f, "}}")
    }

    /// Collapse `u[0]`, `u[1]`, ... into a single `u[N]` declaration.
    /// Every declaration is paired with the position of its first member.
    pub fn group_arrays<'a, I>(names: I) -> Vec<(String, usize)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names = names.into_iter().collect_vec();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (pos, name) in names.iter().enumerate() {
            match Self::array_base(name) {
                Some(base) => {
                    if seen.insert(base) {
                        let len = names
                            .iter()
                            .filter(|o| Self::array_base(o) == Some(base))
                            .count();
                        out.push((format!("{base}[{len}]"), pos));
                    }
                }
                None => out.push((name.to_string(), pos)),
            }
        }
        out
    }

    fn group_ids(sc: &Scope, ids: &[Identity]) -> Vec<(String, Identity)> {
        Self::group_arrays(ids.iter().map(|id| sc.name_of(*id)))
            .into_iter()
            .map(|(name, pos)| (name, ids[pos]))
            .collect()
    }

    fn array_base(name: &str) -> Option<&str> {
        let inner = name.strip_suffix(']')?;
        let (base, idx) = inner.rsplit_once('[')?;
        (!base.contains(['[', ']']) && idx.chars().all(|c| c.is_ascii_digit()))
            .then_some(base)
    }

    /// Single-line rendering of an element, without the trailing `;`.
    pub fn element_to_str(el: &Element, sc: &Scope) -> String {
        let name = |id: &Identity| sc.name_of(*id).to_string();
        let list = |ids: &[Identity]| ids.iter().map(name).join(", ");
        match el {
            Element::Func(func) => Self::func_to_str(func, sc),
            Element::Split(s) => format!(
                "{{{}}} {} -> {}",
                name(&s.guard),
                name(&s.input),
                s.outputs
                    .iter()
                    .map(|o| o.as_ref().map_or_else(|| "*".to_string(), name))
                    .join(", ")
            ),
            Element::Merge(m) => format!(
                "{{{}}} {} -> {}",
                name(&m.guard),
                list(m.inputs.as_slice()),
                name(&m.output)
            ),
            Element::Mixer(m) => {
                format!("{{*}} {} -> {}", list(m.inputs.as_slice()), name(&m.output))
            }
            Element::Arbiter(a) => format!(
                "{{|}} {} -> {}, {}",
                list(a.inputs.as_slice()),
                name(&a.output),
                name(&a.ctrl)
            ),
            Element::Sink(s) => format!("{} -> *", name(&s.input)),
            Element::Cluster(funcs) => format!(
                "dataflow_cluster {{ {} }}",
                funcs
                    .iter()
                    .map(|f| format!("{};", Self::func_to_str(f, sc)))
                    .join(" ")
            ),
        }
    }

    fn func_to_str(func: &Func, sc: &Scope) -> String {
        let buffer = match &func.buffer {
            None => String::new(),
            Some(b) => match &b.init {
                None => format!("[{}] ", b.depth),
                Some(init) => {
                    format!("[{}, {}] ", b.depth, Self::expr_to_str(init, sc))
                }
            },
        };
        let out = func
            .output
            .map_or_else(|| "*".to_string(), |o| sc.name_of(o).to_string());
        format!("{} -> {buffer}{out}", Self::expr_to_str(&func.expr, sc))
    }

    pub fn expr_to_str(e: &Expr, sc: &Scope) -> String {
        match e {
            Expr::Const(v) => v.to_string(),
            Expr::Var(id) => sc.name_of(*id).to_string(),
            Expr::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                Self::operand_str(lhs, sc),
                op.symbol(),
                Self::operand_str(rhs, sc)
            ),
            Expr::Unary { op, arg } => {
                format!("{}{}", op.source_symbol(), Self::operand_str(arg, sc))
            }
            Expr::Query { cond, then, els } => format!(
                "{} ? {} : {}",
                Self::operand_str(cond, sc),
                Self::operand_str(then, sc),
                Self::operand_str(els, sc)
            ),
            Expr::WidthCast { arg, width } => match width {
                Some(w) => format!("int({}, {w})", Self::expr_to_str(arg, sc)),
                None => format!("int({})", Self::expr_to_str(arg, sc)),
            },
        }
    }

    fn operand_str(e: &Expr, sc: &Scope) -> String {
        match e {
            Expr::Binary { .. } | Expr::Query { .. } => {
                format!("({})", Self::expr_to_str(e, sc))
            }
            _ => Self::expr_to_str(e, sc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LowerConfig, from_ast::ast_to_ir};
    use dflowmap_frontend::DflowParser;

    fn print(src: &str) -> String {
        let ctx =
            ast_to_ir(DflowParser::parse_str(src).unwrap(), LowerConfig::default())
                .unwrap();
        let mut buf = Vec::new();
        Printer::write_context(&ctx, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn printed_output_reparses_to_itself() {
        let src = "defproc p(chan?(int<8>) a, b; chan?(bool) g; chan!(int<8>) o[2]) {
               chan(int<8>) t, u[3];
               t = a;
               dataflow {
                 (a + b) * -t -> [2, 0] u[0];
                 {g} a -> u[1], *;
                 {g} a, b -> o[0];
                 {|} a, b -> o[1], u[2];
                 a < b ? int(a, 4) : b -> *;
                 dataflow_cluster { a + b -> t; a - b -> u[1]; }
               }
             }";
        let once = print(src);
        assert!(once.contains("chan!(int<8>) o[2]"));
        assert!(once.contains("chan(int<8>) u[3];"));
        assert!(once.contains("(a + b) * -a -> [2, 0] u[0];"));
        assert_eq!(print(&once), once);
    }
}
