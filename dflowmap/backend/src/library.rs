//! CHP bodies of the templates instantiated by the netlist.
use dflowmap_opt::lower::{FUDescriptor, Template, TemplateBody};
use itertools::Itertools;
use std::io;

/// Print the body of `template`, exported from the enclosing namespace.
pub fn write_template<F: io::Write>(
    template: &Template,
    f: &mut F,
) -> io::Result<()> {
    let name = template.name.as_str();
    match &template.body {
        TemplateBody::Func(fu) => write_func(fu, f),
        TemplateBody::Copy => write_copy(name, f),
        TemplateBody::Sink => write_sink(name, f),
        TemplateBody::Source => write_source(name, f),
        TemplateBody::Buffer => write_buffer(name, f),
        TemplateBody::Split { outputs } => write_split(name, *outputs, f),
        TemplateBody::Merge { inputs } => write_merge(name, *inputs, f),
        TemplateBody::Mixer { inputs } => write_mixer(name, *inputs, f, false),
        TemplateBody::Arbiter { inputs } => write_mixer(name, *inputs, f, true),
    }
}

/// Reference to a result as it is sent on an integer channel.
fn result_ref(fu: &FUDescriptor, res: usize) -> String {
    match fu.statements.get(res) {
        Some(st) if st.is_bool() => format!("int(res{res})"),
        _ => format!("res{res}"),
    }
}

fn write_func<F: io::Write>(fu: &FUDescriptor, f: &mut F) -> io::Result<()> {
    let n_args = fu.arg_widths.len();
    let n_outs = fu.outputs.len();
    let params = (0..fu.params().len()).map(|i| format!("W{i}")).join(", ");
    writeln!(f, "template<pint {params}>")?;
    let ports = (0..n_args)
        .map(|i| format!("chan?(int<W{i}>)arg{i}"))
        .chain((0..n_outs).map(|j| format!("chan!(int<W{}>) out{j}", n_args + j)))
        .join("; ");
    writeln!(f, "export defproc {}({ports})", fu.name)?;
    writeln!(f, "{{")?;
    for i in 0..n_args {
        writeln!(f, "  int<W{i}> x{i};")?;
    }
    for st in &fu.statements {
        if st.is_bool() {
            writeln!(f, "  bool res{};", st.index)?;
        } else {
            writeln!(f, "  int<W{}> res{};", n_args + n_outs + st.index, st.index)?;
        }
    }
    writeln!(f, "  chp {{")?;
    for (j, out) in fu.outputs.iter().enumerate() {
        if let Some(v) = out.init {
            writeln!(f, "    out{j}!{v};")?;
        }
    }
    writeln!(f, "    *[")?;
    let recv = (0..n_args).map(|i| format!("arg{i}?x{i}")).join(", ");
    writeln!(f, "      {recv};")?;
    let xs = (0..n_args).map(|i| format!("x{i}")).join(", \", \", ");
    writeln!(f, "      log(\"receive (\", {xs}, \")\");")?;
    for st in &fu.statements {
        writeln!(f, "      {st};")?;
    }
    let sends = fu
        .outputs
        .iter()
        .enumerate()
        .map(|(j, o)| format!("out{j}!{}", result_ref(fu, o.result)))
        .join(", ");
    writeln!(f, "      {sends};")?;
    let sent = fu
        .outputs
        .iter()
        .map(|o| format!("res{}", o.result))
        .join(", \", \", ");
    writeln!(f, "      log(\"send (\", {sent}, \")\")")?;
    writeln!(f, "    ]")?;
    writeln!(f, "  }}")?;
    writeln!(f, "}}")
}

fn write_copy<F: io::Write>(name: &str, f: &mut F) -> io::Result<()> {
    writeln!(f, "template<pint W, N>")?;
    writeln!(f, "export defproc {name}(chan?(int<W>) in; chan!(int<W>) out[N])")?;
    writeln!(f, "{{")?;
    writeln!(f, "  int<W> x;")?;
    writeln!(f, "  chp {{")?;
    writeln!(
        f,
        "    *[ in?x; log(\"receive \", x); (,i:N: out[i]!x; log(\"send \", i, \": \", x) )]"
    )?;
    writeln!(f, "  }}")?;
    writeln!(f, "}}")
}

fn write_sink<F: io::Write>(name: &str, f: &mut F) -> io::Result<()> {
    writeln!(f, "template<pint W>")?;
    writeln!(f, "export defproc {name}(chan?(int<W>) in)")?;
    writeln!(f, "{{")?;
    writeln!(f, "  int<W> t;")?;
    writeln!(f, "  chp {{")?;
    writeln!(f, "    *[in?t; log (\"got \", t)]")?;
    writeln!(f, "  }}")?;
    writeln!(f, "}}")
}

fn write_source<F: io::Write>(name: &str, f: &mut F) -> io::Result<()> {
    writeln!(f, "template<pint V, W>")?;
    writeln!(f, "export defproc {name}(chan!(int<W>)x)")?;
    writeln!(f, "{{")?;
    writeln!(f, "  chp {{")?;
    writeln!(f, "    *[log(\"send \", V); x!V]")?;
    writeln!(f, "  }}")?;
    writeln!(f, "}}")
}

/// A depth-`D` buffer is a chain of single-slot stages.
fn write_buffer<F: io::Write>(name: &str, f: &mut F) -> io::Result<()> {
    writeln!(f, "template<pint W>")?;
    writeln!(f, "defproc {name}_stage(chan?(int<W>)in; chan!(int<W>) out)")?;
    writeln!(f, "{{")?;
    writeln!(f, "  int<W> x;")?;
    writeln!(f, "  chp {{")?;
    writeln!(f, "    *[in?x; out!x; log(\"send \", x)]")?;
    writeln!(f, "  }}")?;
    writeln!(f, "}}")?;
    writeln!(f)?;
    writeln!(f, "template<pint D, W>")?;
    writeln!(f, "export defproc {name}(chan?(int<W>)in; chan!(int<W>) out)")?;
    writeln!(f, "{{")?;
    writeln!(f, "  {name}_stage<W> s[D];")?;
    writeln!(f, "  s[0].in = in;")?;
    writeln!(f, "  (i:D-1: s[i].out = s[i+1].in;)")?;
    writeln!(f, "  s[D-1].out = out;")?;
    writeln!(f, "}}")
}

fn write_split<F: io::Write>(name: &str, n: usize, f: &mut F) -> io::Result<()> {
    let outs = (0..n).map(|i| format!("chan!(int<W2>) out{i}")).join("; ");
    writeln!(f, "template<pint W1, W2>")?;
    writeln!(
        f,
        "export defproc {name}(chan?(int<W1>)ctrl; chan?(int<W2>) in; {outs})"
    )?;
    writeln!(f, "{{")?;
    writeln!(f, "  int<W1> c;")?;
    writeln!(f, "  int<W2> x;")?;
    writeln!(f, "  chp {{")?;
    let arms = (0..n).map(|i| format!("c={i} -> out{i}!x")).join(" [] ");
    writeln!(
        f,
        "    *[in?x, ctrl?c; log(\"receive \", c, \", \", x); [{arms}]; log(\"send \", c)]"
    )?;
    writeln!(f, "  }}")?;
    writeln!(f, "}}")
}

fn write_merge<F: io::Write>(name: &str, n: usize, f: &mut F) -> io::Result<()> {
    let ins = (0..n).map(|i| format!("chan?(int<W2>) in{i}")).join("; ");
    writeln!(f, "template<pint W1, W2>")?;
    writeln!(
        f,
        "export defproc {name}(chan?(int<W1>)ctrl; {ins}; chan!(int<W2>) out)"
    )?;
    writeln!(f, "{{")?;
    writeln!(f, "  int<W1> c;")?;
    writeln!(f, "  int<W2> x;")?;
    writeln!(f, "  chp {{")?;
    let arms = (0..n).map(|i| format!("c={i} -> in{i}?x")).join(" [] ");
    writeln!(
        f,
        "    *[ctrl?c; log(\"receive \", c); [{arms}]; log(\"receive \", x); out!x; log(\"send \", x)]"
    )?;
    writeln!(f, "  }}")?;
    writeln!(f, "}}")
}

/// Mixers forward whichever input arrives first. Arbiters additionally
/// report the index of that input on `ctrl`.
fn write_mixer<F: io::Write>(
    name: &str,
    n: usize,
    f: &mut F,
    arbiter: bool,
) -> io::Result<()> {
    let ins = (0..n).map(|i| format!("chan?(int<W>) in{i}")).join("; ");
    if arbiter {
        writeln!(f, "template<pint W, C>")?;
        writeln!(
            f,
            "export defproc {name}({ins}; chan!(int<W>) out; chan!(int<C>) ctrl)"
        )?;
    } else {
        writeln!(f, "template<pint W>")?;
        writeln!(f, "export defproc {name}({ins}; chan!(int<W>) out)")?;
    }
    writeln!(f, "{{")?;
    writeln!(f, "  int<W> x;")?;
    writeln!(f, "  chp {{")?;
    let arms = (0..n)
        .map(|i| {
            if arbiter {
                format!("#in{i} -> in{i}?x; ctrl!{i}")
            } else {
                format!("#in{i} -> in{i}?x")
            }
        })
        .join(" [] ");
    writeln!(f, "    *[[| {arms} |]; out!x; log(\"send \", x)]")?;
    writeln!(f, "  }}")?;
    writeln!(f, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflowmap_ir::BinOp;
    use dflowmap_opt::lower::{FuOutput, Operand, Statement, StatementOp};

    fn render(t: &Template) -> String {
        let mut buf = Vec::new();
        write_template(t, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn functional_unit_body() {
        let fu = FUDescriptor {
            name: "func_0lt1_8".to_string(),
            arg_widths: vec![8, 8],
            statements: vec![Statement {
                index: 0,
                op: StatementOp::Binary {
                    op: BinOp::Lt,
                    lhs: Operand::Arg(0),
                    rhs: Operand::Arg(1),
                },
                width: 1,
            }],
            outputs: vec![FuOutput {
                result: 0,
                width: 1,
                init: Some(0),
            }],
            buffers: vec![],
        };
        let text = render(&Template {
            name: fu.name.clone(),
            body: TemplateBody::Func(fu),
        });
        insta::assert_snapshot!(text, @r#"
        template<pint W0, W1, W2, W3>
        export defproc func_0lt1_8(chan?(int<W0>)arg0; chan?(int<W1>)arg1; chan!(int<W2>) out0)
        {
          int<W0> x0;
          int<W1> x1;
          bool res0;
          chp {
            out0!0;
            *[
              arg0?x0, arg1?x1;
              log("receive (", x0, ", ", x1, ")");
              res0 := x0 < x1;
              out0!int(res0);
              log("send (", res0, ")")
            ]
          }
        }
        "#);
    }

    #[test]
    fn merge_arms_follow_input_count() {
        let text = render(&Template {
            name: "unpipe_merge3".to_string(),
            body: TemplateBody::Merge { inputs: 3 },
        });
        assert!(text.contains(
            "export defproc unpipe_merge3(chan?(int<W1>)ctrl; chan?(int<W2>) in0; chan?(int<W2>) in1; chan?(int<W2>) in2; chan!(int<W2>) out)"
        ));
        assert!(text.contains("[c=0 -> in0?x [] c=1 -> in1?x [] c=2 -> in2?x]"));
    }

    #[test]
    fn arbiter_reports_the_winner() {
        let text = render(&Template {
            name: "pipe_arbiter2".to_string(),
            body: TemplateBody::Arbiter { inputs: 2 },
        });
        assert!(text.starts_with("template<pint W, C>\n"));
        assert!(text.contains("[| #in0 -> in0?x; ctrl!0 [] #in1 -> in1?x; ctrl!1 |]"));
    }
}
