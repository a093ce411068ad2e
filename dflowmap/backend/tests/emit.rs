use dflowmap_backend::{Backend, ChpBackend};
use dflowmap_frontend::DflowParser;
use dflowmap_ir::{self as ir, LowerConfig};
use dflowmap_opt::metrics::MetricsCache;
use dflowmap_opt::{LowerContext, lower_process};
use dflowmap_utils::OutputFile;
use std::fs;
use std::path::Path;

const PROGRAM: &str = r#"
defproc adder(chan?(int<8>) a, b; chan?(bool) g; chan!(int<8>) o) {
  chan(int<8>) t;
  dataflow {
    a + b -> t;
    {g} t, a -> o;
  }
}

defproc adder2(chan?(int<8>) a, b; chan?(bool) g; chan!(int<8>) o) {
  chan(int<8>) t;
  dataflow {
    a + b -> t;
    {g} t, a -> o;
  }
}
"#;

const METRICS: &str = "\
# structural elements
copy_8_2_ 1 2 3 4
unpipe_merge2_1_8_ 5 6 7 8

func_0add1_8_8_8_8_8_ 9 10 11 12
";

struct Outputs {
    netlist: String,
    lib: String,
    conf: String,
}

fn compile(dir: &Path) -> Outputs {
    let metrics_path = dir.join("std.metrics");
    fs::write(&metrics_path, METRICS).unwrap();
    let mut metrics = MetricsCache::default();
    metrics.load_file(&metrics_path).unwrap();

    let ns = DflowParser::parse_str(PROGRAM).unwrap();
    let ctx = ir::from_ast::ast_to_ir(ns, LowerConfig::default()).unwrap();
    let mut lctx = LowerContext::new(ctx.config.clone(), metrics);
    let lowered: Vec<_> = ctx
        .processes
        .iter()
        .map(|p| lower_process(p, &mut lctx).unwrap())
        .collect();

    let paths = ["out.act", "lib.act", "out.conf"].map(|f| dir.join(f));
    let mut backend = ChpBackend::new(
        OutputFile::file(paths[0].clone()),
        OutputFile::file(paths[1].clone()),
        OutputFile::file(paths[2].clone()),
    );
    for p in &lowered {
        backend.emit_process(p).unwrap();
    }
    backend.finish().unwrap();
    let [netlist, lib, conf] = paths.map(|p| fs::read_to_string(p).unwrap());
    Outputs { netlist, lib, conf }
}

#[test]
fn netlist_instantiates_every_call_site() {
    let dir = tempfile::tempdir().unwrap();
    let out = compile(dir.path());
    let first = out.netlist.split("\n\n").next().unwrap();
    assert_eq!(
        first,
        "\
defproc adder(chan?(int<8>) a; chan?(int<8>) b; chan?(bool) g; chan!(int<8>) o)
{
  chan(int<8>) t;
  /* copy processes */
  dflowstd::copy<8,2> acopy(a);
  dflowstd::func_0add1_8<8,8,8,8> t_inst(acopy.out[0], b, t);
  dflowstd::unpipe_merge2<1,8> o_inst(g, t, acopy.out[1], o);
}"
    );
    assert_eq!(out.netlist.matches("dflowstd::copy<8,2>").count(), 2);
    assert!(out.netlist.contains("defproc adder2("));
}

#[test]
fn templates_and_costs_are_emitted_once() {
    let dir = tempfile::tempdir().unwrap();
    let out = compile(dir.path());
    assert!(out.lib.starts_with("namespace dflowstd {\n"));
    assert!(out.lib.ends_with("}\n"));
    assert_eq!(out.lib.matches("export defproc func_0add1_8(").count(), 1);
    assert_eq!(out.lib.matches("export defproc copy(").count(), 1);
    assert_eq!(out.lib.matches("export defproc unpipe_merge2(").count(), 1);
    assert_eq!(out.conf.matches("begin func_0add1_8_8_8_8_8_\n").count(), 1);
    assert_eq!(out.conf.matches("begin copy_8_2_\n").count(), 1);
    assert!(out.conf.contains("  real leakage 9e-9\n  int area 12\nend\n"));
}
