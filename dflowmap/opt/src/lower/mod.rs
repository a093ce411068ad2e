//! Lowering of dataflow processes to circuit instances.
//!
//! A process is lowered in three steps. The use counter walks every element
//! and counts channel reads, the copy planner turns every channel read more
//! than once into a copy element, and finally each element is lowered to one
//! or more [Instance]s whose ports are resolved through the copy planner.
//!
//! Template bodies and cost blocks are deduplicated across the whole run
//! through the [InstanceCache] of the [LowerContext]; every call site still
//! gets its own instance.
mod expr;
mod func;
mod structural;

pub use expr::{ExprGraph, ExprLowerer, Operand, Statement, StatementOp};
pub use func::{BuffInfo, FUDescriptor, FuOutput};

use crate::analysis::{BitwidthIndex, CopyPlan, UseCounts, traversal};
use crate::cache::InstanceCache;
use crate::metrics::{MetricsCache, MetricsEntry, Statistics};
use dflowmap_ir::{
    self as ir, ChanType, ChannelKind, Direction, Identity, LowerConfig,
    Printer,
};
use dflowmap_utils::{DflowResult, Error, NameGenerator};
use std::time::Instant;

/// One call site: `key name(ports...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Template name with its parameters, e.g. `copy<8,3>`.
    pub key: String,
    pub name: String,
    pub ports: Vec<String>,
}

/// What a template body has to implement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateBody {
    Copy,
    Sink,
    Source,
    Buffer,
    Split { outputs: usize },
    Merge { inputs: usize },
    Mixer { inputs: usize },
    Arbiter { inputs: usize },
    Func(FUDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub body: TemplateBody,
}

/// Delay and energy charged to one port of an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCost {
    pub name: String,
    pub delay: i64,
    pub energy: i64,
}

impl PortCost {
    pub fn new<S: Into<String>>(name: S, delay: i64, energy: i64) -> Self {
        PortCost {
            name: name.into(),
            delay,
            energy,
        }
    }
}

/// Cost configuration of one parameterized instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostBlock {
    pub key: String,
    pub ports: Vec<PortCost>,
    /// `None` for functional units that were never synthesized.
    pub metrics: Option<MetricsEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDecl {
    pub name: String,
    pub direction: Direction,
    pub ty: ChanType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChanDecl {
    pub name: String,
    pub ty: ChanType,
}

/// Everything the backend needs to print one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoweredProcess {
    pub name: String,
    pub ports: Vec<PortDecl>,
    /// Local and synthesized channels.
    pub channels: Vec<ChanDecl>,
    /// Channels connected to another channel: `(name, canonical)`.
    pub aliases: Vec<(String, String)>,
    pub copies: Vec<Instance>,
    pub instances: Vec<Instance>,
    /// Templates seen for the first time in this run.
    pub templates: Vec<Template>,
    /// Cost blocks seen for the first time in this run.
    pub cost_blocks: Vec<CostBlock>,
}

/// State shared by every process of a run.
pub struct LowerContext {
    pub config: LowerConfig,
    pub cache: InstanceCache,
    pub metrics: MetricsCache,
    pub stats: Statistics,
}

impl LowerContext {
    pub fn new(config: LowerConfig, metrics: MetricsCache) -> Self {
        LowerContext {
            config,
            cache: InstanceCache::default(),
            metrics,
            stats: Statistics::default(),
        }
    }

    /// Prefix of the structural templates.
    fn prefix(&self) -> &'static str {
        if self.config.pipeline {
            "pipe"
        } else {
            "unpipe"
        }
    }
}

/// Cost of an element with one input and one output. Only the output
/// carries delay and energy.
fn io_costs(m: &MetricsEntry) -> Vec<PortCost> {
    vec![PortCost::new("in", 0, 0), PortCost::new("out", m.delay, m.energy)]
}

/// Per-process lowering state.
struct ProcessLowering<'a, 'p> {
    process: &'p ir::Process,
    widths: &'a BitwidthIndex<'p>,
    uses: &'a UseCounts,
    plan: CopyPlan,
    /// Generates names for synthesized channels. Seeded with every
    /// declared name.
    names: NameGenerator,
    ctx: &'a mut LowerContext,
    out: LoweredProcess,
}

impl ProcessLowering<'_, '_> {
    /// Intern the template and cost block of `instance` and record its
    /// cost.
    fn register(
        &mut self,
        template: Template,
        metrics: Option<MetricsEntry>,
        ports: Vec<PortCost>,
        instance: &Instance,
    ) {
        if self.ctx.cache.intern_template(&template.name) {
            self.out.templates.push(template);
        }
        if self.ctx.cache.intern_instance(&instance.key) {
            self.out.cost_blocks.push(CostBlock {
                key: instance.key.clone(),
                ports,
                metrics,
            });
        }
        if let Some(m) = &metrics {
            self.ctx.stats.record(&instance.key, m);
        }
    }

    fn emit(
        &mut self,
        template: Template,
        metrics: Option<MetricsEntry>,
        ports: Vec<PortCost>,
        instance: Instance,
    ) {
        self.register(template, metrics, ports, &instance);
        self.out.instances.push(instance);
    }

    /// Resolve the wire serving every channel read of `el`, in the order
    /// the use counter saw them.
    fn resolve_uses(
        &mut self,
        el: &ir::Element,
    ) -> DflowResult<Vec<(Identity, String)>> {
        traversal::element_uses(el)
            .into_iter()
            .map(|id| Ok((id, self.plan.next_source(id)?)))
            .collect()
    }

    fn source_of(
        &self,
        sources: &[(Identity, String)],
        id: Identity,
    ) -> DflowResult<String> {
        sources
            .iter()
            .find(|(s, _)| *s == id)
            .map(|(_, wire)| wire.clone())
            .ok_or_else(|| {
                Error::inconsistent_graph(format!(
                    "`{}' is read but was never resolved",
                    self.process.scope.name_of(id)
                ))
            })
    }

    fn declare_channel(&mut self, name: &str, width: u32) {
        self.out.channels.push(ChanDecl {
            name: name.to_string(),
            ty: ChanType::Int(u64::from(width)),
        });
    }

    fn copies(&mut self) -> DflowResult<()> {
        for copy in self.plan.copies().to_vec() {
            let key = copy.instance_key();
            let metrics = self.ctx.metrics.require_structural(&key)?;
            self.ctx.stats.record_copy(copy.width, copy.outputs);
            let instance = Instance {
                key,
                name: copy.instance_name(),
                ports: vec![copy.source.clone()],
            };
            let template = Template {
                name: "copy".to_string(),
                body: TemplateBody::Copy,
            };
            self.register(template, Some(metrics), io_costs(&metrics), &instance);
            self.out.copies.push(instance);
        }
        Ok(())
    }

    fn element(&mut self, el: &ir::Element) -> DflowResult<()> {
        match el {
            ir::Element::Func(func) => self.funcs(el, std::slice::from_ref(func)),
            ir::Element::Cluster(funcs) => self.funcs(el, funcs),
            ir::Element::Split(split) => self.split(el, split),
            ir::Element::Merge(merge) => self.merge(el, merge),
            ir::Element::Mixer(mixer) => self.mixer(el, mixer),
            ir::Element::Arbiter(arb) => self.arbiter(el, arb),
            ir::Element::Sink(sink) => self.sink(el, sink),
        }
    }
}

/// Signature, local channels and aliases of `process`. Array elements are
/// declared as a single array.
fn declarations(process: &ir::Process, out: &mut LoweredProcess) {
    let sc = &process.scope;
    let names = process.ports.iter().map(|id| sc.name_of(*id));
    for (name, pos) in Printer::group_arrays(names) {
        if let Some(ch) = sc.channel(process.ports[pos]) {
            if let ChannelKind::Port(direction) = ch.kind {
                out.ports.push(PortDecl {
                    name,
                    direction,
                    ty: ch.ty,
                });
            }
        }
    }
    let locals: Vec<_> = sc
        .channels()
        .filter(|(_, ch)| !matches!(ch.kind, ChannelKind::Port(_)))
        .collect();
    let names = locals.iter().map(|(_, ch)| ch.name.as_str());
    for (name, pos) in Printer::group_arrays(names) {
        out.channels.push(ChanDecl {
            name,
            ty: locals[pos].1.ty,
        });
    }
    for (id, ch) in sc.channels().filter(|(id, _)| !sc.is_canonical(*id)) {
        out.aliases
            .push((ch.name.to_string(), sc.name_of(sc.canonical(id)).to_string()));
    }
}

/// Lower one process. Templates and cost blocks already produced for an
/// earlier process of the run are not repeated.
pub fn lower_process(
    process: &ir::Process,
    ctx: &mut LowerContext,
) -> DflowResult<LoweredProcess> {
    let start = Instant::now();
    let widths = BitwidthIndex::build(&process.scope);
    let uses = UseCounts::collect(process)?;
    let plan = CopyPlan::plan(&uses, &widths)?;
    let names = NameGenerator::with_prev_defined_names(
        process.scope.declared_names().collect(),
    );
    let mut out = LoweredProcess {
        name: process.name.to_string(),
        ..Default::default()
    };
    declarations(process, &mut out);

    let mut lowering = ProcessLowering {
        process,
        widths: &widths,
        uses: &uses,
        plan,
        names,
        ctx,
        out,
    };
    lowering.copies()?;
    for el in &process.elements {
        lowering.element(el)?;
    }
    let out = lowering.out;
    log::info!(
        "Lowered `{}' to {} instances and {} copies in {}ms",
        process.name,
        out.instances.len(),
        out.copies.len(),
        start.elapsed().as_millis()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflowmap_ir::{BinOp, Expr, ProcessBuilder};
    use dflowmap_utils::ErrorKind;

    pub(super) fn metrics() -> MetricsCache {
        let mut m = MetricsCache::default();
        for key in [
            "copy<8,2>",
            "copy<8,3>",
            "copy<1,2>",
            "sink<8>",
            "sink<1>",
            "source<5,8>",
            "buffer<2,8>",
            "unpipe_split2<1,8>",
            "unpipe_merge2<1,8>",
            "unpipe_mixer2<8>",
            "unpipe_arbiter2<8,1>",
            "pipe_merge2<1,8>",
        ] {
            m.insert(key, MetricsEntry::new(1, 10, 100, 1000));
        }
        m.insert("func_0add1_8<8,8,8,8>", MetricsEntry::new(2, 20, 200, 2000));
        m
    }

    pub(super) fn context() -> LowerContext {
        LowerContext::new(LowerConfig::default(), metrics())
    }

    fn adder(name: &str) -> ir::Process {
        let mut b = ProcessBuilder::new(name);
        let a = b.input("a", 8).unwrap();
        let c = b.input("b", 8).unwrap();
        let o = b.output("o", 8).unwrap();
        b.func(Expr::binary(BinOp::Add, Expr::var(a), Expr::var(c)), o);
        b.build()
    }

    #[test]
    fn function_becomes_one_instance() {
        let mut ctx = context();
        let out = lower_process(&adder("p"), &mut ctx).unwrap();
        assert_eq!(
            out.instances,
            vec![Instance {
                key: "func_0add1_8<8,8,8,8>".into(),
                name: "o_inst".into(),
                ports: vec!["a".into(), "b".into(), "o".into()],
            }]
        );
        assert_eq!(out.templates.len(), 1);
        let block = &out.cost_blocks[0];
        assert_eq!(block.metrics, Some(MetricsEntry::new(2, 20, 200, 2000)));
        assert_eq!(block.ports, vec![PortCost::new("out0", 200, 20)]);
        assert_eq!(ctx.stats.total_area(), 2000);
    }

    #[test]
    fn templates_are_shared_across_processes() {
        let mut ctx = context();
        let first = lower_process(&adder("p"), &mut ctx).unwrap();
        let second = lower_process(&adder("q"), &mut ctx).unwrap();
        assert_eq!(first.templates.len(), 1);
        assert_eq!(first.cost_blocks.len(), 1);
        assert!(second.templates.is_empty());
        assert!(second.cost_blocks.is_empty());
        assert_eq!(second.instances.len(), 1);
        assert_eq!(ctx.cache.num_templates(), 1);
        assert_eq!(ctx.stats.total_area(), 4000);
    }

    /// `a0 + ... + a12 + (a{cond} ? a0 : a{els})`
    fn sum_then_select(name: &str, cond: usize, els: usize) -> ir::Process {
        let mut b = ProcessBuilder::new(name);
        let ins: Vec<_> = (0..13)
            .map(|i| b.input(format!("a{i}"), 8).unwrap())
            .collect();
        let o = b.output("o", 8).unwrap();
        let sum = ins[1..].iter().fold(Expr::var(ins[0]), |acc, id| {
            Expr::binary(BinOp::Add, acc, Expr::var(*id))
        });
        let select =
            Expr::query(Expr::var(ins[cond]), Expr::var(ins[0]), Expr::var(ins[els]));
        b.func(Expr::binary(BinOp::Add, sum, select), o);
        b.build()
    }

    #[test]
    fn unit_names_do_not_depend_on_process_order() {
        let a = sum_then_select("a", 1, 12);
        let b = sum_then_select("b", 11, 2);
        let keys = |order: [&ir::Process; 2]| {
            let mut ctx = context();
            order.map(|p| {
                lower_process(p, &mut ctx).unwrap().instances[0].key.clone()
            })
        };
        let [a_first, b_second] = keys([&a, &b]);
        let [b_first, a_second] = keys([&b, &a]);
        assert_eq!(a_first, a_second);
        assert_eq!(b_first, b_second);
        assert_ne!(a_first, b_first);
        assert!(a_first.contains("_0q1e12_"), "{a_first}");
        assert!(b_first.contains("_0q11e2_"), "{b_first}");
        assert!(!a_first.contains("_h") && !b_first.contains("_h"));
    }

    #[test]
    fn fan_out_is_served_by_copy_ports() {
        let mut b = ProcessBuilder::new("p");
        let v = b.input("v", 8).unwrap();
        let outs: Vec<_> = (0..3)
            .map(|i| b.output(format!("o{i}"), 8).unwrap())
            .collect();
        for (i, o) in outs.iter().enumerate() {
            let e = Expr::binary(BinOp::Add, Expr::var(v), Expr::Const(i as u64 + 1));
            b.func(e, *o);
        }
        let p = b.build();
        let mut ctx = context();
        let out = lower_process(&p, &mut ctx).unwrap();
        assert_eq!(out.copies.len(), 1);
        assert_eq!(out.copies[0].key, "copy<8,3>");
        assert_eq!(out.copies[0].ports, vec!["v"]);
        let firsts: Vec<_> =
            out.instances.iter().map(|i| i.ports[0].as_str()).collect();
        assert_eq!(firsts, vec!["vcopy.out[0]", "vcopy.out[1]", "vcopy.out[2]"]);
        assert_eq!(ctx.stats.copy_count(8, 3), 1);
    }

    #[test]
    fn missing_structural_metrics_is_fatal() {
        let mut b = ProcessBuilder::new("p");
        let v = b.input("v", 4).unwrap();
        b.sink(v);
        let p = b.build();
        let err = lower_process(&p, &mut context()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingMetrics(k) if k == "sink_4_"));
    }

    #[test]
    fn buffered_output_goes_through_buffer() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let c = b.input("b", 8).unwrap();
        let o = b.output("o", 8).unwrap();
        b.buffered_func(
            Expr::binary(BinOp::Add, Expr::var(a), Expr::var(c)),
            o,
            2,
            Some(0),
        );
        let p = b.build();
        let mut ctx = context();
        let out = lower_process(&p, &mut ctx).unwrap();
        assert_eq!(out.channels, vec![ChanDecl {
            name: "o_buf".into(),
            ty: ChanType::Int(8),
        }]);
        assert_eq!(out.instances.len(), 2);
        assert_eq!(out.instances[0].key, "func_0add1_init0_8<8,8,8,8>");
        assert_eq!(out.instances[0].ports, vec!["a", "b", "o_buf"]);
        assert_eq!(out.instances[1].key, "buffer<2,8>");
        assert_eq!(out.instances[1].ports, vec!["o_buf", "o"]);
        let TemplateBody::Func(fu) = &out.templates[0].body else {
            panic!("expected a functional unit first");
        };
        assert_eq!(fu.outputs[0].init, Some(0));
        assert_eq!(fu.buffers.len(), 1);
        // No estimator: the unit is emitted without metrics.
        assert_eq!(out.cost_blocks[0].metrics, None);
    }

    #[test]
    fn constant_function_is_a_source() {
        let mut b = ProcessBuilder::new("p");
        let o = b.output("o", 8).unwrap();
        b.func(Expr::Const(5), o);
        let p = b.build();
        let out = lower_process(&p, &mut context()).unwrap();
        assert_eq!(out.instances[0].key, "source<5,8>");
        assert_eq!(out.instances[0].ports, vec!["o"]);
        assert_eq!(out.cost_blocks[0].ports, vec![PortCost::new("x", 100, 10)]);
    }

    #[test]
    fn oversized_constant_is_rejected() {
        let mut b = ProcessBuilder::new("p");
        let o = b.output("o", 2).unwrap();
        b.func(Expr::Const(5), o);
        let p = b.build();
        let err = lower_process(&p, &mut context()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedElement { .. }));
    }

    #[test]
    fn cluster_is_one_unit() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let c = b.input("b", 8).unwrap();
        let x = b.output("x", 8).unwrap();
        let y = b.output("y", 8).unwrap();
        let z = b.output("z", 8).unwrap();
        let member = |expr, out| ir::Func {
            expr,
            output: Some(out),
            buffer: None,
        };
        b.cluster(vec![
            member(Expr::binary(BinOp::Add, Expr::var(a), Expr::var(c)), x),
            member(Expr::binary(BinOp::Minus, Expr::var(a), Expr::var(c)), y),
            member(Expr::Const(5), z),
        ]);
        let p = b.build();
        let mut ctx = context();
        let out = lower_process(&p, &mut ctx).unwrap();
        assert!(out.copies.is_empty());
        let keys: Vec<_> = out.instances.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["source<5,8>", "func_0add1_8_p0_0minus1_8_p1<8,8,8,8,8,8>"]
        );
        assert_eq!(out.instances[1].name, "x_y_inst");
        assert_eq!(out.instances[1].ports, vec!["a", "b", "x", "y"]);
    }
}
