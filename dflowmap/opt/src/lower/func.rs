//! Functions and dataflow clusters to functional units.
use super::{
    ExprLowerer, Instance, PortCost, ProcessLowering, Statement, StatementOp,
    Template, TemplateBody, io_costs,
};
use crate::metrics::MetricsEntry;
use crate::naming::{NameToken, normalize_channel};
use dflowmap_ir::{self as ir, Identity, Printer};
use dflowmap_utils::{DflowResult, Error, fits_in_width};
use itertools::Itertools;

/// A buffered function output.
///
/// The functional unit drives an intermediate channel which a
/// `buffer<depth,width>` instance forwards to the declared output. The
/// initial token is sent by the unit itself, ahead of its first result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuffInfo {
    pub output: usize,
    pub width: u32,
    pub depth: u64,
    pub init: Option<u64>,
    pub metrics: MetricsEntry,
}

impl BuffInfo {
    pub fn instance_key(&self) -> String {
        format!("buffer<{},{}>", self.depth, self.width)
    }
}

/// One output of a functional unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuOutput {
    /// Result that is sent on the output.
    pub result: usize,
    pub width: u32,
    /// Token sent once before the first result.
    pub init: Option<u64>,
}

/// Everything needed to emit and cost the template of one functional unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FUDescriptor {
    pub name: String,
    pub arg_widths: Vec<u32>,
    pub statements: Vec<Statement>,
    pub outputs: Vec<FuOutput>,
    pub buffers: Vec<BuffInfo>,
}

impl FUDescriptor {
    pub fn res_widths(&self) -> impl Iterator<Item = u32> + '_ {
        self.statements.iter().map(|s| s.width)
    }

    pub fn out_widths(&self) -> impl Iterator<Item = u32> + '_ {
        self.outputs.iter().map(|o| o.width)
    }

    /// Template width parameters in declaration order: arguments, outputs,
    /// results.
    pub fn params(&self) -> Vec<u32> {
        self.arg_widths
            .iter()
            .copied()
            .chain(self.out_widths())
            .chain(self.res_widths())
            .collect()
    }

    /// `name<argWidths..., outWidths..., resWidths...>`
    pub fn instance_key(&self) -> String {
        format!("{}<{}>", self.name, self.params().iter().join(","))
    }

    /// Does the unit only copy arguments to outputs?
    pub fn is_forward(&self) -> bool {
        self.statements
            .iter()
            .all(|s| matches!(s.op, StatementOp::Forward(_)))
    }

    /// Width-independent text of the template body.
    pub fn body(&self) -> String {
        let outs = self
            .outputs
            .iter()
            .enumerate()
            .map(|(i, o)| match o.init {
                Some(v) => format!("out{i}!{v}:res{}", o.result),
                None => format!("out{i}!res{}", o.result),
            })
            .join(",");
        format!(
            "{}|{}|{outs}",
            self.arg_widths.len(),
            self.statements.iter().join(";")
        )
    }
}

impl ProcessLowering<'_, '_> {
    /// Lower a function or a cluster of functions to a single functional
    /// unit. Constant members become sources.
    pub(super) fn funcs(
        &mut self,
        el: &ir::Element,
        funcs: &[ir::Func],
    ) -> DflowResult<()> {
        let process = self.process;
        let widths = self.widths;
        let sc = &process.scope;
        let desc = Printer::element_to_str(el, sc);
        let sources = self.resolve_uses(el)?;
        let cluster = matches!(el, ir::Element::Cluster(_));

        let mut lowerer = ExprLowerer::new(widths, desc.clone());
        let mut outputs = Vec::new();
        let mut out_ports = Vec::new();
        let mut out_names = Vec::new();
        let mut pending_buffers = Vec::new();
        for (member, func) in funcs.iter().enumerate() {
            let out = func.output.ok_or_else(|| {
                Error::malformed_element(&desc, "function has no output")
            })?;
            let width = widths.width(out)?;
            let out_name = sc.name_of(out).to_string();
            if let Some(value) = func.expr.as_const() {
                self.source(value, out, &desc)?;
                continue;
            }
            let result = lowerer.lower_output(&func.expr, width)?;
            let buffer = func.buffer.as_ref();
            let init = buffer
                .and_then(|b| b.init.as_ref())
                .and_then(|e| e.as_const());
            if let Some(v) = init {
                if !fits_in_width(v, width) {
                    return Err(Error::malformed_element(
                        &desc,
                        format!(
                            "initial token {v} does not fit in {width} bits"
                        ),
                    ));
                }
                lowerer.name.push(NameToken::Init(v));
            }
            lowerer.name.push(NameToken::Width(width));
            if cluster {
                lowerer.name.push(NameToken::Member(member));
            }
            let norm = normalize_channel(&out_name);
            match buffer.filter(|b| b.depth > 0) {
                Some(b) => {
                    let buf_chan =
                        self.names.gen_name(format!("{norm}_buf")).to_string();
                    self.declare_channel(&buf_chan, width);
                    let info = BuffInfo {
                        output: outputs.len(),
                        width,
                        depth: b.depth,
                        init,
                        metrics: MetricsEntry::default(),
                    };
                    out_ports.push(buf_chan.clone());
                    pending_buffers.push((info, buf_chan, out_name.clone()));
                }
                None => out_ports.push(out_name.clone()),
            }
            out_names.push(norm);
            outputs.push(FuOutput {
                result,
                width,
                init,
            });
        }
        if lowerer.statements.is_empty() {
            return Ok(());
        }

        let mut buffers = Vec::with_capacity(pending_buffers.len());
        for (info, _, _) in &mut pending_buffers {
            info.metrics =
                self.ctx.metrics.require_structural(&info.instance_key())?;
            buffers.push(info.clone());
        }

        let mut fu = FUDescriptor {
            name: lowerer.name.render(),
            arg_widths: lowerer.arg_widths.clone(),
            statements: lowerer.statements.clone(),
            outputs,
            buffers,
        };
        let body = fu.body();
        fu.name = self.ctx.cache.disambiguate(fu.name, &body);
        log::debug!("{desc} => {}", fu.instance_key());
        for st in &fu.statements {
            log::debug!("  {st}");
        }
        let metrics = self.ctx.metrics.get_or_synthesize(&fu, &lowerer.graph)?;

        let mut ports = lowerer
            .args
            .iter()
            .map(|id| self.source_of(&sources, *id))
            .collect::<DflowResult<Vec<_>>>()?;
        ports.extend(out_ports);
        let instance = Instance {
            key: fu.instance_key(),
            name: format!("{}_inst", out_names.join("_")),
            ports,
        };
        let n_outs = fu.outputs.len() as i64;
        let costs = metrics.map(|m| {
            (0..fu.outputs.len())
                .map(|i| {
                    PortCost::new(format!("out{i}"), m.delay, m.energy / n_outs)
                })
                .collect()
        });
        let template = Template {
            name: fu.name.clone(),
            body: TemplateBody::Func(fu),
        };
        self.emit(template, metrics, costs.unwrap_or_default(), instance);

        for (info, buf_chan, out_name) in pending_buffers {
            self.buffer(&info, buf_chan, out_name);
        }
        Ok(())
    }

    fn buffer(&mut self, info: &BuffInfo, input: String, output: String) {
        let key = info.instance_key();
        let instance = Instance {
            key,
            name: format!("{input}_inst"),
            ports: vec![input, output],
        };
        let template = Template {
            name: "buffer".to_string(),
            body: TemplateBody::Buffer,
        };
        self.emit(
            template,
            Some(info.metrics),
            io_costs(&info.metrics),
            instance,
        );
    }

    /// A function with a constant body becomes a source of that constant.
    pub(super) fn source(
        &mut self,
        value: u64,
        out: Identity,
        desc: &str,
    ) -> DflowResult<()> {
        let width = self.widths.width(out)?;
        if !fits_in_width(value, width) {
            return Err(Error::malformed_element(
                desc,
                format!("constant {value} does not fit in {width} bits"),
            ));
        }
        let key = format!("source<{value},{width}>");
        let metrics = match self.ctx.metrics.lookup(&key) {
            Some(m) => m,
            None => self
                .ctx
                .metrics
                .require_structural(&format!("source{width}"))?,
        };
        let out_name = self.process.scope.name_of(out).to_string();
        let instance = Instance {
            key,
            name: format!("{}_inst", normalize_channel(&out_name)),
            ports: vec![out_name],
        };
        let template = Template {
            name: "source".to_string(),
            body: TemplateBody::Source,
        };
        let costs = vec![PortCost::new("x", metrics.delay, metrics.energy)];
        self.emit(template, Some(metrics), costs, instance);
        Ok(())
    }
}
