//! Splits, merges, mixers, arbiters and sinks.
use super::{Instance, PortCost, ProcessLowering, Template, TemplateBody};
use crate::naming::normalize_channel;
use dflowmap_ir::{self as ir, ChannelKind, Identity, Printer};
use dflowmap_utils::{DflowResult, Error};

impl ProcessLowering<'_, '_> {
    /// Template name of a structural element with `n` data ports.
    fn structural(&self, kind: &str, n: usize) -> String {
        format!("{}_{kind}{n}", self.ctx.prefix())
    }

    /// Wires serving the reads of `el`, in traversal order.
    fn wires(&mut self, el: &ir::Element) -> DflowResult<Vec<String>> {
        Ok(self
            .resolve_uses(el)?
            .into_iter()
            .map(|(_, wire)| wire)
            .collect())
    }

    /// Will anything observe a token written to `id`?
    fn is_consumed(&self, id: Identity) -> bool {
        self.uses.is_read(id)
            || matches!(
                self.process.scope.channel(id).map(|ch| ch.kind),
                Some(ChannelKind::Port(_))
            )
    }

    fn name_of(&self, id: Identity) -> String {
        self.process.scope.name_of(id).to_string()
    }

    /// Consume `wire` with a sink.
    fn sink_wire(&mut self, wire: String, width: u32) -> DflowResult<()> {
        let key = format!("sink<{width}>");
        let metrics = self.ctx.metrics.require_structural(&key)?;
        let instance = Instance {
            key,
            name: format!("{}_sink", normalize_channel(&wire)),
            ports: vec![wire],
        };
        let template = Template {
            name: "sink".to_string(),
            body: TemplateBody::Sink,
        };
        let costs = vec![PortCost::new("x", metrics.delay, metrics.energy)];
        self.emit(template, Some(metrics), costs, instance);
        Ok(())
    }

    pub(super) fn sink(
        &mut self,
        el: &ir::Element,
        sink: &ir::Sink,
    ) -> DflowResult<()> {
        let width = self.widths.width(sink.input)?;
        for wire in self.wires(el)? {
            self.sink_wire(wire, width)?;
        }
        Ok(())
    }

    /// Outputs that are unconnected, or local channels nobody reads, are
    /// sent to fresh sinks.
    pub(super) fn split(
        &mut self,
        el: &ir::Element,
        split: &ir::Split,
    ) -> DflowResult<()> {
        let guard_width = self.widths.width(split.guard)?;
        let width = self.widths.width(split.input)?;
        let n = split.outputs.len();
        let name = self.structural("split", n);
        let key = format!("{name}<{guard_width},{width}>");
        let metrics = self.ctx.metrics.require_structural(&key)?;

        let [input, guard]: [String; 2] =
            self.wires(el)?.try_into().map_err(|wires: Vec<String>| {
                Error::inconsistent_graph(format!(
                    "split reads {} channels, expected 2",
                    wires.len()
                ))
            })?;
        let mut inst_name =
            format!("{}{}", normalize_channel(&input), normalize_channel(&guard));
        let mut ports = vec![guard, input];
        let mut sinks = Vec::new();
        for out in &split.outputs {
            match out.filter(|id| self.is_consumed(*id)) {
                Some(id) => {
                    let wire = self.name_of(id);
                    inst_name.push_str(&normalize_channel(&wire));
                    ports.push(wire);
                }
                None => {
                    if let Some(id) = out {
                        log::warn!(
                            "`{}' is never read, sinking it in `{}'",
                            self.name_of(*id),
                            Printer::element_to_str(el, &self.process.scope)
                        );
                    }
                    let wire = self.names.gen_numbered("sink").to_string();
                    self.declare_channel(&wire, width);
                    inst_name.push_str("sink_");
                    ports.push(wire.clone());
                    sinks.push(wire);
                }
            }
        }

        let costs = (0..n)
            .map(|i| PortCost::new(format!("out{i}"), metrics.delay, metrics.energy))
            .collect();
        let instance = Instance {
            key,
            name: format!("{inst_name}_inst"),
            ports,
        };
        let template = Template {
            name,
            body: TemplateBody::Split { outputs: n },
        };
        self.emit(template, Some(metrics), costs, instance);
        for wire in sinks {
            self.sink_wire(wire, width)?;
        }
        Ok(())
    }

    /// Emit a guarded or arbitrated join. `wires` are the resolved inputs
    /// (after the guard, if any) and `outs` the written channels.
    fn join(
        &mut self,
        template: Template,
        key: String,
        mut wires: Vec<String>,
        outs: &[Identity],
    ) -> DflowResult<()> {
        let metrics = self.ctx.metrics.require_structural(&key)?;
        let mut name = String::new();
        for out in outs {
            let wire = self.name_of(*out);
            if name.is_empty() {
                name = format!("{}_inst", normalize_channel(&wire));
            }
            wires.push(wire);
        }
        let instance = Instance {
            key,
            name,
            ports: wires,
        };
        let costs = vec![PortCost::new("out", metrics.delay, metrics.energy)];
        self.emit(template, Some(metrics), costs, instance);
        Ok(())
    }

    pub(super) fn merge(
        &mut self,
        el: &ir::Element,
        merge: &ir::Merge,
    ) -> DflowResult<()> {
        let guard_width = self.widths.width(merge.guard)?;
        let width = self.widths.width(merge.output)?;
        let n = merge.inputs.len();
        let name = self.structural("merge", n);
        let key = format!("{name}<{guard_width},{width}>");
        let wires = self.wires(el)?;
        let template = Template {
            name,
            body: TemplateBody::Merge { inputs: n },
        };
        self.join(template, key, wires, &[merge.output])
    }

    pub(super) fn mixer(
        &mut self,
        el: &ir::Element,
        mixer: &ir::Mixer,
    ) -> DflowResult<()> {
        let width = self.widths.width(mixer.output)?;
        let n = mixer.inputs.len();
        let name = self.structural("mixer", n);
        let key = format!("{name}<{width}>");
        let wires = self.wires(el)?;
        let template = Template {
            name,
            body: TemplateBody::Mixer { inputs: n },
        };
        self.join(template, key, wires, &[mixer.output])
    }

    pub(super) fn arbiter(
        &mut self,
        el: &ir::Element,
        arb: &ir::Arbiter,
    ) -> DflowResult<()> {
        let width = self.widths.width(arb.output)?;
        let ctrl_width = self.widths.width(arb.ctrl)?;
        let n = arb.inputs.len();
        let name = self.structural("arbiter", n);
        let key = format!("{name}<{width},{ctrl_width}>");
        let wires = self.wires(el)?;
        let template = Template {
            name,
            body: TemplateBody::Arbiter { inputs: n },
        };
        self.join(template, key, wires, &[arb.output, arb.ctrl])
    }
}
