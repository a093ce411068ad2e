//! CHP netlist backend.
//!
//! Writes three outputs: the netlist with one `defproc` per lowered
//! process, the library holding the template bodies, and the cost
//! configuration read by the simulator.
use crate::library::write_template;
use crate::traits::Backend;
use dflowmap_opt::LoweredProcess;
use dflowmap_opt::lower::{CostBlock, Instance};
use dflowmap_opt::naming::normalize_key;
use dflowmap_utils::{DflowResult, OutputFile};
use itertools::Itertools;
use std::io::{self, Write};

/// Namespace of every template in the library.
pub const NAMESPACE: &str = "dflowstd";

pub struct ChpBackend {
    netlist: OutputFile,
    lib: OutputFile,
    conf: OutputFile,
    /// Has the library namespace been opened?
    lib_open: bool,
}

impl ChpBackend {
    pub fn new(netlist: OutputFile, lib: OutputFile, conf: OutputFile) -> Self {
        ChpBackend {
            netlist,
            lib,
            conf,
            lib_open: false,
        }
    }

    fn open_lib<F: io::Write>(&mut self, f: &mut F) -> io::Result<()> {
        if !self.lib_open {
            self.lib_open = true;
            writeln!(f, "namespace {NAMESPACE} {{")?;
            writeln!(f)?;
        }
        Ok(())
    }
}

fn write_instance<F: io::Write>(inst: &Instance, f: &mut F) -> io::Result<()> {
    writeln!(
        f,
        "  {NAMESPACE}::{} {}({});",
        inst.key,
        inst.name,
        inst.ports.join(", ")
    )
}

/// Print the `defproc` of a lowered process.
pub fn write_process<F: io::Write>(
    p: &LoweredProcess,
    f: &mut F,
) -> io::Result<()> {
    let ports = p
        .ports
        .iter()
        .map(|port| {
            format!("chan{}({}) {}", port.direction.symbol(), port.ty, port.name)
        })
        .join("; ");
    writeln!(f, "defproc {}({ports})", p.name)?;
    writeln!(f, "{{")?;
    for ch in &p.channels {
        writeln!(f, "  chan({}) {};", ch.ty, ch.name)?;
    }
    for (name, canonical) in &p.aliases {
        writeln!(f, "  {name} = {canonical};")?;
    }
    writeln!(f, "  /* copy processes */")?;
    for inst in &p.copies {
        write_instance(inst, f)?;
    }
    for inst in &p.instances {
        write_instance(inst, f)?;
    }
    writeln!(f, "}}")
}

/// Print the configuration block of one parameterized instance.
pub fn write_cost_block<F: io::Write>(
    block: &CostBlock,
    f: &mut F,
) -> io::Result<()> {
    writeln!(f, "begin {}", normalize_key(&block.key))?;
    if let Some(m) = &block.metrics {
        for port in &block.ports {
            writeln!(f, "  begin {}", port.name)?;
            writeln!(f, "    int D {}", port.delay)?;
            writeln!(f, "    int E {}", port.energy)?;
            writeln!(f, "  end")?;
        }
        writeln!(f, "  real leakage {}e-9", m.leakage)?;
        writeln!(f, "  int area {}", m.area)?;
    }
    writeln!(f, "end")
}

impl Backend for ChpBackend {
    fn name(&self) -> &'static str {
        "chp"
    }

    fn emit_process(&mut self, process: &LoweredProcess) -> DflowResult<()> {
        let out = &mut self.netlist.get_write()?;
        write_process(process, out)?;
        writeln!(out)?;
        out.flush()?;

        if !process.templates.is_empty() {
            let lib = &mut self.lib.get_write()?;
            self.open_lib(lib)?;
            for template in &process.templates {
                write_template(template, lib)?;
                writeln!(lib)?;
            }
            lib.flush()?;
        }

        let conf = &mut self.conf.get_write()?;
        for block in &process.cost_blocks {
            write_cost_block(block, conf)?;
        }
        conf.flush()?;
        log::debug!(
            "Wrote `{}': {} templates, {} cost blocks",
            process.name,
            process.templates.len(),
            process.cost_blocks.len()
        );
        Ok(())
    }

    fn finish(&mut self) -> DflowResult<()> {
        let lib = &mut self.lib.get_write()?;
        self.open_lib(lib)?;
        writeln!(lib, "}}")?;
        lib.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflowmap_ir::{ChanType, Direction};
    use dflowmap_opt::lower::{ChanDecl, PortCost, PortDecl};
    use dflowmap_opt::metrics::MetricsEntry;

    #[test]
    fn process_layout() {
        let p = LoweredProcess {
            name: "fanout".to_string(),
            ports: vec![
                PortDecl {
                    name: "v".into(),
                    direction: Direction::Input,
                    ty: ChanType::Int(8),
                },
                PortDecl {
                    name: "o[2]".into(),
                    direction: Direction::Output,
                    ty: ChanType::Int(8),
                },
            ],
            channels: vec![ChanDecl {
                name: "sink0".into(),
                ty: ChanType::Int(8),
            }],
            copies: vec![Instance {
                key: "copy<8,2>".into(),
                name: "vcopy".into(),
                ports: vec!["v".into()],
            }],
            instances: vec![Instance {
                key: "func_0addc1_8<8,8,8>".into(),
                name: "o_0_inst".into(),
                ports: vec!["vcopy.out[0]".into(), "o[0]".into()],
            }],
            ..Default::default()
        };
        let mut buf = Vec::new();
        write_process(&p, &mut buf).unwrap();
        insta::assert_snapshot!(String::from_utf8(buf).unwrap(), @r"
        defproc fanout(chan?(int<8>) v; chan!(int<8>) o[2])
        {
          chan(int<8>) sink0;
          /* copy processes */
          dflowstd::copy<8,2> vcopy(v);
          dflowstd::func_0addc1_8<8,8,8> o_0_inst(vcopy.out[0], o[0]);
        }
        ");
    }

    #[test]
    fn cost_block_layout() {
        let block = CostBlock {
            key: "copy<8,2>".into(),
            ports: vec![PortCost::new("in", 0, 0), PortCost::new("out", 30, 4)],
            metrics: Some(MetricsEntry::new(12, 4, 30, 56)),
        };
        let mut buf = Vec::new();
        write_cost_block(&block, &mut buf).unwrap();
        insta::assert_snapshot!(String::from_utf8(buf).unwrap(), @r"
        begin copy_8_2_
          begin in
            int D 0
            int E 0
          end
          begin out
            int D 30
            int E 4
          end
          real leakage 12e-9
          int area 56
        end
        ");
    }

    #[test]
    fn unsynthesized_unit_has_an_empty_block() {
        let block = CostBlock {
            key: "func_port_8<8,8,8>".into(),
            ports: vec![],
            metrics: None,
        };
        let mut buf = Vec::new();
        write_cost_block(&block, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "begin func_port_8_8_8_8_\nend\n"
        );
    }
}
