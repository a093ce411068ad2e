//! Contract with the external logic-cost estimator.
use super::MetricsEntry;
use dflowmap_utils::{DflowResult, Error};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Input ports at or above this width take the wide-port overhead.
const WIDE_PORT: u32 = 32;
/// Delay quantum (ps) that costs one extra handshake stage.
const STAGE_DELAY: i64 = 500;

// Per narrow port, per wide port, per handshake stage.
const AREA_OVERHEAD: [f64; 3] = [1.43, 2.86, 1.43];
const LEAKAGE_OVERHEAD: [f64; 3] = [0.15, 5.36, 1.38];
const ENERGY_OVERHEAD: [f64; 3] = [4.516, 20.19, 28.544];

/// Expression over the inputs of a functional unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprNode {
    Input {
        name: String,
    },
    Const {
        value: u64,
    },
    Binary {
        op: String,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    Unary {
        op: String,
        arg: Box<ExprNode>,
    },
    Select {
        cond: Box<ExprNode>,
        then: Box<ExprNode>,
        els: Box<ExprNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub width: u32,
}

/// A named value computed by the unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub width: u32,
    pub expr: ExprNode,
}

/// Everything the estimator sees about one functional unit: its inputs,
/// the intermediate results it computes, and what drives each output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub name: String,
    pub inputs: Vec<Signal>,
    pub hidden: Vec<Assignment>,
    pub outputs: Vec<Assignment>,
}

impl EstimateRequest {
    pub fn total_input_width(&self) -> u64 {
        self.inputs.iter().map(|s| u64::from(s.width)).sum()
    }

    /// Number of (narrow, wide) input ports.
    pub fn port_classes(&self) -> (usize, usize) {
        let wide = self.inputs.iter().filter(|s| s.width >= WIDE_PORT).count();
        (self.inputs.len() - wide, wide)
    }
}

/// Estimator result in SI units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawCost {
    /// m^2
    pub area: f64,
    /// W
    pub dynamic_power: f64,
    /// W
    pub static_power: f64,
    /// s
    pub delay: f64,
}

impl RawCost {
    /// Parse `<area> <dynamic power> <static power> <delay>`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let nums = text
            .split_whitespace()
            .map(|f| f.parse::<f64>().map_err(|e| format!("`{f}': {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        match nums.as_slice() {
            [area, dynamic_power, static_power, delay] => Ok(RawCost {
                area: *area,
                dynamic_power: *dynamic_power,
                static_power: *static_power,
                delay: *delay,
            }),
            _ => Err(format!("expected 4 numbers, found {}", nums.len())),
        }
    }
}

/// Computes the cost of a functional unit the metrics cache has never seen.
pub trait CostEstimator {
    fn estimate(&mut self, request: &EstimateRequest) -> DflowResult<RawCost>;
}

/// Convert a raw estimate to engine units and add the cost of the input
/// latches and handshake ports around the synthesized logic.
pub fn normalize(
    raw: &RawCost,
    request: &EstimateRequest,
    latch: &MetricsEntry,
    two_to_one: &MetricsEntry,
) -> MetricsEntry {
    let leakage = (raw.static_power * 1e9) as i64;
    let energy = (raw.dynamic_power * raw.delay * 1e15) as i64;
    let delay = (raw.delay * 1e12) as i64;
    let area = (raw.area * 1e12) as i64;

    let total = request.total_input_width() as f64;
    let (narrow, wide) = request.port_classes();
    let stages = (delay / STAGE_DELAY) as f64;
    let adjust = |base: i64, per_bit: i64, [n, w, s]: [f64; 3]| {
        (base as f64
            + total * per_bit as f64
            + narrow as f64 * n
            + wide as f64 * w
            + stages * s) as i64
    };
    MetricsEntry {
        leakage: adjust(leakage, latch.leakage, LEAKAGE_OVERHEAD),
        energy: adjust(energy, latch.energy, ENERGY_OVERHEAD),
        delay: delay + two_to_one.delay + latch.delay,
        area: adjust(area, latch.area, AREA_OVERHEAD),
    }
}

/// Runs an external command per request. The request is written to its
/// stdin as JSON and the four numbers of a [RawCost] are read back from
/// its stdout.
#[derive(Debug, Clone)]
pub struct CommandEstimator {
    program: String,
    args: Vec<String>,
}

impl CommandEstimator {
    pub fn new(cmdline: &str) -> DflowResult<Self> {
        let mut words = cmdline.split_whitespace().map(String::from);
        let program = words
            .next()
            .ok_or_else(|| Error::misc("empty estimator command"))?;
        Ok(CommandEstimator {
            program,
            args: words.collect(),
        })
    }
}

impl CostEstimator for CommandEstimator {
    fn estimate(&mut self, request: &EstimateRequest) -> DflowResult<RawCost> {
        let fail = |msg: String| Error::synthesis(&request.name, msg);
        let payload = serde_json::to_vec(request)?;
        log::info!("Estimating `{}' with `{}'", request.name, self.program);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| fail(format!("cannot run `{}': {e}", self.program)))?;
        let stdin = child.stdin.take();
        // The request is fed from its own thread so that an estimator
        // filling stdout or stderr before reading stdin cannot block us.
        let (written, output) = thread::scope(|s| {
            let writer = s.spawn(move || -> io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(&payload)?;
                    stdin.flush()?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output
            .map_err(|e| fail(format!("cannot wait for `{}': {e}", self.program)))?;
        if !output.status.success() {
            return Err(fail(format!(
                "estimator exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(fail(format!("cannot send request: {e}"))),
            Err(_) => return Err(fail("request writer panicked".to_string())),
        }
        RawCost::parse(&String::from_utf8_lossy(&output.stdout)).map_err(fail)
    }
}
