//! Driver for the dflowmap compiler.
use crate::cmdline::Opts;
use dflowmap_backend::{Backend, ChpBackend};
use dflowmap_frontend::DflowParser;
use dflowmap_ir::{self as ir, LowerConfig};
use dflowmap_opt::metrics::{CommandEstimator, MetricsCache};
use dflowmap_opt::{LowerContext, LoweredProcess, lower_process};
use dflowmap_utils::DflowResult;
use std::io::{self, Write};

/// Run the compiler from the command line.
pub fn run_compiler() -> DflowResult<()> {
    // parse the command line arguments into Opts struct
    let mut opts: Opts = argh::from_env();

    // enable tracing
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    compile(&mut opts)
}

/// Build the metrics cache from the metrics files and estimator named in
/// `opts`.
pub fn metrics_cache(opts: &Opts) -> DflowResult<MetricsCache> {
    let mut metrics = MetricsCache::default();
    for path in &opts.metrics {
        metrics.load_file(path)?;
    }
    if let Some(path) = &opts.custom_metrics {
        metrics.set_custom_file(path.clone())?;
    }
    if let Some(cmd) = &opts.estimator {
        metrics = metrics.with_estimator(Box::new(CommandEstimator::new(cmd)?));
    }
    Ok(metrics)
}

/// Parse, lower and emit the program named in `opts`.
pub fn compile(opts: &mut Opts) -> DflowResult<()> {
    let metrics = metrics_cache(opts)?;
    let ns = match opts.input() {
        Some(path) => DflowParser::parse_file(path)?,
        None => DflowParser::parse(io::stdin())?,
    };
    let config = LowerConfig {
        pipeline: opts.pipeline,
    };
    let ctx = ir::from_ast::ast_to_ir(ns, config)?;

    if opts.dump_ir {
        let err = &mut io::stderr();
        ir::Printer::write_context(&ctx, err)?;
    }

    let mut lctx = LowerContext::new(ctx.config.clone(), metrics);
    // Nothing is written unless every process lowers.
    let lowered = ctx
        .processes
        .iter()
        .map(|p| lower_process(p, &mut lctx))
        .collect::<DflowResult<Vec<LoweredProcess>>>()?;

    let mut backend = ChpBackend::new(
        opts.output.clone(),
        opts.lib.clone(),
        opts.conf.clone(),
    );
    for p in &lowered {
        backend.emit_process(p)?;
    }
    backend.finish()?;
    log::info!(
        "{} backend wrote {} processes",
        backend.name(),
        lowered.len()
    );

    if let Some(stats) = &mut opts.stats {
        let out = &mut stats.get_write()?;
        write!(out, "{}", lctx.stats.report()?)?;
        out.flush()?;
    }
    Ok(())
}
