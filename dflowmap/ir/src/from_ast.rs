//! Conversion from the frontend AST to the IR.
use super::{Context, Element, Expr, Func, LowerConfig, Process, ProcessBuilder};
use crate::{Buffer, Identity};
use dflowmap_frontend::ast;
use dflowmap_utils::{DflowResult, Error, Id};
use smallvec::SmallVec;
use std::collections::HashSet;

/// Construct an IR representation using a parsed AST and the lowering
/// configuration.
pub fn ast_to_ir(
    namespace: ast::NamespaceDef,
    config: LowerConfig,
) -> DflowResult<Context> {
    let mut names: HashSet<Id> = HashSet::new();
    let processes = namespace
        .processes
        .into_iter()
        .map(|def| {
            if !names.insert(def.name) {
                return Err(Error::already_bound(
                    def.name,
                    "process".to_string(),
                ));
            }
            build_process(def)
        })
        .collect::<DflowResult<Vec<_>>>()?;
    Ok(Context { processes, config })
}

fn build_process(def: ast::ProcessDef) -> DflowResult<Process> {
    let mut builder = ProcessBuilder::new(def.name);
    for port in def.ports {
        builder.port(port.name, port.direction, port.ty)?;
    }
    for decl in def.decls {
        builder.channel(decl.name, decl.ty)?;
    }
    for alias in def.aliases {
        builder.alias(alias.lhs, alias.rhs)?;
    }
    for stmt in def.dataflow {
        let el = build_element(stmt, &builder)?;
        builder.add(el);
    }
    let process = builder.build();
    log::debug!(
        "Built process `{}' with {} elements",
        process.name,
        process.elements.len()
    );
    Ok(process)
}

fn build_element(
    stmt: ast::DflowStmt,
    builder: &ProcessBuilder,
) -> DflowResult<Element> {
    let resolve = |name: Id| builder.resolve(name);
    let resolve_all = |names: Vec<Id>| -> DflowResult<SmallVec<[Identity; 4]>> {
        names
            .into_iter()
            .map(resolve)
            .collect::<DflowResult<_>>()
    };
    Ok(match stmt {
        ast::DflowStmt::Func(func) => Element::Func(build_func(func, builder)?),
        ast::DflowStmt::Split {
            guard,
            input,
            outputs,
        } => Element::Split(crate::Split {
            guard: resolve(guard)?,
            input: resolve(input)?,
            outputs: outputs
                .into_iter()
                .map(|t| build_target(t, builder))
                .collect::<DflowResult<_>>()?,
        }),
        ast::DflowStmt::Merge {
            guard,
            inputs,
            output,
        } => Element::Merge(crate::Merge {
            guard: resolve(guard)?,
            inputs: resolve_all(inputs)?,
            output: resolve(output)?,
        }),
        ast::DflowStmt::Mixer { inputs, output } => {
            Element::Mixer(crate::Mixer {
                inputs: resolve_all(inputs)?,
                output: resolve(output)?,
            })
        }
        ast::DflowStmt::Arbiter {
            inputs,
            output,
            ctrl,
        } => Element::Arbiter(crate::Arbiter {
            inputs: resolve_all(inputs)?,
            output: resolve(output)?,
            ctrl: resolve(ctrl)?,
        }),
        ast::DflowStmt::Sink(input) => Element::Sink(crate::Sink {
            input: resolve(input)?,
        }),
        ast::DflowStmt::Cluster(funcs) => Element::Cluster(
            funcs
                .into_iter()
                .map(|f| build_func(f, builder))
                .collect::<DflowResult<_>>()?,
        ),
    })
}

fn build_target(
    target: ast::Target,
    builder: &ProcessBuilder,
) -> DflowResult<Option<Identity>> {
    match target {
        ast::Target::Chan(name) => builder.resolve(name).map(Some),
        ast::Target::Unconnected => Ok(None),
    }
}

fn build_func(
    func: ast::FuncStmt,
    builder: &ProcessBuilder,
) -> DflowResult<Func> {
    let buffer = func
        .buffer
        .map(|b| -> DflowResult<_> {
            Ok(Buffer {
                depth: b.depth,
                init: b.init.map(|e| build_expr(e, builder)).transpose()?,
            })
        })
        .transpose()?;
    Ok(Func {
        expr: build_expr(func.expr, builder)?,
        output: build_target(func.target, builder)?,
        buffer,
    })
}

fn build_expr(expr: ast::Expr, builder: &ProcessBuilder) -> DflowResult<Expr> {
    let rec = |e: Box<ast::Expr>| build_expr(*e, builder);
    Ok(match expr {
        ast::Expr::Const(v) => Expr::Const(v),
        ast::Expr::Var(name) => Expr::Var(builder.resolve(name)?),
        ast::Expr::Binary { op, lhs, rhs } => {
            Expr::binary(op, rec(lhs)?, rec(rhs)?)
        }
        ast::Expr::Unary { op, arg } => Expr::unary(op, rec(arg)?),
        ast::Expr::Query { cond, then, els } => {
            Expr::query(rec(cond)?, rec(then)?, rec(els)?)
        }
        ast::Expr::IntCast { arg, width } => {
            let width = width
                .map(|w| {
                    u32::try_from(w).ok().filter(|w| *w > 0).ok_or_else(|| {
                        Error::misc(format!("Invalid cast width {w}"))
                    })
                })
                .transpose()?;
            Expr::cast(rec(arg)?, width)
        }
        ast::Expr::BoolCast(arg) => Expr::cast(rec(arg)?, Some(1)),
    })
}
