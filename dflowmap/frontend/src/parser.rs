#![allow(clippy::upper_case_acronyms)]

//! Parser for dataflow process descriptions.
use super::ast::{
    self, Alias, BinOp, BufferSpec, ChanType, ChannelDecl, DflowStmt,
    Direction, Expr, FuncStmt, PortDef, Target, UnOp,
};
use dflowmap_utils::{self, DflowResult, Id};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_consume::{Error, Parser, match_nodes};
use std::fs;
use std::io::Read;
use std::path::Path;

type ParseResult<T> = Result<T, Error<Rule>>;

type Node<'i> = pest_consume::Node<'i, Rule, ()>;

// include the grammar file so that Cargo knows to rebuild this file on grammar changes
const _GRAMMAR: &str = include_str!("syntax.pest");

// Define the precedence of binary operations. We use `lazy_static` so that
// this is only ever constructed once.
lazy_static::lazy_static! {
    static ref PRATT: PrattParser<Rule> =
    PrattParser::new()
        .op(Op::infix(Rule::op_or, Assoc::Left))
        .op(Op::infix(Rule::op_xor, Assoc::Left))
        .op(Op::infix(Rule::op_and, Assoc::Left))
        .op(Op::infix(Rule::op_eq, Assoc::Left)
            | Op::infix(Rule::op_ne, Assoc::Left))
        .op(Op::infix(Rule::op_lt, Assoc::Left)
            | Op::infix(Rule::op_gt, Assoc::Left)
            | Op::infix(Rule::op_le, Assoc::Left)
            | Op::infix(Rule::op_ge, Assoc::Left))
        .op(Op::infix(Rule::op_shl, Assoc::Left)
            | Op::infix(Rule::op_shr, Assoc::Left)
            | Op::infix(Rule::op_ashr, Assoc::Left))
        .op(Op::infix(Rule::op_add, Assoc::Left)
            | Op::infix(Rule::op_sub, Assoc::Left))
        .op(Op::infix(Rule::op_mul, Assoc::Left)
            | Op::infix(Rule::op_div, Assoc::Left)
            | Op::infix(Rule::op_mod, Assoc::Left))
        .op(Op::prefix(Rule::op_neg)
            | Op::prefix(Rule::op_compl)
            | Op::prefix(Rule::op_not));
}

#[derive(Parser)]
#[grammar = "syntax.pest"]
pub struct DflowParser;

impl DflowParser {
    /// Parse a dataflow program into an AST representation.
    pub fn parse_file(path: &Path) -> DflowResult<ast::NamespaceDef> {
        let time = std::time::Instant::now();
        let content = &fs::read(path).map_err(|err| {
            dflowmap_utils::Error::invalid_file(format!(
                "Failed to read {}: {err}",
                path.to_string_lossy(),
            ))
        })?;
        let content = std::str::from_utf8(content)?;
        let out = Self::parse_content(content).map_err(|e| {
            dflowmap_utils::Error::parse_error(format!(
                "Failed to parse `{}`: {err}",
                path.to_string_lossy(),
                err = e.with_path(&path.to_string_lossy())
            ))
        })?;
        log::info!(
            "Parsed `{}` in {}ms",
            path.to_string_lossy(),
            time.elapsed().as_millis()
        );
        Ok(out)
    }

    pub fn parse<R: Read>(mut r: R) -> DflowResult<ast::NamespaceDef> {
        let mut buf = String::new();
        r.read_to_string(&mut buf).map_err(|err| {
            dflowmap_utils::Error::invalid_file(format!(
                "Failed to parse buffer: {err}",
            ))
        })?;
        Self::parse_str(&buf)
    }

    pub fn parse_str(content: &str) -> DflowResult<ast::NamespaceDef> {
        Self::parse_content(content).map_err(|e| {
            dflowmap_utils::Error::parse_error(format!(
                "Failed to parse buffer: {e}"
            ))
        })
    }

    #[allow(clippy::result_large_err)]
    fn parse_content(content: &str) -> ParseResult<ast::NamespaceDef> {
        let inputs = <DflowParser as Parser>::parse(Rule::file, content)?;
        let input = inputs.single()?;
        DflowParser::file(input)
    }

    #[allow(clippy::result_large_err)]
    fn cond_expr_helper(pairs: pest::iterators::Pairs<Rule>) -> ParseResult<Expr> {
        PRATT
            .map_primary(|primary| {
                let rule = primary.as_rule();
                let node = Node::new_with_user_data(primary, ());
                match rule {
                    Rule::num_lit => Self::num_lit(node).map(Expr::Const),
                    Rule::chan_ref => Self::chan_ref(node).map(Expr::Var),
                    Rule::cast_int => Self::cast_int(node),
                    Rule::cast_bool => Self::cast_bool(node),
                    Rule::expr => Self::expr(node),
                    x => unreachable!("Unexpected rule {:?} for cond_expr", x),
                }
            })
            .map_prefix(|op, arg| {
                let op = match op.as_rule() {
                    Rule::op_neg => UnOp::Neg,
                    Rule::op_compl => UnOp::Compl,
                    Rule::op_not => UnOp::Not,
                    _ => unreachable!(),
                };
                Ok(Expr::Unary {
                    op,
                    arg: Box::new(arg?),
                })
            })
            .map_infix(|lhs, op, rhs| {
                let op = match op.as_rule() {
                    Rule::op_or => BinOp::Or,
                    Rule::op_xor => BinOp::Xor,
                    Rule::op_and => BinOp::And,
                    Rule::op_eq => BinOp::Eq,
                    Rule::op_ne => BinOp::Ne,
                    Rule::op_lt => BinOp::Lt,
                    Rule::op_gt => BinOp::Gt,
                    Rule::op_le => BinOp::Le,
                    Rule::op_ge => BinOp::Ge,
                    Rule::op_shl => BinOp::Lsl,
                    Rule::op_shr => BinOp::Lsr,
                    Rule::op_ashr => BinOp::Asr,
                    Rule::op_add => BinOp::Add,
                    Rule::op_sub => BinOp::Minus,
                    Rule::op_mul => BinOp::Mul,
                    Rule::op_div => BinOp::Div,
                    Rule::op_mod => BinOp::Mod,
                    _ => unreachable!(),
                };
                Ok(Expr::Binary {
                    op,
                    lhs: Box::new(lhs?),
                    rhs: Box::new(rhs?),
                })
            })
            .parse(pairs)
    }

    #[allow(clippy::result_large_err)]
    fn connected(node: &Node, targets: Vec<Target>) -> ParseResult<Vec<Id>> {
        targets
            .into_iter()
            .map(|t| match t {
                Target::Chan(c) => Ok(c),
                Target::Unconnected => {
                    Err(node.error("Expected a channel, found `*'"))
                }
            })
            .collect()
    }
}

/// Items allowed in a process body before the dataflow block.
enum BodyItem {
    Decls(Vec<ChannelDecl>),
    Alias(Alias),
}

/// Contents of the braces in front of a selection statement.
enum Guard {
    Chan(Id),
    Mixer,
    Arbiter,
}

#[pest_consume::parser]
impl DflowParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    // ================ Literals =====================
    fn identifier(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn chan_path(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn chan_ref(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn bitwidth(input: Node) -> ParseResult<u64> {
        input
            .as_str()
            .parse::<u64>()
            .map_err(|_| input.error("Expected valid bitwidth"))
    }

    fn hex(input: Node) -> ParseResult<u64> {
        u64::from_str_radix(&input.as_str()[2..], 16)
            .map_err(|_| input.error("Expected hexadecimal number"))
    }

    fn binary(input: Node) -> ParseResult<u64> {
        u64::from_str_radix(&input.as_str()[2..], 2)
            .map_err(|_| input.error("Expected binary number"))
    }

    fn decimal(input: Node) -> ParseResult<u64> {
        input
            .as_str()
            .parse::<u64>()
            .map_err(|_| input.error("Expected decimal number"))
    }

    fn num_lit(input: Node) -> ParseResult<u64> {
        Ok(match_nodes!(
            input.into_children();
            [hex(val)] => val,
            [binary(val)] => val,
            [decimal(val)] => val
        ))
    }

    // ================ Declarations =====================
    fn int_type(input: Node) -> ParseResult<ChanType> {
        Ok(match_nodes!(
            input.into_children();
            [bitwidth(width)] => ChanType::Int(width)
        ))
    }

    fn bool_type(_input: Node) -> ParseResult<ChanType> {
        Ok(ChanType::Bool)
    }

    fn chan_type(input: Node) -> ParseResult<ChanType> {
        Ok(match_nodes!(
            input.into_children();
            [int_type(ty)] => ty,
            [bool_type(ty)] => ty
        ))
    }

    fn array_len(input: Node) -> ParseResult<u64> {
        Ok(match_nodes!(
            input.into_children();
            [bitwidth(len)] => len
        ))
    }

    fn decl_name(input: Node) -> ParseResult<Vec<Id>> {
        let (name, len) = match_nodes!(
            input.clone().into_children();
            [chan_path(name)] => (name, None),
            [chan_path(name), array_len(len)] => (name, Some(len))
        );
        match len {
            None => Ok(vec![name]),
            Some(0) => Err(input.error("Array length must be positive")),
            Some(len) => Ok((0..len)
                .map(|i| Id::new(format!("{name}[{i}]")))
                .collect()),
        }
    }

    fn decl_list(input: Node) -> ParseResult<Vec<Id>> {
        Ok(match_nodes!(
            input.into_children();
            [decl_name(names)..] => names.flatten().collect()
        ))
    }

    fn port_dir(input: Node) -> ParseResult<Direction> {
        match input.as_str() {
            "?" => Ok(Direction::Input),
            "!" => Ok(Direction::Output),
            _ => Err(input.error("Expected `?' or `!'")),
        }
    }

    fn port_group(input: Node) -> ParseResult<Vec<PortDef>> {
        Ok(match_nodes!(
            input.into_children();
            [port_dir(direction), chan_type(ty), decl_list(names)] => {
                names
                    .into_iter()
                    .map(|name| PortDef { name, direction, ty })
                    .collect()
            }
        ))
    }

    fn port_list(input: Node) -> ParseResult<Vec<PortDef>> {
        Ok(match_nodes!(
            input.into_children();
            [port_group(groups)..] => groups.flatten().collect()
        ))
    }

    fn chan_decl(input: Node) -> ParseResult<Vec<ChannelDecl>> {
        Ok(match_nodes!(
            input.into_children();
            [chan_type(ty), decl_list(names)] => {
                names
                    .into_iter()
                    .map(|name| ChannelDecl { name, ty })
                    .collect()
            }
        ))
    }

    fn alias(input: Node) -> ParseResult<Alias> {
        Ok(match_nodes!(
            input.into_children();
            [chan_ref(lhs), chan_ref(rhs)] => Alias { lhs, rhs }
        ))
    }

    fn body_item(input: Node) -> ParseResult<BodyItem> {
        Ok(match_nodes!(
            input.into_children();
            [chan_decl(decls)] => BodyItem::Decls(decls),
            [alias(alias)] => BodyItem::Alias(alias)
        ))
    }

    // ================ Expressions =====================
    fn expr(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [cond_expr(e)] => e,
            [cond_expr(cond), expr(then), expr(els)] => Expr::Query {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
            }
        ))
    }

    fn cond_expr(input: Node) -> ParseResult<Expr> {
        Self::cond_expr_helper(input.into_pair().into_inner())
    }

    fn cast_int(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [expr(arg)] => Expr::IntCast { arg: Box::new(arg), width: None },
            [expr(arg), bitwidth(width)] => Expr::IntCast {
                arg: Box::new(arg),
                width: Some(width),
            }
        ))
    }

    fn cast_bool(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [expr(arg)] => Expr::BoolCast(Box::new(arg))
        ))
    }

    // ================ Dataflow =====================
    fn unconnected(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn target(input: Node) -> ParseResult<Target> {
        Ok(match_nodes!(
            input.into_children();
            [unconnected(_)] => Target::Unconnected,
            [chan_ref(chan)] => Target::Chan(chan)
        ))
    }

    fn target_list(input: Node) -> ParseResult<Vec<Target>> {
        Ok(match_nodes!(
            input.into_children();
            [target(targets)..] => targets.collect()
        ))
    }

    fn buffer_spec(input: Node) -> ParseResult<BufferSpec> {
        Ok(match_nodes!(
            input.into_children();
            [bitwidth(depth)] => BufferSpec { depth, init: None },
            [bitwidth(depth), expr(init)] => BufferSpec { depth, init: Some(init) }
        ))
    }

    fn func_stmt(input: Node) -> ParseResult<DflowStmt> {
        let (expr, buffer, target) = match_nodes!(
            input.into_children();
            [expr(e), target(t)] => (e, None, t),
            [expr(e), buffer_spec(b), target(t)] => (e, Some(b), t)
        );
        Ok(match (expr, target) {
            (Expr::Var(chan), Target::Unconnected) if buffer.is_none() => {
                DflowStmt::Sink(chan)
            }
            (expr, target) => DflowStmt::Func(FuncStmt {
                expr,
                buffer,
                target,
            }),
        })
    }

    fn mixer_mark(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn arbiter_mark(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn guard_spec(input: Node) -> ParseResult<Guard> {
        Ok(match_nodes!(
            input.into_children();
            [mixer_mark(_)] => Guard::Mixer,
            [arbiter_mark(_)] => Guard::Arbiter,
            [chan_ref(chan)] => Guard::Chan(chan)
        ))
    }

    fn select_stmt(input: Node) -> ParseResult<DflowStmt> {
        let (guard, inputs, outputs) = match_nodes!(
            input.clone().into_children();
            [guard_spec(g), target_list(ins), target_list(outs)] => (g, ins, outs)
        );
        let inputs = Self::connected(&input, inputs)?;
        Ok(match guard {
            Guard::Chan(guard) if inputs.len() == 1 && outputs.len() > 1 => {
                DflowStmt::Split {
                    guard,
                    input: inputs[0],
                    outputs,
                }
            }
            Guard::Chan(guard) => match Self::connected(&input, outputs)?[..] {
                [output] => DflowStmt::Merge {
                    guard,
                    inputs,
                    output,
                },
                _ => return Err(input.error("A merge drives exactly one output")),
            },
            Guard::Mixer => match Self::connected(&input, outputs)?[..] {
                [output] => DflowStmt::Mixer { inputs, output },
                _ => return Err(input.error("A mixer drives exactly one output")),
            },
            Guard::Arbiter => match Self::connected(&input, outputs)?[..] {
                [output, ctrl] => DflowStmt::Arbiter {
                    inputs,
                    output,
                    ctrl,
                },
                _ => {
                    return Err(input.error(
                        "An arbiter drives one output and one control channel",
                    ));
                }
            },
        })
    }

    fn cluster(input: Node) -> ParseResult<Vec<FuncStmt>> {
        let stmts: Vec<DflowStmt> = match_nodes!(
            input.clone().into_children();
            [func_stmt(stmts)..] => stmts.collect()
        );
        stmts
            .into_iter()
            .map(|stmt| match stmt {
                DflowStmt::Func(func) => Ok(func),
                _ => Err(input.error("Sinks cannot appear in a dataflow_cluster")),
            })
            .collect()
    }

    fn dflow_stmt(input: Node) -> ParseResult<DflowStmt> {
        Ok(match_nodes!(
            input.into_children();
            [cluster(funcs)] => DflowStmt::Cluster(funcs),
            [select_stmt(stmt)] => stmt,
            [func_stmt(stmt)] => stmt
        ))
    }

    fn dataflow(input: Node) -> ParseResult<Vec<DflowStmt>> {
        Ok(match_nodes!(
            input.into_children();
            [dflow_stmt(stmts)..] => stmts.collect()
        ))
    }

    // ================ Processes =====================
    fn process(input: Node) -> ParseResult<ast::ProcessDef> {
        let (name, ports, items, dataflow) = match_nodes!(
            input.into_children();
            [identifier(name), port_list(ports), body_item(items).., dataflow(df)] =>
                (name, ports, items.collect::<Vec<_>>(), df)
        );
        let mut decls = Vec::new();
        let mut aliases = Vec::new();
        for item in items {
            match item {
                BodyItem::Decls(ds) => decls.extend(ds),
                BodyItem::Alias(alias) => aliases.push(alias),
            }
        }
        Ok(ast::ProcessDef {
            name,
            ports,
            decls,
            aliases,
            dataflow,
        })
    }

    fn file(input: Node) -> ParseResult<ast::NamespaceDef> {
        Ok(match_nodes!(
            input.into_children();
            [process(processes).., EOI(_)] => ast::NamespaceDef {
                processes: processes.collect(),
            }
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str) -> ast::ProcessDef {
        let mut ns = DflowParser::parse_str(src).unwrap();
        assert_eq!(ns.processes.len(), 1);
        ns.processes.remove(0)
    }

    fn parse_expr(src: &str) -> Expr {
        let prog = format!(
            "defproc p(chan?(int<8>) a, b, c) {{ chan(int<8>) o; dataflow {{ {src} -> o; }} }}"
        );
        match parse_one(&prog).dataflow.remove(0) {
            DflowStmt::Func(f) => f.expr,
            stmt => panic!("expected a function, got {stmt:?}"),
        }
    }

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(Id::new(name)))
    }

    #[test]
    fn process_header() {
        let p = parse_one(
            "defproc adder(chan?(int<8>) a, b; chan!(int<9>) o) {
               chan(bool) g;
               chan(int<4>) u[2];
               o = a;
               dataflow { }
             }",
        );
        assert_eq!(p.name, "adder");
        assert_eq!(p.ports.len(), 3);
        assert_eq!(p.ports[2].direction, Direction::Output);
        assert_eq!(p.ports[2].ty, ChanType::Int(9));
        let names: Vec<_> = p.decls.iter().map(|d| d.name.to_string()).collect();
        assert_eq!(names, vec!["g", "u[0]", "u[1]"]);
        assert_eq!(p.aliases.len(), 1);
    }

    #[test]
    fn precedence() {
        assert_eq!(
            parse_expr("a + b * c"),
            Expr::Binary {
                op: BinOp::Add,
                lhs: var("a"),
                rhs: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    lhs: var("b"),
                    rhs: var("c"),
                }),
            }
        );
        assert_eq!(
            parse_expr("(a + b) * c"),
            Expr::Binary {
                op: BinOp::Mul,
                lhs: Box::new(Expr::Binary {
                    op: BinOp::Add,
                    lhs: var("a"),
                    rhs: var("b"),
                }),
                rhs: var("c"),
            }
        );
    }

    #[test]
    fn literals_casts_and_ternary() {
        assert_eq!(parse_expr("0x1f"), Expr::Const(31));
        assert_eq!(parse_expr("0b101"), Expr::Const(5));
        assert_eq!(
            parse_expr("a < b ? int(c, 4) : -a"),
            Expr::Query {
                cond: Box::new(Expr::Binary {
                    op: BinOp::Lt,
                    lhs: var("a"),
                    rhs: var("b"),
                }),
                then: Box::new(Expr::IntCast {
                    arg: var("c"),
                    width: Some(4),
                }),
                els: Box::new(Expr::Unary {
                    op: UnOp::Neg,
                    arg: var("a"),
                }),
            }
        );
    }

    #[test]
    fn selection_statements() {
        let p = parse_one(
            "defproc p(chan?(int<8>) a, b; chan?(bool) g) {
               chan(int<8>) o, o1;
               chan(int<1>) ctl;
               dataflow {
                 {g} a -> o1, *;
                 {g} a, b -> o;
                 {g} a -> o;
                 {*} a, b -> o;
                 {|} a, b -> o, ctl;
                 a -> *;
                 a + b -> [2, 0] o;
                 dataflow_cluster { a + b -> o; a - b -> o1; }
               }
             }",
        );
        let df = &p.dataflow;
        assert!(matches!(&df[0], DflowStmt::Split { outputs, .. }
            if outputs[1] == Target::Unconnected));
        assert!(matches!(&df[1], DflowStmt::Merge { inputs, .. } if inputs.len() == 2));
        assert!(matches!(&df[2], DflowStmt::Merge { inputs, .. } if inputs.len() == 1));
        assert!(matches!(&df[3], DflowStmt::Mixer { .. }));
        assert!(matches!(&df[4], DflowStmt::Arbiter { .. }));
        assert!(matches!(&df[5], DflowStmt::Sink(_)));
        assert!(matches!(&df[6], DflowStmt::Func(FuncStmt { buffer: Some(b), .. })
            if b.depth == 2 && b.init == Some(Expr::Const(0))));
        assert!(matches!(&df[7], DflowStmt::Cluster(fs) if fs.len() == 2));
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = DflowParser::parse_str("defproc p() { dataflow { a + -> o; } }")
            .unwrap_err();
        assert!(err.to_string().starts_with("Parse error"));
        assert!(
            DflowParser::parse_str(
                "defproc p() { dataflow { {|} a, b -> o; } }"
            )
            .is_err()
        );
    }
}
