//! Structured names for generated templates and the normalization shared by
//! every cache key.
use std::fmt::{self, Display, Write};

/// Prefix of every generated functional-unit template.
pub const FUNC_PREFIX: &str = "func";

/// Map the structural delimiters of an instance string to `_`.
///
/// ```
/// use dflowmap_opt::naming::normalize_key;
/// assert_eq!(normalize_key("copy<8,3>"), "copy_8_3_");
/// ```
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '<' | '>' | ',' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Turn a channel reference into something usable inside a generated
/// identifier: `a.b` becomes `ab` and `u[2]` becomes `u_2`.
pub fn normalize_channel(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            '.' | ']' => None,
            '[' => Some('_'),
            c => Some(c),
        })
        .collect()
}

/// 64-bit FNV-1a hash. Stable across runs and platforms, which the persisted
/// metrics file relies upon.
pub fn fingerprint(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    text.bytes()
        .fold(OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}

/// One piece of a generated functional-unit name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameToken {
    /// `_{lhs}{op}{rhs}`; `repeated` inserts a `d` after the operator when
    /// both operands are the same value. Operand mnemonics never start
    /// with `d`, so the marker cannot be read as part of `rhs`.
    Binary {
        op: &'static str,
        lhs: String,
        rhs: String,
        repeated: bool,
    },
    /// `_{op}{arg}`
    Unary { op: &'static str, arg: String },
    /// `_{then}q{cond}e{els}`
    Query {
        then: String,
        cond: String,
        els: String,
    },
    /// A function that forwards its single argument.
    Port,
    Init(u64),
    /// Bit-width of one function output.
    Width(u32),
    /// Position of a function inside a dataflow cluster.
    Member(usize),
    /// Structural hash for a name already taken by a different body.
    Hash(u64),
}

impl Display for NameToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameToken::Binary {
                op,
                lhs,
                rhs,
                repeated,
            } => {
                let rep = if *repeated { "d" } else { "" };
                write!(f, "_{lhs}{op}{rep}{rhs}")
            }
            NameToken::Unary { op, arg } => write!(f, "_{op}{arg}"),
            NameToken::Query { then, cond, els } => {
                write!(f, "_{then}q{cond}e{els}")
            }
            NameToken::Port => write!(f, "_port"),
            NameToken::Init(v) => write!(f, "_init{v}"),
            NameToken::Width(w) => write!(f, "_{w}"),
            NameToken::Member(i) => write!(f, "_p{i}"),
            NameToken::Hash(h) => write!(f, "_h{h:x}"),
        }
    }
}

/// Ordered list of [NameToken]s, rendered to a string only when a cache key
/// is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NameBuilder {
    tokens: Vec<NameToken>,
}

impl NameBuilder {
    pub fn push(&mut self, token: NameToken) {
        self.tokens.push(token);
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[NameToken] {
        &self.tokens
    }

    /// Does the name contain any operator or forwarding token?
    pub fn has_body(&self) -> bool {
        self.tokens.iter().any(|t| {
            matches!(
                t,
                NameToken::Binary { .. }
                    | NameToken::Unary { .. }
                    | NameToken::Query { .. }
                    | NameToken::Port
            )
        })
    }

    pub fn render(&self) -> String {
        let mut out = FUNC_PREFIX.to_string();
        for tok in &self.tokens {
            // Writing into a String cannot fail.
            let _ = write!(out, "{tok}");
        }
        out
    }
}

impl Display for NameBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
