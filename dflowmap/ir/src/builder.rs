//! IR Builder. Provides convenience methods to construct processes.
use crate::{
    Arbiter, Buffer, ChanType, ChannelKind, Direction, Element, Expr, Func,
    Identity, Merge, Mixer, Process, Scope, Sink, Split,
};
use dflowmap_utils::{DflowResult, Id};

/// Builds a [Process] by declaring channels and appending elements in order.
pub struct ProcessBuilder {
    name: Id,
    scope: Scope,
    ports: Vec<Identity>,
    elements: Vec<Element>,
}

impl ProcessBuilder {
    pub fn new<S: Into<Id>>(name: S) -> Self {
        Self {
            name: name.into(),
            scope: Scope::default(),
            ports: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn port<S: Into<Id>>(
        &mut self,
        name: S,
        direction: Direction,
        ty: ChanType,
    ) -> DflowResult<Identity> {
        let id =
            self.scope
                .declare(name.into(), ty, ChannelKind::Port(direction))?;
        self.ports.push(id);
        Ok(id)
    }

    /// Shorthand for an `int<width>` input port.
    pub fn input<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
    ) -> DflowResult<Identity> {
        self.port(name, Direction::Input, ChanType::Int(width))
    }

    /// Shorthand for an `int<width>` output port.
    pub fn output<S: Into<Id>>(
        &mut self,
        name: S,
        width: u64,
    ) -> DflowResult<Identity> {
        self.port(name, Direction::Output, ChanType::Int(width))
    }

    pub fn channel<S: Into<Id>>(
        &mut self,
        name: S,
        ty: ChanType,
    ) -> DflowResult<Identity> {
        self.scope.declare(name.into(), ty, ChannelKind::Local)
    }

    pub fn alias<L: Into<Id>, R: Into<Id>>(
        &mut self,
        lhs: L,
        rhs: R,
    ) -> DflowResult<()> {
        self.scope.alias(lhs.into(), rhs.into())
    }

    /// Canonical identity of a declared name.
    pub fn resolve<S: Into<Id>>(&self, name: S) -> DflowResult<Identity> {
        self.scope.resolve(name.into())
    }

    pub fn add(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn func(&mut self, expr: Expr, output: Identity) {
        self.add(Element::Func(Func {
            expr,
            output: Some(output),
            buffer: None,
        }))
    }

    pub fn buffered_func(
        &mut self,
        expr: Expr,
        output: Identity,
        depth: u64,
        init: Option<u64>,
    ) {
        self.add(Element::Func(Func {
            expr,
            output: Some(output),
            buffer: Some(Buffer {
                depth,
                init: init.map(Expr::Const),
            }),
        }))
    }

    pub fn split<I>(&mut self, guard: Identity, input: Identity, outputs: I)
    where
        I: IntoIterator<Item = Option<Identity>>,
    {
        self.add(Element::Split(Split {
            guard,
            input,
            outputs: outputs.into_iter().collect(),
        }))
    }

    pub fn merge<I>(&mut self, guard: Identity, inputs: I, output: Identity)
    where
        I: IntoIterator<Item = Identity>,
    {
        self.add(Element::Merge(Merge {
            guard,
            inputs: inputs.into_iter().collect(),
            output,
        }))
    }

    pub fn mixer<I>(&mut self, inputs: I, output: Identity)
    where
        I: IntoIterator<Item = Identity>,
    {
        self.add(Element::Mixer(Mixer {
            inputs: inputs.into_iter().collect(),
            output,
        }))
    }

    pub fn arbiter<I>(&mut self, inputs: I, output: Identity, ctrl: Identity)
    where
        I: IntoIterator<Item = Identity>,
    {
        self.add(Element::Arbiter(Arbiter {
            inputs: inputs.into_iter().collect(),
            output,
            ctrl,
        }))
    }

    pub fn sink(&mut self, input: Identity) {
        self.add(Element::Sink(Sink { input }))
    }

    pub fn cluster(&mut self, funcs: Vec<Func>) {
        self.add(Element::Cluster(funcs))
    }

    /// Finish the process. Every channel reference is rewritten to its
    /// canonical identity so later passes can compare identities directly.
    pub fn build(self) -> Process {
        let ProcessBuilder {
            name,
            scope,
            ports,
            mut elements,
        } = self;
        for el in &mut elements {
            el.map_identities(|id| scope.canonical(id));
        }
        Process {
            name,
            ports,
            scope,
            elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinOp;

    #[test]
    fn build_canonicalizes_references() {
        let mut b = ProcessBuilder::new("p");
        let a = b.input("a", 8).unwrap();
        let t = b.channel("t", ChanType::Int(8)).unwrap();
        let o = b.output("o", 8).unwrap();
        b.func(Expr::binary(BinOp::Add, Expr::var(t), Expr::var(a)), o);
        b.alias("t", "a").unwrap();
        let p = b.build();
        assert_eq!(p.ports, vec![a, o]);
        assert_eq!(
            p.elements[0],
            Element::Func(Func {
                expr: Expr::binary(BinOp::Add, Expr::var(a), Expr::var(a)),
                output: Some(o),
                buffer: None,
            })
        );
    }
}
