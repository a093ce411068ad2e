//! Per-process channel scope.
//!
//! Every declared channel name is interned into the scope's table and
//! receives an [Identity]. Aliases (`x = y;`) merge identities with a
//! union-find so that every name resolves to the identity of the earliest
//! declared member of its class.
use dflowmap_frontend::{ChanType, Direction};
use dflowmap_utils::{DflowResult, Error, Id};
use linked_hash_map::LinkedHashMap;
use std::collections::HashMap;
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Handle for one storage location within one process scope. Identities
/// from different scopes must never be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(DefaultSymbol);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Part of the process signature.
    Port(Direction),
    /// Declared in the process body.
    Local,
    /// Introduced during lowering, e.g. for an unconnected split output.
    Synthesized,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub name: Id,
    pub ty: ChanType,
    pub width: u32,
    pub kind: ChannelKind,
    /// Position in declaration order.
    order: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    names: DefaultStringInterner,
    channels: LinkedHashMap<Identity, Channel>,
    parent: HashMap<Identity, Identity>,
}

impl Scope {
    /// Declare a new channel.
    pub fn declare(
        &mut self,
        name: Id,
        ty: ChanType,
        kind: ChannelKind,
    ) -> DflowResult<Identity> {
        let width = u32::try_from(ty.width())
            .ok()
            .filter(|w| *w > 0)
            .ok_or_else(|| {
                Error::malformed_element(
                    format!("chan({ty}) {name}"),
                    "channel width must be a positive 32-bit number",
                )
            })?;
        let id = Identity(self.names.get_or_intern(name.as_str()));
        if self.channels.contains_key(&id) {
            return Err(Error::already_bound(name, "channel".to_string()));
        }
        let order = self.channels.len();
        self.channels.insert(
            id,
            Channel {
                name,
                ty,
                width,
                kind,
                order,
            },
        );
        Ok(id)
    }

    /// Connect two declared names so that they denote the same wire.
    pub fn alias(&mut self, lhs: Id, rhs: Id) -> DflowResult<()> {
        let l = self.resolve(lhs)?;
        let r = self.resolve(rhs)?;
        if l == r {
            return Ok(());
        }
        let (lc, rc) = (&self.channels[&l], &self.channels[&r]);
        if lc.width != rc.width {
            return Err(Error::inconsistent_graph(format!(
                "cannot connect `{lhs}' ({} bits) to `{rhs}' ({} bits)",
                lc.width, rc.width
            )));
        }
        let (root, child) = if lc.order < rc.order { (l, r) } else { (r, l) };
        log::trace!(
            "aliasing `{}' to `{}'",
            self.name_of(child),
            self.name_of(root)
        );
        self.parent.insert(child, root);
        Ok(())
    }

    /// Identity for `name` without following aliases.
    pub fn lookup(&self, name: Id) -> DflowResult<Identity> {
        self.names
            .get(name.as_str())
            .map(Identity)
            .filter(|id| self.channels.contains_key(id))
            .ok_or_else(|| Error::undefined(name, "channel".to_string()))
    }

    /// Canonical identity for `name`.
    pub fn resolve(&self, name: Id) -> DflowResult<Identity> {
        self.lookup(name).map(|id| self.canonical(id))
    }

    pub fn canonical(&self, mut id: Identity) -> Identity {
        while let Some(p) = self.parent.get(&id) {
            id = *p;
        }
        id
    }

    pub fn is_canonical(&self, id: Identity) -> bool {
        !self.parent.contains_key(&id)
    }

    pub fn name_of(&self, id: Identity) -> &str {
        self.names.resolve(id.0).unwrap_or("<unknown>")
    }

    pub fn channel(&self, id: Identity) -> Option<&Channel> {
        self.channels.get(&id)
    }

    /// All channels in declaration order.
    pub fn channels(&self) -> impl Iterator<Item = (Identity, &Channel)> {
        self.channels.iter().map(|(id, ch)| (*id, ch))
    }

    /// Every name declared in this scope.
    pub fn declared_names(&self) -> impl Iterator<Item = Id> + '_ {
        self.channels.values().map(|ch| ch.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(w: u64) -> ChanType {
        ChanType::Int(w)
    }

    #[test]
    fn aliases_resolve_to_earliest_declaration() {
        let mut sc = Scope::default();
        let a = sc.declare("a".into(), int(8), ChannelKind::Local).unwrap();
        let b = sc.declare("b".into(), int(8), ChannelKind::Local).unwrap();
        let c = sc.declare("c".into(), int(8), ChannelKind::Local).unwrap();
        sc.alias("c".into(), "b".into()).unwrap();
        sc.alias("b".into(), "a".into()).unwrap();
        assert_eq!(sc.resolve("c".into()).unwrap(), a);
        assert_eq!(sc.canonical(b), a);
        assert!(!sc.is_canonical(c));
        assert!(sc.is_canonical(a));
    }

    #[test]
    fn alias_width_mismatch() {
        let mut sc = Scope::default();
        sc.declare("a".into(), int(8), ChannelKind::Local).unwrap();
        sc.declare("b".into(), int(4), ChannelKind::Local).unwrap();
        assert!(sc.alias("a".into(), "b".into()).is_err());
    }

    #[test]
    fn undefined_and_duplicate_names() {
        let mut sc = Scope::default();
        sc.declare("a".into(), int(8), ChannelKind::Local).unwrap();
        assert!(sc.declare("a".into(), int(8), ChannelKind::Local).is_err());
        let err = sc.resolve("nope".into()).unwrap_err();
        assert_eq!(err.to_string(), "Undefined channel `nope'");
    }

    #[test]
    fn zero_width_rejected() {
        let mut sc = Scope::default();
        assert!(sc.declare("z".into(), int(0), ChannelKind::Local).is_err());
        assert_eq!(
            sc.declare("g".into(), ChanType::Bool, ChannelKind::Local)
                .map(|id| sc.channel(id).unwrap().width)
                .unwrap(),
            1
        );
    }
}
