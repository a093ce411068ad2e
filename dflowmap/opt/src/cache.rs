use crate::naming::{NameToken, fingerprint};
use std::collections::{HashMap, HashSet};

/// Whole-run record of the templates and parameterized instances that have
/// already been handed to the emitter.
///
/// Every call site still gets its own instantiation line; only template
/// bodies and instance cost blocks are deduplicated.
#[derive(Debug, Default)]
pub struct InstanceCache {
    /// Template name to the fingerprint of the body registered under it.
    bodies: HashMap<String, u64>,
    templates: HashSet<String>,
    instances: HashSet<String>,
}

impl InstanceCache {
    /// Returns `true` the first time `name` is seen. The caller must then
    /// emit the template body.
    pub fn intern_template(&mut self, name: &str) -> bool {
        self.templates.insert(name.to_string())
    }

    /// Returns `true` the first time `key` is seen. The caller must then
    /// emit the cost block.
    pub fn intern_instance(&mut self, key: &str) -> bool {
        self.instances.insert(key.to_string())
    }

    /// The template name under which a body with the given structural
    /// fingerprint is emitted.
    ///
    /// The first body rendering to `name` keeps it. A different body that
    /// renders to the same name gets a `_h{hex}` suffix derived from its
    /// fingerprint.
    pub fn disambiguate(&mut self, name: String, body: &str) -> String {
        let fp = fingerprint(body);
        match self.bodies.get(&name) {
            None => {
                self.bodies.insert(name.clone(), fp);
                name
            }
            Some(prev) if *prev == fp => name,
            Some(_) => {
                let renamed = format!("{name}{}", NameToken::Hash(fp));
                log::warn!(
                    "template `{name}' already names a different body, using `{renamed}'"
                );
                self.bodies.entry(renamed.clone()).or_insert(fp);
                renamed
            }
        }
    }

    pub fn num_templates(&self) -> usize {
        self.templates.len()
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_reports_first_sighting() {
        let mut cache = InstanceCache::default();
        assert!(cache.intern_template("copy"));
        assert!(!cache.intern_template("copy"));
        assert!(cache.intern_instance("copy<8,2>"));
        assert!(cache.intern_instance("copy<8,3>"));
        assert!(!cache.intern_instance("copy<8,2>"));
        assert_eq!(cache.num_templates(), 1);
        assert_eq!(cache.num_instances(), 2);
    }

    #[test]
    fn colliding_names_are_split() {
        let mut cache = InstanceCache::default();
        let a = cache.disambiguate("func_0add1_8".into(), "res0 := x0 + x1");
        let b = cache.disambiguate("func_0add1_8".into(), "res0 := x0 + x1");
        assert_eq!(a, "func_0add1_8");
        assert_eq!(a, b);
        let c = cache.disambiguate("func_0add1_8".into(), "res0 := x1 + x0");
        assert!(c.starts_with("func_0add1_8_h"));
        // Stable for the same body.
        let d = cache.disambiguate("func_0add1_8".into(), "res0 := x1 + x0");
        assert_eq!(c, d);
    }
}
