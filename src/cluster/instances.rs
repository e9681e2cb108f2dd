//! Ordered instance collection and selection combinators
//!
//! [`Instances`] owns the cluster's nodes. Queries go through
//! [`InstanceSelection`], a borrowed view: every combinator consumes the
//! view and returns a narrower one, so selecting never mutates the cluster.

use super::instance::{BdrNodeKind, Instance};
use crate::domain::ports::Value;
use crate::error::{Error, Result};

// =============================================================================
// Instances
// =============================================================================

/// The cluster's instances, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instances {
    items: Vec<Instance>,
}

impl Instances {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, instance: Instance) {
        self.items.push(instance);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Instance> {
        self.items.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Instance> {
        self.items.iter_mut().find(|i| i.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.name.as_str()).collect()
    }

    /// Start a query over every instance
    pub fn all(&self) -> InstanceSelection<'_> {
        InstanceSelection {
            items: self.items.iter().collect(),
        }
    }

    pub fn select<F>(&self, predicate: F) -> InstanceSelection<'_>
    where
        F: Fn(&Instance) -> bool,
    {
        self.all().select(predicate)
    }

    pub fn with_role(&self, role: &str) -> InstanceSelection<'_> {
        self.all().with_role(role)
    }

    pub fn with_roles(&self, roles: &[&str]) -> InstanceSelection<'_> {
        self.all().with_roles(roles)
    }

    pub fn in_location(&self, location: &str) -> InstanceSelection<'_> {
        self.all().in_location(location)
    }

    /// Largest `node` ordinal in use
    pub fn max_node(&self) -> Option<u64> {
        self.items.iter().filter_map(Instance::node).max()
    }
}

impl<'a> IntoIterator for &'a Instances {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// =============================================================================
// Instance Selection
// =============================================================================

/// Borrowed, ordered subset of a cluster's instances
#[derive(Debug, Clone)]
pub struct InstanceSelection<'a> {
    items: Vec<&'a Instance>,
}

impl<'a> InstanceSelection<'a> {
    pub fn select<F>(self, predicate: F) -> Self
    where
        F: Fn(&Instance) -> bool,
    {
        Self {
            items: self.items.into_iter().filter(|i| predicate(i)).collect(),
        }
    }

    pub fn with_role(self, role: &str) -> Self {
        self.select(|i| i.has_role(role))
    }

    pub fn without_role(self, role: &str) -> Self {
        self.select(|i| !i.has_role(role))
    }

    /// Instances that have every one of `roles`
    pub fn with_roles(self, roles: &[&str]) -> Self {
        self.select(|i| roles.iter().all(|r| i.has_role(r)))
    }

    /// Instances that have none of `roles`
    pub fn without_roles(self, roles: &[&str]) -> Self {
        self.select(|i| !roles.iter().any(|r| i.has_role(r)))
    }

    pub fn with_name(self, name: &str) -> Self {
        self.select(|i| i.name == name)
    }

    pub fn in_location(self, location: &str) -> Self {
        self.select(|i| i.location == location)
    }

    /// Instances defining host var `key`, optionally with exactly `value`
    pub fn with_hostvar(self, key: &str, value: Option<&Value>) -> Self {
        self.select(|i| match (i.host_var(key), value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    pub fn with_bdr_node_kind(self, kind: BdrNodeKind) -> Self {
        self.select(|i| i.bdr_node_kind() == kind)
    }

    /// Exactly one instance, or a configuration error
    pub fn only(&self) -> Result<&'a Instance> {
        match self.items.as_slice() {
            [one] => Ok(*one),
            [] => Err(Error::Configure(
                "Expected exactly one matching instance, found none".into(),
            )),
            many => Err(Error::Configure(format!(
                "Expected exactly one matching instance, found {}: {}",
                many.len(),
                self.names().join(", ")
            ))),
        }
    }

    /// Zero or one instance; more than one is a configuration error
    pub fn maybe(&self) -> Result<Option<&'a Instance>> {
        match self.items.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            many => Err(Error::Configure(format!(
                "Expected at most one matching instance, found {}: {}",
                many.len(),
                self.names().join(", ")
            ))),
        }
    }

    pub fn names(&self) -> Vec<&'a str> {
        self.items.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Instance> + '_ {
        self.items.iter().copied()
    }

    pub fn first(&self) -> Option<&'a Instance> {
        self.items.first().copied()
    }
}

impl<'a> IntoIterator for InstanceSelection<'a> {
    type Item = &'a Instance;
    type IntoIter = std::vec::IntoIter<&'a Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::VarMap;
    use assert_matches::assert_matches;

    fn fixture() -> Instances {
        let mut instances = Instances::new();

        let mut a = Instance::new("a", "first", VarMap::new(), VarMap::new());
        a.add_role("bdr");
        a.add_role("witness");
        instances.push(a);

        let mut b = Instance::new("b", "first", VarMap::new(), VarMap::new());
        b.add_role("bdr");
        b.add_role("pgd-proxy");
        b.add_role("barman");
        b.set_host_var("bdr_node_camo_partner", "c");
        instances.push(b);

        let mut c = Instance::new("c", "second", VarMap::new(), VarMap::new());
        c.add_role("bdr");
        c.add_role("standby");
        c.add_role("witness");
        c.set_host_var("bdr_node_camo_partner", "b");
        instances.push(c);

        instances
    }

    #[test]
    fn test_with_roles_is_intersection() {
        let instances = fixture();
        assert_eq!(instances.with_roles(&["bdr", "pgd-proxy"]).names(), vec!["b"]);
        assert_eq!(instances.with_roles(&["bdr"]).names(), vec!["a", "b", "c"]);
        assert!(instances.with_roles(&["pgd-proxy", "witness"]).is_empty());
    }

    #[test]
    fn test_without_roles() {
        let instances = fixture();
        assert!(instances
            .all()
            .without_roles(&["witness", "barman"])
            .names()
            .is_empty());
        assert_eq!(instances.all().without_roles(&["barman"]).names(), vec!["a", "c"]);
        assert_eq!(instances.all().without_role("witness").names(), vec!["b"]);
    }

    #[test]
    fn test_chained_combinators() {
        let instances = fixture();
        let sel = instances.with_role("bdr").in_location("first").without_role("witness");
        assert_eq!(sel.names(), vec!["b"]);
        assert_eq!(instances.all().with_name("c").only().unwrap().location, "second");
    }

    #[test]
    fn test_with_hostvar() {
        let instances = fixture();
        assert_eq!(
            instances.all().with_hostvar("bdr_node_camo_partner", None).names(),
            vec!["b", "c"]
        );
        let c = Value::from("c");
        assert_eq!(
            instances.all().with_hostvar("bdr_node_camo_partner", Some(&c)).names(),
            vec!["b"]
        );
    }

    #[test]
    fn test_with_bdr_node_kind() {
        let instances = fixture();
        assert_eq!(
            instances.all().with_bdr_node_kind(BdrNodeKind::Witness).names(),
            vec!["a", "c"]
        );
        assert!(instances.all().with_bdr_node_kind(BdrNodeKind::Standby).is_empty());
        assert_eq!(
            instances.all().with_bdr_node_kind(BdrNodeKind::Data).names(),
            vec!["b"]
        );
    }

    #[test]
    fn test_only_and_maybe() {
        let instances = fixture();
        assert_matches!(instances.with_role("bdr").only(), Err(Error::Configure(_)));
        assert_matches!(instances.with_role("etcd").only(), Err(Error::Configure(_)));
        assert_eq!(instances.with_role("barman").only().unwrap().name, "b");

        assert!(instances.with_role("etcd").maybe().unwrap().is_none());
        assert_eq!(instances.with_role("pgd-proxy").maybe().unwrap().unwrap().name, "b");
        assert_matches!(instances.with_role("witness").maybe(), Err(Error::Configure(_)));
    }

    #[test]
    fn test_selection_does_not_mutate() {
        let instances = fixture();
        let before = instances.clone();
        let _ = instances.with_role("bdr").without_role("barman").in_location("first");
        assert_eq!(instances, before);
    }
}
