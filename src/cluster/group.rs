//! Variable-scope groups
//!
//! A group is a named bag of variables with ordered subgroups. The cluster
//! owns the root group; each location owns a `location_<name>` group.

use crate::domain::ports::{Value, VarMap};

/// Named variable scope with optional subgroups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub name: String,
    pub group_vars: VarMap,
    pub subgroups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_vars: VarMap::new(),
            subgroups: Vec::new(),
        }
    }

    /// Append a new empty subgroup and return it for further setup
    pub fn add_subgroup(&mut self, name: impl Into<String>) -> &mut Group {
        self.subgroups.push(Group::new(name));
        let last = self.subgroups.len() - 1;
        &mut self.subgroups[last]
    }

    /// Append an existing group as a subgroup
    pub fn push_subgroup(&mut self, group: Group) {
        self.subgroups.push(group);
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.group_vars.insert(key.into(), value.into());
    }

    pub fn get_var(&self, key: &str) -> Option<&Value> {
        self.group_vars.get(key)
    }

    /// Merge `vars` into this group's variables, overwriting existing keys
    pub fn add_group_vars(&mut self, vars: VarMap) {
        self.group_vars.extend(vars);
    }

    /// Depth-first search for a group by name, starting with this one
    pub fn find(&self, name: &str) -> Option<&Group> {
        if self.name == name {
            return Some(self);
        }
        self.subgroups.iter().find_map(|g| g.find(name))
    }

    /// Names of this group and all of its descendants, depth first
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        for g in &self.subgroups {
            names.extend(g.names());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subgroups() {
        let mut root = Group::new("speedy");
        root.add_subgroup("location_a").set_var("zone", "a");
        root.add_subgroup("location_b").add_subgroup("b_subgroup");

        assert_eq!(root.subgroups.len(), 2);
        assert_eq!(
            root.names(),
            vec!["speedy", "location_a", "location_b", "b_subgroup"]
        );

        let found = root.find("location_a").unwrap();
        assert_eq!(found.get_var("zone"), Some(&Value::from("a")));
        assert!(root.find("b_subgroup").is_some());
        assert!(root.find("missing").is_none());
    }

    #[test]
    fn test_group_vars_overwrite() {
        let mut g = Group::new("g");
        g.set_var("x", 1);
        let mut more = VarMap::new();
        more.insert("x".into(), Value::from(2));
        more.insert("y".into(), Value::from(true));
        g.add_group_vars(more);

        assert_eq!(g.get_var("x"), Some(&Value::from(2)));
        assert_eq!(g.get_var("y"), Some(&Value::from(true)));
    }
}
