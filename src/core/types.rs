//! Core identifier types for the scheduling engine.
//!
//! Jobs and triggers are both addressed by a (name, group) pair. The two live
//! in separate namespaces, but a trigger key is conventionally derived from
//! its job key (see [`JobKey::trigger_key`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a job or trigger: a (name, group) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    name: String,
    group: String,
}

impl JobKey {
    /// Create a new key from a name and group.
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Get the name component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the group component.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Derive the conventional trigger key for this job key.
    ///
    /// Mirrors the `<jobName>_trigger` convention used when a job is
    /// scheduled with exactly one trigger.
    pub fn trigger_key(&self) -> JobKey {
        JobKey::new(format!("{}_trigger", self.name), self.group.clone())
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_accessors() {
        let key = JobKey::new("ping", "grp1");
        assert_eq!(key.name(), "ping");
        assert_eq!(key.group(), "grp1");
    }

    #[test]
    fn test_key_display() {
        let key = JobKey::new("ping", "grp1");
        assert_eq!(format!("{}", key), "grp1/ping");
    }

    #[test]
    fn test_key_equality() {
        let a = JobKey::new("ping", "grp1");
        let b = JobKey::new("ping", "grp1");
        let c = JobKey::new("ping", "grp2");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_trigger_key_derivation() {
        let key = JobKey::new("ping", "grp1");
        let trigger = key.trigger_key();

        assert_eq!(trigger.name(), "ping_trigger");
        assert_eq!(trigger.group(), "grp1");
    }

    #[test]
    fn test_keys_are_hashable() {
        use std::collections::HashSet;

        let mut keys: HashSet<JobKey> = HashSet::new();
        keys.insert(JobKey::new("a", "g"));
        keys.insert(JobKey::new("b", "g"));
        keys.insert(JobKey::new("a", "g"));

        assert_eq!(keys.len(), 2);
    }
}
