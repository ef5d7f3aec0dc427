//! Middleware group expansion and priority ordering.
//!
//! # Responsibilities
//! - Expand group aliases into their members, recursively
//! - Drop repeated declarations, keeping the first occurrence
//! - Order the result by the configured priority list
//!
//! # Design Decisions
//! - Group cycles are rejected when the resolver is built, never per request
//! - The sort is stable: unlisted entries keep their declared order and run
//!   after every listed one

use std::collections::{HashMap, HashSet};

use crate::pipeline::blueprint::MiddlewareBlueprint;
use crate::routing::error::DefinitionError;

#[derive(Debug, Clone, Default)]
pub struct MiddlewareResolver {
    priority: HashMap<String, usize>,
    groups: HashMap<String, Vec<MiddlewareBlueprint>>,
}

impl MiddlewareResolver {
    /// Build a resolver. Fails if any group references itself, directly or not.
    pub fn new<P, S>(
        priority: P,
        groups: HashMap<String, Vec<MiddlewareBlueprint>>,
    ) -> Result<Self, DefinitionError>
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranks = HashMap::new();
        for (rank, id) in priority.into_iter().enumerate() {
            ranks.entry(id.into()).or_insert(rank);
        }

        let resolver = Self {
            priority: ranks,
            groups,
        };

        for name in resolver.groups.keys() {
            let mut out = Vec::new();
            resolver.expand_into(&MiddlewareBlueprint::new(name.clone()), &mut Vec::new(), &mut out)?;
        }

        Ok(resolver)
    }

    pub fn is_group(&self, id: &str) -> bool {
        self.groups.contains_key(id)
    }

    /// Expand, dedupe and sort a declaration list.
    pub fn resolve<'a, I>(&self, declared: I) -> Vec<MiddlewareBlueprint>
    where
        I: IntoIterator<Item = &'a MiddlewareBlueprint>,
    {
        let mut expanded = Vec::new();
        for bp in declared {
            // Cycles were ruled out in `new`.
            if self.expand_into(bp, &mut Vec::new(), &mut expanded).is_err() {
                tracing::error!(middleware = %bp, "Middleware group expansion failed");
            }
        }

        let mut seen = HashSet::new();
        expanded.retain(|bp| seen.insert(bp.clone()));

        self.sort(expanded)
    }

    /// Stable sort by priority rank; unlisted identifiers go last.
    pub fn sort(&self, mut blueprints: Vec<MiddlewareBlueprint>) -> Vec<MiddlewareBlueprint> {
        let last = self.priority.len();
        blueprints.sort_by_key(|bp| self.priority.get(&bp.id).copied().unwrap_or(last));
        blueprints
    }

    fn expand_into(
        &self,
        bp: &MiddlewareBlueprint,
        stack: &mut Vec<String>,
        out: &mut Vec<MiddlewareBlueprint>,
    ) -> Result<(), DefinitionError> {
        let members = match self.groups.get(&bp.id) {
            Some(members) if bp.args.is_empty() => members,
            _ => {
                out.push(bp.clone());
                return Ok(());
            }
        };

        if stack.contains(&bp.id) {
            stack.push(bp.id.clone());
            return Err(DefinitionError::MiddlewareGroupCycle(stack.join(" -> ")));
        }

        stack.push(bp.id.clone());
        for member in members {
            self.expand_into(member, stack, out)?;
        }
        stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bp(s: &str) -> MiddlewareBlueprint {
        s.parse().unwrap()
    }

    fn ids(list: &[MiddlewareBlueprint]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_priority_sort_is_stable() {
        let resolver = MiddlewareResolver::new(["a", "b", "c"], HashMap::new()).unwrap();
        let declared = [bp("x"), bp("c"), bp("y"), bp("a")];
        assert_eq!(ids(&resolver.resolve(&declared)), ["a", "c", "x", "y"]);
    }

    #[test]
    fn test_groups_expand_and_dedupe() {
        let mut groups = HashMap::new();
        groups.insert("web".to_string(), vec![bp("session"), bp("csrf")]);
        groups.insert("admin".to_string(), vec![bp("web"), bp("can:manage")]);
        let resolver = MiddlewareResolver::new(Vec::<String>::new(), groups).unwrap();

        let declared = [bp("csrf"), bp("admin"), bp("session")];
        assert_eq!(ids(&resolver.resolve(&declared)), ["csrf", "session", "can:manage"]);
    }

    #[test]
    fn test_same_id_different_args_kept() {
        let resolver = MiddlewareResolver::default();
        let declared = [bp("can:read"), bp("can:write"), bp("can:read")];
        assert_eq!(ids(&resolver.resolve(&declared)), ["can:read", "can:write"]);
    }

    #[test]
    fn test_group_cycle_rejected() {
        let mut groups = HashMap::new();
        groups.insert("a".to_string(), vec![bp("b")]);
        groups.insert("b".to_string(), vec![bp("a")]);
        let err = MiddlewareResolver::new(Vec::<String>::new(), groups).unwrap_err();
        assert!(matches!(err, DefinitionError::MiddlewareGroupCycle(_)));
    }
}
