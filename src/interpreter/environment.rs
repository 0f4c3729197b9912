//! Environments and their reclamation.
//!
//! Every environment lives in one [`EnvRegistry`] and is addressed by an
//! [`EnvId`]. Enclosing links and closures hold ids, never the environment
//! itself, so the graph may be cyclic: a closure stored in the environment it
//! captured keeps that environment alive only through the registry. Unreachable
//! environments are freed by [`EnvRegistry::collect`], a stop-the-world
//! mark-sweep over the ids reachable from the given roots.

use rustc_hash::FxHashMap;

use super::value::Value;

/// Stable handle to a registered environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EnvId(u32);

impl EnvId {
    pub const GLOBAL: EnvId = EnvId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
pub struct Environment {
    values: FxHashMap<String, Value>,
    enclosing: Option<EnvId>,
}

impl Environment {
    fn new(enclosing: Option<EnvId>) -> Self {
        Self {
            values: FxHashMap::default(),
            enclosing,
        }
    }

    pub fn enclosing(&self) -> Option<EnvId> {
        self.enclosing
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Overwrites an existing binding; `false` if there is none.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Binds `name`, replacing any previous binding in this environment.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }
}

/// Slot storage for every environment the interpreter created.
///
/// Slot 0 is the global environment and is never swept. Freed slots are
/// recycled by later allocations.
#[derive(Debug)]
pub struct EnvRegistry {
    slots: Vec<Option<Environment>>,
    free: Vec<u32>,
    live: usize,
    allocated_since_collect: usize,
}

impl Default for EnvRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvRegistry {
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Environment::new(None))],
            free: vec![],
            live: 1,
            allocated_since_collect: 0,
        }
    }

    /// Number of environments currently registered, globals included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Environments allocated since the last [`EnvRegistry::collect`].
    pub fn allocated_since_collect(&self) -> usize {
        self.allocated_since_collect
    }

    pub fn alloc(&mut self, enclosing: EnvId) -> EnvId {
        let env = Some(Environment::new(Some(enclosing)));
        self.live += 1;
        self.allocated_since_collect += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = env;
                EnvId(slot)
            }
            None => {
                self.slots.push(env);
                EnvId((self.slots.len() - 1) as u32)
            }
        }
    }

    pub fn get(&self, id: EnvId) -> Option<&Environment> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: EnvId) -> Option<&mut Environment> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Walks `hops` enclosing links outward from `id`.
    pub fn ancestor(&self, id: EnvId, hops: usize) -> Option<EnvId> {
        let mut current = id;
        for _ in 0..hops {
            current = self.get(current)?.enclosing?;
        }
        Some(current)
    }

    pub fn get_at(&self, id: EnvId, hops: usize, name: &str) -> Option<&Value> {
        let target = self.ancestor(id, hops)?;
        self.get(target)?.get(name)
    }

    pub fn assign_at(&mut self, id: EnvId, hops: usize, name: &str, value: Value) -> bool {
        let Some(target) = self.ancestor(id, hops) else {
            return false;
        };
        self.get_mut(target)
            .is_some_and(|env| env.assign(name, value))
    }

    /// Frees every environment not reachable from `roots` or from the
    /// closures among `values`. Returns the number of environments swept.
    pub fn collect<'v>(
        &mut self,
        roots: impl IntoIterator<Item = EnvId>,
        values: impl IntoIterator<Item = &'v Value>,
    ) -> usize {
        self.allocated_since_collect = 0;
        let mut marked = vec![false; self.slots.len()];
        let mut worklist = vec![EnvId::GLOBAL];
        worklist.extend(roots);
        worklist.extend(
            values
                .into_iter()
                .filter_map(|value| value.as_callable().map(|c| c.closure)),
        );

        while let Some(id) = worklist.pop() {
            let Some(seen) = marked.get_mut(id.index()) else {
                continue;
            };
            if *seen {
                continue;
            }
            *seen = true;
            let Some(env) = self.get(id) else {
                continue;
            };
            worklist.extend(env.enclosing);
            worklist.extend(
                env.values
                    .values()
                    .filter_map(|value| value.as_callable().map(|c| c.closure)),
            );
        }

        let mut swept = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !marked[index] {
                *slot = None;
                self.free.push(index as u32);
                swept += 1;
            }
        }
        self.live -= swept;
        tracing::debug!(live = self.live, swept, "collected environments");
        swept
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::interpreter::value::{Callable, CallableKind};

    fn closure_over(env: EnvId) -> Value {
        Value::Callable(Rc::new(Callable {
            name: "f".to_string(),
            arity: 0,
            closure: env,
            kind: CallableKind::Native(|_| Value::Nil),
        }))
    }

    #[test]
    fn lookup_walks_enclosing_links() {
        let mut envs = EnvRegistry::new();
        let outer = envs.alloc(EnvId::GLOBAL);
        let inner = envs.alloc(outer);
        envs.get_mut(outer).unwrap().define("a", Value::from(1.0));

        assert_eq!(envs.get_at(inner, 1, "a"), Some(&Value::from(1.0)));
        assert_eq!(envs.get_at(inner, 0, "a"), None);
        assert_eq!(envs.ancestor(inner, 2), Some(EnvId::GLOBAL));
        assert_eq!(envs.ancestor(inner, 3), None);
    }

    #[test]
    fn assign_requires_existing_binding() {
        let mut envs = EnvRegistry::new();
        let env = envs.alloc(EnvId::GLOBAL);
        assert!(!envs.assign_at(env, 0, "a", Value::Nil));
        envs.get_mut(env).unwrap().define("a", Value::Nil);
        assert!(envs.assign_at(env, 0, "a", Value::from(true)));
        assert_eq!(envs.get_at(env, 0, "a"), Some(&Value::from(true)));
    }

    #[test]
    fn unreachable_environments_are_swept() {
        let mut envs = EnvRegistry::new();
        let kept = envs.alloc(EnvId::GLOBAL);
        let child = envs.alloc(kept);
        envs.alloc(EnvId::GLOBAL);
        envs.alloc(child);
        assert_eq!(envs.len(), 5);

        let swept = envs.collect([child], []);
        assert_eq!(swept, 2);
        assert_eq!(envs.len(), 3);
        assert_eq!(envs.allocated_since_collect(), 0);
        assert!(envs.get(kept).is_some());
        assert!(envs.get(child).is_some());
    }

    #[test]
    fn closures_keep_their_environment_alive() {
        let mut envs = EnvRegistry::new();
        let captured = envs.alloc(EnvId::GLOBAL);
        envs.get_mut(EnvId::GLOBAL)
            .unwrap()
            .define("f", closure_over(captured));

        assert_eq!(envs.collect([], []), 0);
        assert!(envs.get(captured).is_some());
    }

    #[test]
    fn cycles_terminate_and_are_reclaimed() {
        let mut envs = EnvRegistry::new();
        let env = envs.alloc(EnvId::GLOBAL);
        envs.get_mut(env).unwrap().define("self", closure_over(env));

        let pending = closure_over(env);
        assert_eq!(envs.collect([], [&pending]), 0);
        assert_eq!(envs.collect([], []), 1);
        assert!(envs.get(env).is_none());
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut envs = EnvRegistry::new();
        let first = envs.alloc(EnvId::GLOBAL);
        envs.collect([], []);
        let second = envs.alloc(EnvId::GLOBAL);
        assert_eq!(first, second);
        assert_eq!(envs.len(), 2);
    }
}
