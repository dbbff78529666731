//! The global environment of named streams.
//!
//! `$name = ...` stores a factory here and `$name` looks it up. The kernel
//! only needs get/set plus the interrupt used by sleeping sources; loading
//! from configuration and process variables belongs to the embedder.

use std::cell::RefCell;
use std::collections::BTreeMap;

use stsh_types::StreamFactory;

use crate::interrupt::Interrupt;

/// Named streams shared by every line evaluated against it.
///
/// Methods take `&self` so the environment can be shared by the parser and
/// the streams it builds; implementations use interior mutability.
pub trait Environment {
    fn get(&self, name: &str) -> Option<StreamFactory>;

    fn set(&self, name: &str, factory: StreamFactory);

    /// The interrupt that cancels sleeping sources and running processes.
    fn interrupt(&self) -> Interrupt;
}

/// In-memory environment, used by tests and as a building block.
#[derive(Default)]
pub struct MemoryEnv {
    streams: RefCell<BTreeMap<String, StreamFactory>>,
    interrupt: Interrupt,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names currently bound, in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.streams.borrow().keys().cloned().collect()
    }
}

impl Environment for MemoryEnv {
    fn get(&self, name: &str) -> Option<StreamFactory> {
        self.streams.borrow().get(name).cloned()
    }

    fn set(&self, name: &str, factory: StreamFactory) {
        tracing::debug!(name, "environment binding set");
        self.streams.borrow_mut().insert(name.to_string(), factory);
    }

    fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stsh_types::{Value, stream};

    #[test]
    fn set_then_get() {
        let env = MemoryEnv::new();
        assert!(env.get("x").is_none());
        env.set("x", stream::constant(vec![Value::number(1.0)]));
        let factory = env.get("x").unwrap();
        assert_eq!(stream::collect(factory(stream::empty())), Ok(vec![Value::number(1.0)]));
        assert_eq!(env.names(), vec!["x".to_string()]);
    }

    #[test]
    fn interrupt_is_shared() {
        let env = MemoryEnv::new();
        env.interrupt().trigger();
        assert!(env.interrupt().is_triggered());
    }
}
