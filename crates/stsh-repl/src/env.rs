//! The environment used by the shell binary.
//!
//! Bindings made by lines live in memory. Names never bound fall back to the
//! process environment: `$PATH` reads as a stream of its `:`-separated
//! entries. A variable is read once and cached, so later changes to the
//! process environment are not seen.

use stsh_kernel::{Environment, Interrupt, MemoryEnv};
use stsh_types::{stream, StreamFactory, Value};

/// Environment backed by memory with a process-variable fallback.
pub struct ProdEnv {
    bindings: MemoryEnv,
}

impl ProdEnv {
    pub fn new() -> Self {
        let bindings = MemoryEnv::new();
        bindings.set(
            "STSH_VERSION",
            stream::constant(vec![Value::string(env!("CARGO_PKG_VERSION"))]),
        );
        Self { bindings }
    }

    /// Names bound in memory so far, including cached process variables.
    pub fn names(&self) -> Vec<String> {
        self.bindings.names()
    }
}

impl Default for ProdEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for ProdEnv {
    fn get(&self, name: &str) -> Option<StreamFactory> {
        if let Some(factory) = self.bindings.get(name) {
            return Some(factory);
        }
        let raw = std::env::var(name).ok()?;
        tracing::debug!(name, "reading process variable");
        let factory = stream::constant(split_var(&raw));
        self.bindings.set(name, factory.clone());
        Some(factory)
    }

    fn set(&self, name: &str, factory: StreamFactory) {
        self.bindings.set(name, factory);
    }

    fn interrupt(&self) -> Interrupt {
        self.bindings.interrupt()
    }
}

fn split_var(raw: &str) -> Vec<Value> {
    raw.split(':').map(Value::string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(env: &ProdEnv, name: &str) -> Option<Vec<String>> {
        let factory = env.get(name)?;
        let values = stream::collect(factory(stream::empty())).unwrap();
        Some(values.iter().map(Value::render).collect())
    }

    #[test]
    fn version_is_predefined() {
        let env = ProdEnv::new();
        assert_eq!(read(&env, "STSH_VERSION"), Some(vec![env!("CARGO_PKG_VERSION").to_string()]));
    }

    #[test]
    fn process_variables_split_on_colons() {
        let env = ProdEnv::new();
        // cargo sets PATH for test runs.
        let path = read(&env, "PATH").unwrap();
        assert_eq!(path.join(":"), std::env::var("PATH").unwrap());
        assert!(env.names().contains(&"PATH".to_string()));
    }

    #[test]
    fn bindings_shadow_process_variables() {
        let env = ProdEnv::new();
        env.set("PATH", stream::constant(vec![Value::string("/opt/bin")]));
        assert_eq!(read(&env, "PATH"), Some(vec!["/opt/bin".to_string()]));
    }

    #[test]
    fn unknown_names_are_unbound() {
        let env = ProdEnv::new();
        assert_eq!(read(&env, "STSH_SURELY_UNSET_VARIABLE"), None);
    }

    #[test]
    fn split_var_keeps_empty_entries() {
        let values: Vec<String> = split_var("a::b").iter().map(Value::render).collect();
        assert_eq!(values, vec!["a", "", "b"]);
    }
}
