//! Shared handles every stage needs while it runs.

use std::rc::Rc;

use crate::builtins::BuiltinRegistry;
use crate::config::KernelConfig;
use crate::env::Environment;

/// Environment, builtins and configuration, cheap to clone into streams.
#[derive(Clone)]
pub struct ExecContext {
    pub env: Rc<dyn Environment>,
    pub builtins: Rc<BuiltinRegistry>,
    pub config: Rc<KernelConfig>,
}

impl ExecContext {
    /// Context with the standard builtins and default configuration.
    pub fn new(env: Rc<dyn Environment>) -> Self {
        Self {
            env,
            builtins: Rc::new(BuiltinRegistry::with_defaults()),
            config: Rc::new(KernelConfig::default()),
        }
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = Rc::new(config);
        self
    }

    pub fn with_builtins(mut self, builtins: BuiltinRegistry) -> Self {
        self.builtins = Rc::new(builtins);
        self
    }
}
