//! Lexical scope for a parse lineage.
//!
//! A scope holds closure variables bound by `name ->` and local stream
//! overrides installed by `name = ...`. Child parse nodes receive a copy of
//! their parent's scope: bindings added in the child are invisible to the
//! parent, while the variable storage itself is shared.
//!
//! Variable storage is an arena of slots addressed by generation-stamped
//! handles. Every `->` allocates a fresh slot, the bind transform writes it
//! once per upstream element, and any number of readers see the current
//! value. A released slot bumps its generation, so handles that outlive it
//! read as unbound instead of seeing a recycled value.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use stsh_types::{StreamFactory, Value};

/// Handle to a variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarSlot {
    index: usize,
    generation: u32,
}

#[derive(Debug, Default)]
struct Entry {
    generation: u32,
    live: bool,
    value: Option<Value>,
}

#[derive(Debug, Default)]
struct Arena {
    entries: Vec<Entry>,
    free: Vec<usize>,
}

impl Arena {
    fn entry(&self, slot: VarSlot) -> Option<&Entry> {
        self.entries
            .get(slot.index)
            .filter(|e| e.live && e.generation == slot.generation)
    }

    fn entry_mut(&mut self, slot: VarSlot) -> Option<&mut Entry> {
        self.entries
            .get_mut(slot.index)
            .filter(|e| e.live && e.generation == slot.generation)
    }
}

/// Shared slot storage. Cloning shares the same arena.
#[derive(Debug, Clone, Default)]
pub struct Slots {
    arena: Rc<RefCell<Arena>>,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an unset slot, reusing released ones first.
    pub fn alloc(&self) -> VarSlot {
        let mut arena = self.arena.borrow_mut();
        if let Some(index) = arena.free.pop() {
            let entry = &mut arena.entries[index];
            entry.live = true;
            entry.value = None;
            return VarSlot {
                index,
                generation: entry.generation,
            };
        }
        arena.entries.push(Entry {
            generation: 0,
            live: true,
            value: None,
        });
        VarSlot {
            index: arena.entries.len() - 1,
            generation: 0,
        }
    }

    /// Current value of a slot. `None` when unset or stale.
    pub fn get(&self, slot: VarSlot) -> Option<Value> {
        self.arena.borrow().entry(slot).and_then(|e| e.value.clone())
    }

    /// Store a value. Returns false if the handle is stale.
    pub fn set(&self, slot: VarSlot, value: Value) -> bool {
        match self.arena.borrow_mut().entry_mut(slot) {
            Some(entry) => {
                entry.value = Some(value);
                true
            }
            None => false,
        }
    }

    /// Free a slot. Outstanding handles to it become stale.
    pub fn release(&self, slot: VarSlot) {
        let mut arena = self.arena.borrow_mut();
        let Some(entry) = arena.entry_mut(slot) else {
            return;
        };
        entry.live = false;
        entry.value = None;
        entry.generation = entry.generation.wrapping_add(1);
        arena.free.push(slot.index);
    }

    /// Number of slots currently allocated.
    pub fn live(&self) -> usize {
        let arena = self.arena.borrow();
        arena.entries.len() - arena.free.len()
    }
}

/// Variables and local overrides visible at one point of a parse.
#[derive(Clone, Default)]
pub struct Scope {
    vars: BTreeMap<String, VarSlot>,
    env_overrides: BTreeMap<String, StreamFactory>,
    slots: Slots,
}

impl Scope {
    /// Create an empty scope storing its variables in `slots`.
    pub fn new(slots: Slots) -> Self {
        Self {
            vars: BTreeMap::new(),
            env_overrides: BTreeMap::new(),
            slots,
        }
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Declare a fresh variable, shadowing any earlier binding of the name.
    pub fn bind(&mut self, name: impl Into<String>) -> VarSlot {
        let slot = self.slots.alloc();
        self.vars.insert(name.into(), slot);
        slot
    }

    /// Check if a name is a variable in this scope.
    pub fn is_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Check if a word is a variable, optionally followed by a dotted path.
    pub fn is_var_path(&self, word: &str) -> bool {
        let head = word.split('.').next().unwrap_or(word);
        self.is_var(head)
    }

    /// Get a variable's current value. Unset variables read as null.
    pub fn get(&self, name: &str) -> Option<Value> {
        let slot = self.vars.get(name)?;
        Some(self.slots.get(*slot).unwrap_or_else(Value::null))
    }

    /// Resolve `name.field.field` against the variable `name`.
    ///
    /// Field lookup is best-effort: a missing field yields the container it
    /// was looked up in.
    pub fn resolve_path(&self, word: &str) -> Option<Value> {
        let mut segments = word.split('.');
        let head = segments.next()?;
        let value = self.get(head)?;
        Some(value.project(segments))
    }

    /// Shadow a global stream for the rest of this lineage.
    pub fn set_override(&mut self, name: impl Into<String>, factory: StreamFactory) {
        self.env_overrides.insert(name.into(), factory);
    }

    pub fn env_override(&self, name: &str) -> Option<StreamFactory> {
        self.env_overrides.get(name).cloned()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("vars", &self.vars)
            .field("env_overrides", &self.env_overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}
