//! The signal environment: name → current value for one evaluation.

use galena_common::{Bits, Ident};
use std::collections::HashMap;

/// Values bound during one evaluation of one module.
///
/// Scoped to a single module instance; children get their own environment
/// built from their port bindings.
#[derive(Clone, Default)]
pub struct SignalEnv {
    values: HashMap<Ident, Bits>,
}

impl SignalEnv {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current value of `name`, if bound.
    pub fn get(&self, name: Ident) -> Option<Bits> {
        self.values.get(&name).copied()
    }

    /// Returns `true` if `name` has a value.
    pub fn is_bound(&self, name: Ident) -> bool {
        self.values.contains_key(&name)
    }

    /// Binds `name`, returning `true` if the value is new or changed.
    pub fn bind(&mut self, name: Ident, value: Bits) -> bool {
        match self.values.insert(name, value) {
            Some(old) => old != value,
            None => true,
        }
    }

    /// Iterates over all bindings.
    pub fn iter(&self) -> impl Iterator<Item = (Ident, Bits)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_reports_changes() {
        let mut env = SignalEnv::new();
        let a = Ident::from_raw(1);
        assert!(env.bind(a, Bits::new(4, 3)));
        assert!(!env.bind(a, Bits::new(4, 3)));
        assert!(env.bind(a, Bits::new(4, 5)));
        assert_eq!(env.get(a), Some(Bits::new(4, 5)));
    }

    #[test]
    fn unbound_reads_are_none() {
        let env = SignalEnv::new();
        assert_eq!(env.get(Ident::from_raw(9)), None);
        assert!(!env.is_bound(Ident::from_raw(9)));
    }
}
