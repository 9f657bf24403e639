//! Reference resolver.

use indexmap::IndexSet;
use trellis_core::{Config, Reference, Value};

/// Collect every reference held anywhere in a config
///
/// Nested lists and maps are scanned; literals are ignored. References are
/// returned in first-appearance order and each appears once.
#[must_use]
pub fn resolve_references(config: &Config) -> IndexSet<Reference> {
    let mut found = IndexSet::new();
    for (_, value) in config {
        collect(value, &mut found);
    }
    found
}

fn collect(value: &Value, found: &mut IndexSet<Reference>) {
    match value {
        Value::Ref(reference) => {
            found.insert(reference.clone());
        }
        Value::List(items) => {
            for item in items {
                collect(item, found);
            }
        }
        Value::Map(entries) => {
            for item in entries.values() {
                collect(item, found);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}
