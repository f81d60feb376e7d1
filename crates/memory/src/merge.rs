//! Recursive merges over JSON document trees.
//!
//! Both functions are pure: they take ownership of their inputs and return
//! the merged tree without touching the filesystem.

use serde_json::Value;

/// Apply `patch` on top of `base`.
///
/// Objects merge key by key, recursively. Any other patch value (scalar,
/// array, `null`) replaces whatever `base` held at that position.
pub fn deep_update(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, patch_value) in patch {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_update(existing, patch_value),
                    None => patch_value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

/// Fold `source` into `target` for a user merge.
///
/// | source \ target | missing | object           | array                    | other        |
/// |-----------------|---------|------------------|--------------------------|--------------|
/// | object          | copy    | recurse          | target wins              | target wins  |
/// | array           | copy    | target wins      | concat, skip duplicates  | target wins  |
/// | other           | copy    | target wins      | target wins              | target wins  |
pub fn merge_documents(source: Value, target: Value) -> Value {
    match (source, target) {
        (Value::Object(source), Value::Object(mut target)) => {
            for (key, source_value) in source {
                let merged = match target.remove(&key) {
                    Some(existing) => merge_documents(source_value, existing),
                    None => source_value,
                };
                target.insert(key, merged);
            }
            Value::Object(target)
        }
        (Value::Array(source), Value::Array(mut target)) => {
            for item in source {
                if !target.contains(&item) {
                    target.push(item);
                }
            }
            Value::Array(target)
        }
        (_, target) => target,
    }
}
