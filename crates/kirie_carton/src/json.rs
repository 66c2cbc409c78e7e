//! Deep merge for JSON descriptor fragments.
//!
//! Two array policies exist: config accumulation inside one compile merges
//! arrays index by index, while the bundle finalizer lets the override
//! replace arrays wholesale.

use serde_json::{Map, Value};

/// How arrays present on both sides of a merge are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayMerge {
    /// Merge element-wise; the longer array's tail is kept.
    #[default]
    IndexWise,
    /// The override array replaces the base array.
    Replace,
}

/// Merge `overlay` into `base` in place. Scalars in `overlay` win.
pub fn deep_merge_into(base: &mut Value, overlay: &Value, arrays: ArrayMerge) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            merge_maps(base_map, overlay_map, arrays);
        }
        (Value::Array(base_items), Value::Array(overlay_items))
            if arrays == ArrayMerge::IndexWise =>
        {
            for (index, item) in overlay_items.iter().enumerate() {
                match base_items.get_mut(index) {
                    Some(slot) => deep_merge_into(slot, item, arrays),
                    None => base_items.push(item.clone()),
                }
            }
        }
        (slot, overlay) => *slot = overlay.clone(),
    }
}

fn merge_maps(base: &mut Map<String, Value>, overlay: &Map<String, Value>, arrays: ArrayMerge) {
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing) => deep_merge_into(existing, value, arrays),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merge a sequence of layers left to right into a fresh object.
pub fn deep_merge<'a, I>(layers: I, arrays: ArrayMerge) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut out = Value::Object(Map::new());
    for layer in layers {
        deep_merge_into(&mut out, layer, arrays);
    }
    out
}

/// Whether a value is a plain JSON object.
#[inline]
pub fn is_plain_object(value: &Value) -> bool {
    value.is_object()
}
