//! Applying patches to JSON trees.

use serde_json::Value;

use super::{pointer, Patch, PatchError, PatchOp, PathSegment};

impl Patch {
    /// Apply every operation in order.
    ///
    /// Stops at the first failing operation; earlier operations stay applied,
    /// so apply to a scratch copy when atomicity matters.
    pub fn apply(&self, target: &mut Value) -> Result<(), PatchError> {
        for op in &self.ops {
            apply_op(op, target)?;
        }
        Ok(())
    }
}

fn apply_op(op: &PatchOp, target: &mut Value) -> Result<(), PatchError> {
    let Some((last, parent_path)) = op.path().split_last() else {
        return match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                *target = value.clone();
                Ok(())
            }
            PatchOp::Remove { .. } => Err(PatchError::RemoveRoot),
        };
    };

    let parent = resolve(target, parent_path)?;
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(key)) => match op {
            PatchOp::Add { value, .. } => {
                map.insert(key.clone(), value.clone());
                Ok(())
            }
            PatchOp::Replace { value, .. } => match map.get_mut(key) {
                Some(slot) => {
                    *slot = value.clone();
                    Ok(())
                }
                None => Err(PatchError::PathNotFound(pointer(op.path()))),
            },
            PatchOp::Remove { .. } => map
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| PatchError::PathNotFound(pointer(op.path()))),
        },
        (Value::Array(items), PathSegment::Index(index)) => {
            let index = *index;
            let len = items.len();
            let out_of_bounds = || PatchError::IndexOutOfBounds {
                path: pointer(parent_path),
                index,
                len,
            };
            match op {
                PatchOp::Add { value, .. } => {
                    if index > len {
                        return Err(out_of_bounds());
                    }
                    items.insert(index, value.clone());
                }
                PatchOp::Replace { value, .. } => {
                    *items.get_mut(index).ok_or_else(out_of_bounds)? = value.clone();
                }
                PatchOp::Remove { .. } => {
                    if index >= len {
                        return Err(out_of_bounds());
                    }
                    items.remove(index);
                }
            }
            Ok(())
        }
        (Value::Array(_), PathSegment::Key(_)) => Err(PatchError::TypeMismatch {
            path: pointer(parent_path),
            expected: "object",
        }),
        (Value::Object(_), PathSegment::Index(_)) => Err(PatchError::TypeMismatch {
            path: pointer(parent_path),
            expected: "array",
        }),
        _ => Err(PatchError::TypeMismatch {
            path: pointer(parent_path),
            expected: "container",
        }),
    }
}

fn resolve<'v>(root: &'v mut Value, path: &[PathSegment]) -> Result<&'v mut Value, PatchError> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        let next = match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
            (Value::Array(items), PathSegment::Index(i)) => items.get_mut(*i),
            _ => None,
        };
        current = next.ok_or_else(|| PatchError::PathNotFound(pointer(&path[..=depth])))?;
    }
    Ok(current)
}
