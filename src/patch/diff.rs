//! Structural diff of two JSON trees.

use serde_json::{Map, Value};

use super::{Patch, PatchOp, Path, PathSegment};

impl Patch {
    /// Diff two trees.
    ///
    /// Objects are diffed key by key (removals first). Arrays skip their
    /// equal leading and trailing runs, then go element by element over the
    /// rest with inserts or removals at its end.
    /// Anything else that differs is replaced wholesale.
    #[must_use]
    pub fn diff(before: &Value, after: &Value) -> Self {
        let mut ops = Vec::new();
        let mut path = Path::new();
        diff_value(before, after, &mut path, &mut ops);
        Patch { ops }
    }
}

fn diff_value(before: &Value, after: &Value, path: &mut Path, ops: &mut Vec<PatchOp>) {
    if before == after {
        return;
    }
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => diff_object(b, a, path, ops),
        (Value::Array(b), Value::Array(a)) => diff_array(b, a, path, ops),
        _ => ops.push(PatchOp::Replace {
            path: path.clone(),
            value: after.clone(),
        }),
    }
}

fn diff_object(before: &Map<String, Value>, after: &Map<String, Value>, path: &mut Path, ops: &mut Vec<PatchOp>) {
    for key in before.keys().filter(|k| !after.contains_key(*k)) {
        path.push(PathSegment::Key(key.clone()));
        ops.push(PatchOp::Remove { path: path.clone() });
        path.pop();
    }

    for (key, value) in after {
        path.push(PathSegment::Key(key.clone()));
        match before.get(key) {
            Some(prev) => diff_value(prev, value, path, ops),
            None => ops.push(PatchOp::Add {
                path: path.clone(),
                value: value.clone(),
            }),
        }
        path.pop();
    }
}

fn diff_array(before: &[Value], after: &[Value], path: &mut Path, ops: &mut Vec<PatchOp>) {
    // Equal runs at either end need no ops, so a lone insert or removal
    // anywhere is a single op.
    let prefix = before.iter().zip(after).take_while(|(b, a)| b == a).count();
    let suffix = before[prefix..]
        .iter()
        .rev()
        .zip(after[prefix..].iter().rev())
        .take_while(|(b, a)| b == a)
        .count();
    let before = &before[prefix..before.len() - suffix];
    let after = &after[prefix..after.len() - suffix];
    let common = before.len().min(after.len());

    for (i, (prev, next)) in before.iter().zip(after).enumerate() {
        path.push(PathSegment::Index(prefix + i));
        diff_value(prev, next, path, ops);
        path.pop();
    }

    for (i, value) in after.iter().enumerate().skip(common) {
        path.push(PathSegment::Index(prefix + i));
        ops.push(PatchOp::Add {
            path: path.clone(),
            value: value.clone(),
        });
        path.pop();
    }

    // Highest index first so earlier removals don't shift later ones.
    for i in (common..before.len()).rev() {
        path.push(PathSegment::Index(prefix + i));
        ops.push(PatchOp::Remove { path: path.clone() });
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(before: Value, after: Value) -> Patch {
        let patch = Patch::diff(&before, &after);
        let mut value = before;
        patch.apply(&mut value).unwrap();
        assert_eq!(value, after);
        patch
    }

    #[test]
    fn test_identical_is_empty() {
        let v = json!({ "a": [1, 2, { "b": null }] });
        assert!(Patch::diff(&v, &v).is_empty());
    }

    #[test]
    fn test_object_changes() {
        let patch = roundtrip(json!({ "a": 1, "b": 2 }), json!({ "a": 1, "c": 3 }));
        assert_eq!(patch.len(), 2);
        assert!(matches!(patch.ops[0], PatchOp::Remove { .. }));
        assert!(matches!(patch.ops[1], PatchOp::Add { .. }));
    }

    #[test]
    fn test_nested_replace_is_minimal() {
        let patch = roundtrip(
            json!({ "players": [{ "hp": 10, "name": "x" }, { "hp": 7 }] }),
            json!({ "players": [{ "hp": 9, "name": "x" }, { "hp": 7 }] }),
        );
        assert_eq!(patch.len(), 1);
        assert_eq!(crate::patch::pointer(patch.ops[0].path()), "/players/0/hp");
    }

    #[test]
    fn test_array_shrink_and_grow() {
        let shrink = roundtrip(json!([1, 2, 3, 4]), json!([1, 5]));
        assert_eq!(shrink.len(), 3);
        roundtrip(json!([1]), json!([1, 2, 3]));
        roundtrip(json!([]), json!([[], {}]));
    }

    #[test]
    fn test_type_change_replaces() {
        let patch = roundtrip(json!({ "x": [1] }), json!({ "x": "one" }));
        assert!(matches!(&patch.ops[0], PatchOp::Replace { value, .. } if value == &json!("one")));
        roundtrip(json!(1), json!(null));
    }

    #[test]
    fn test_array_edit_at_front_is_one_op() {
        let removed = roundtrip(json!(["A", "B", "C", "D", "E"]), json!(["B", "C", "D", "E"]));
        assert_eq!(removed.ops, vec![PatchOp::Remove { path: Path::from_vec(vec![PathSegment::Index(0)]) }]);

        let inserted = roundtrip(json!(["B", "C", "D"]), json!(["A", "B", "C", "D"]));
        assert_eq!(inserted.len(), 1);
        assert!(matches!(&inserted.ops[0], PatchOp::Add { value, .. } if value == &json!("A")));

        let middle = roundtrip(json!([1, 2, 3, 4, 5]), json!([1, 2, 4, 5]));
        assert_eq!(middle.len(), 1);
        assert_eq!(crate::patch::pointer(middle.ops[0].path()), "/2");
    }

    #[test]
    fn test_array_repeated_elements() {
        roundtrip(json!([1, 1, 1]), json!([1, 1]));
        roundtrip(json!([1, 2, 1]), json!([1]));
        roundtrip(json!([0, 1, 0]), json!([0, 2, 3, 0]));
    }
}
