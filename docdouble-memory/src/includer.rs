//! Pointer dereferencing for `include` paths.
//!
//! Each include path is walked segment by segment over records that were
//! already copied out of the store. A pointer is replaced by the stored
//! record it names, tagged `{"__type": "Object", "className": ...}`; a list
//! of pointers is expanded element by element. Stored records are only read.

use serde_json::Value;

use docdouble_core::{
    query::IncludePath,
    record::{CLASS_NAME, Pointer, Record, TYPE_KEY, is_truthy},
};

use crate::state::StoreState;

enum Dereferenced {
    Found(Record),
    /// A pointer to a record that does not exist.
    Missing,
    /// Not pointer-shaped; left as it is.
    NotPointer,
}

fn dereference(state: &StoreState, value: &Value) -> Dereferenced {
    // already expanded by an earlier path
    if let Some(expanded) = value
        .as_object()
        .filter(|object| object.get(TYPE_KEY).and_then(Value::as_str) == Some("Object"))
    {
        return Dereferenced::Found(expanded.clone());
    }

    let Some(pointer) = Pointer::from_value(value) else {
        return Dereferenced::NotPointer;
    };

    let Some(stored) = state.fetch(&pointer.class_name, &pointer.object_id) else {
        return Dereferenced::Missing;
    };

    let mut fetched = Record::new();
    fetched.insert(TYPE_KEY.to_string(), Value::from("Object"));
    fetched.insert(CLASS_NAME.to_string(), Value::from(pointer.class_name.clone()));
    fetched.extend(stored.clone());
    state.strip_masked(&pointer.class_name, &mut fetched);

    Dereferenced::Found(fetched)
}

fn include_path(state: &StoreState, object: &mut Record, path: &[String]) {
    let Some((segment, rest)) = path.split_first() else {
        return;
    };

    let target = object.get(segment);
    if !is_truthy(target) {
        return;
    }

    let replacement = match target {
        Some(Value::Array(items)) => Some(Value::Array(
            items
                .iter()
                .map(|item| match dereference(state, item) {
                    Dereferenced::Found(mut fetched) => {
                        include_path(state, &mut fetched, rest);
                        Value::Object(fetched)
                    },
                    Dereferenced::Missing => Value::Null,
                    Dereferenced::NotPointer => item.clone(),
                })
                .collect()
        )),
        Some(single) => match dereference(state, single) {
            Dereferenced::Found(mut fetched) => {
                include_path(state, &mut fetched, rest);
                Some(Value::Object(fetched))
            },
            Dereferenced::Missing => None,
            Dereferenced::NotPointer => return,
        },
        None => return,
    };

    match replacement {
        Some(value) => object.insert(segment.clone(), value),
        None => object.remove(segment),
    };
}

/// Expands every include path over `records`, one path after another.
///
/// A later path sees the expansion done by an earlier one, so
/// `author,author.team` works as well as `author.team` alone.
pub fn expand(state: &StoreState, records: &mut [Record], include: &[IncludePath]) {
    for path in include {
        for record in records.iter_mut() {
            include_path(state, record, path);
        }
    }
}
