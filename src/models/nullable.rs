//! PATCH fields that distinguish "absent" from an explicit `null`.
//!
//! Use with `#[serde(default, deserialize_with = "nullable::deserialize")]` on
//! an `Option<Option<T>>`: absent is `None`, `null` is `Some(None)`, a value
//! is `Some(Some(v))`.

use serde::{Deserialize, Deserializer};

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Applies a PATCH value onto the current one.
pub fn apply<T>(patch: Option<Option<T>>, current: Option<T>) -> Option<T> {
    match patch {
        Some(value) => value,
        None => current,
    }
}
