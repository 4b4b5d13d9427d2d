use serde_json::{Map, Value};

/// An opaque structured record flowing through a cursor or stage.
///
/// No schema is imposed. Backends decide what the fields mean.
pub type Item = Value;

/// Reserved key of the removal envelope used by JSON producers.
pub const REMOVE_MARKER: &str = "$remove";

/// A request arriving at the write side of a cursor.
///
/// Exactly one backend hook handles each op: `Save` goes to `save`,
/// `Remove` goes to `remove_item` with the unwrapped item.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Save(Item),
    Remove(Item),
}

impl WriteOp {
    /// Borrow the carried item.
    pub fn item(&self) -> &Item {
        match self {
            Self::Save(item) | Self::Remove(item) => item,
        }
    }

    /// Take the carried item.
    pub fn into_item(self) -> Item {
        match self {
            Self::Save(item) | Self::Remove(item) => item,
        }
    }

    /// Returns `true` for a removal request.
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove(_))
    }

    /// Decode the marker convention: an object whose `$remove` field is
    /// present and not `null` is a removal of that field's value. Anything
    /// else is saved as-is.
    pub fn from_envelope(value: Value) -> Self {
        match value {
            Value::Object(mut map) => match map.remove(REMOVE_MARKER) {
                Some(inner) if !inner.is_null() => Self::Remove(inner),
                Some(marker) => {
                    map.insert(REMOVE_MARKER.to_string(), marker);
                    Self::Save(Value::Object(map))
                }
                None => Self::Save(Value::Object(map)),
            },
            other => Self::Save(other),
        }
    }

    /// Encode for producers that speak the marker convention.
    pub fn into_envelope(self) -> Value {
        match self {
            Self::Save(item) => item,
            Self::Remove(item) => {
                let mut map = Map::with_capacity(1);
                map.insert(REMOVE_MARKER.to_string(), item);
                Value::Object(map)
            }
        }
    }
}

impl From<Item> for WriteOp {
    fn from(item: Item) -> Self {
        Self::Save(item)
    }
}
