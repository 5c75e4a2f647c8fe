//! The in-memory side of a stored session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::Error;
use crate::codec::{deserialize_value, serialize_value};

mod id;
pub use id::Id;

/// A session as handed out by [`SessionStore::get`](crate::SessionStore::get).
///
/// `T` is whatever the application keeps in a session. Its [`Default`] value
/// is the empty session; [`SessionMap`] is used when nothing else is chosen.
#[derive(Clone, Debug, PartialEq)]
pub struct Session<T = SessionMap> {
    id: Id,
    data: T,
    is_new: bool,
}

impl<T: Default> Session<T> {
    /// Creates an empty session for `id` that has not been stored yet.
    pub fn new(id: Id) -> Self {
        Self {
            id,
            data: T::default(),
            is_new: true,
        }
    }

    /// Creates an empty session under a freshly generated id.
    pub fn generate() -> Self {
        Self::new(Id::default())
    }

    /// An empty session for an `id` whose stored payload could not be used.
    pub(crate) fn emptied(id: Id) -> Self {
        Self {
            id,
            data: T::default(),
            is_new: false,
        }
    }
}

impl<T> Session<T> {
    pub(crate) fn stored(id: Id, data: T) -> Self {
        Self {
            id,
            data,
            is_new: false,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// `true` if this session did not come out of the store.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

/// Session data as a map of field names to encoded values.
///
/// Values are encoded on insert and decoded lazily on [`get`](Self::get), so
/// a field of an unexpected type only fails when it is read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMap(HashMap<String, Vec<u8>>);

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value stored under `field`, or `None` if there is none.
    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, Error> {
        self.0
            .get(field)
            .map(|bytes| deserialize_value(bytes))
            .transpose()
    }

    /// Sets `field` to `value`, replacing any previous value.
    ///
    /// Returns `true` if the field did not exist before.
    pub fn insert<T: Serialize + ?Sized>(&mut self, field: &str, value: &T) -> Result<bool, Error> {
        let bytes = serialize_value(value)?;
        Ok(self.0.insert(field.to_string(), bytes).is_none())
    }

    /// Removes `field`. Returns `true` if it was present.
    pub fn remove(&mut self, field: &str) -> bool {
        self.0.remove(field).is_some()
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
