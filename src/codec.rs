use crate::Error;
use serde::{Serialize, de::DeserializeOwned};

/// Turns in-memory session data into the opaque payload kept by a
/// [`RecordStore`](crate::store::RecordStore), and back.
///
/// `decode` failures never reach callers of
/// [`SessionStore::get`](crate::SessionStore::get); they are logged and the
/// session comes back empty.
pub trait Codec: Send + Sync + 'static {
    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Serialize + ?Sized;

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned;
}

/// The codec selected by the crate features: MessagePack when
/// `messagepack` is enabled, bincode otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCodec;

impl Codec for DefaultCodec {
    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Serialize + ?Sized,
    {
        serialize_value(value)
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        deserialize_value(bytes)
    }
}

#[cfg(feature = "messagepack")]
pub(crate) fn serialize_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    rmp_serde::to_vec(value).map_err(|e| Error::Encode(e.to_string()))
}

#[cfg(feature = "messagepack")]
pub(crate) fn deserialize_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    rmp_serde::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(all(feature = "bincode", not(feature = "messagepack")))]
pub(crate) fn serialize_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::Encode(e.to_string()))
}

#[cfg(all(feature = "bincode", not(feature = "messagepack")))]
pub(crate) fn deserialize_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    let (value, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| Error::Decode(e.to_string()))?;
    if read != bytes.len() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after payload",
            bytes.len() - read
        )));
    }
    Ok(value)
}
