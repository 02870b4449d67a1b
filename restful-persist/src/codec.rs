//! Value transforms applied between a field and its stored form.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::PersistResult;

/// Converts a field value to and from its stored JSON form.
///
/// Decoding may be asynchronous, e.g. when a stored descriptor has to be
/// turned back into a live object that restores its own state.
#[async_trait]
pub trait Codec<T>: Send + Sync {
    async fn encode(&self, value: &T) -> PersistResult<Value>;

    async fn decode(&self, stored: Value) -> PersistResult<T>;
}

/// Stores values through their serde representation.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

#[async_trait]
impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn encode(&self, value: &T) -> PersistResult<Value> {
        Ok(serde_json::to_value(value)?)
    }

    async fn decode(&self, stored: Value) -> PersistResult<T> {
        Ok(serde_json::from_value(stored)?)
    }
}

/// Codec built from a pair of synchronous closures.
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D> {
    pub fn new<T>(encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> PersistResult<Value>,
        D: Fn(Value) -> PersistResult<T>,
    {
        Self { encode, decode }
    }
}

impl<E, D> fmt::Debug for FnCodec<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCodec")
    }
}

#[async_trait]
impl<T, E, D> Codec<T> for FnCodec<E, D>
where
    T: Send + Sync + 'static,
    E: Fn(&T) -> PersistResult<Value> + Send + Sync,
    D: Fn(Value) -> PersistResult<T> + Send + Sync,
{
    async fn encode(&self, value: &T) -> PersistResult<Value> {
        (self.encode)(value)
    }

    async fn decode(&self, stored: Value) -> PersistResult<T> {
        (self.decode)(stored)
    }
}
