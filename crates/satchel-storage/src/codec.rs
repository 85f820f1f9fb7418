//! State codecs
//!
//! A session persists its whole state bag as one string. The codec decides
//! what that string looks like. Decoding is strict: stored text is parsed,
//! never evaluated.

use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::Result;

/// Key/value state as it is held in memory and handed to a codec.
pub type StateBag = Map<String, Value>;

pub trait Codec: Send + Sync {
    fn encode(&self, bag: &StateBag) -> Result<String>;

    fn decode(&self, raw: &str) -> Result<StateBag>;
}

/// JSON object codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, bag: &StateBag) -> Result<String> {
        Ok(serde_json::to_string(bag)?)
    }

    fn decode(&self, raw: &str) -> Result<StateBag> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(bag) => Ok(bag),
            other => Err(StorageError::Codec(format!(
                "expected a JSON object, found {}",
                json_type_name(&other)
            ))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
