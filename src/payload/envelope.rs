use serde_json::{Map, Value};

use super::codec;
use crate::errors::Error;

/// Request body field carrying the encoded payload.
pub const REQUEST_FIELD: &str = "encPayload";
/// Response body field carrying the encoded result.
pub const RESPONSE_FIELD: &str = "encPayloadRes";
/// Header telling the server the body is enveloped.
pub const ENCODING_HEADER: &str = "x-payload-encoded";

/// An object that already carries [`REQUEST_FIELD`] is never encoded again.
pub fn is_sealed(body: &Value) -> bool {
    body.as_object()
        .is_some_and(|fields| fields.contains_key(REQUEST_FIELD))
}

pub fn seal(body: &Value) -> Result<Value, Error> {
    let mut fields = Map::with_capacity(1);
    fields.insert(REQUEST_FIELD.to_string(), Value::String(codec::encode(body)?));
    Ok(Value::Object(fields))
}

/// Replaces an enveloped response with its decoded payload; other bodies pass through.
pub fn open_response(body: Value) -> Result<Value, Error> {
    match body.get(RESPONSE_FIELD) {
        Some(Value::String(encoded)) => codec::decode(encoded),
        _ => Ok(body),
    }
}
