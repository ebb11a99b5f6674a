//! Response envelope
//!
//! The backend wraps every payload as
//! `{ status|success: bool, code, data, total?, message?, errors? }`.
//! Older endpoints name the boolean `success`, newer ones `status`; both are
//! folded into `Envelope::success` here so nothing past this boundary has to
//! care. A missing flag counts as failure.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{BUSINESS_MESSAGE, Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub success: bool,
    pub code: Option<u16>,
    pub data: Value,
    pub total: Option<u64>,
    pub message: Option<String>,
    pub errors: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct WireEnvelope {
    status: Option<Value>,
    success: Option<Value>,
    code: Option<u16>,
    #[serde(default)]
    data: Value,
    total: Option<u64>,
    message: Option<String>,
    errors: Option<Map<String, Value>>,
}

impl Envelope {
    /// Read an envelope from a decoded response body.
    ///
    /// `status` wins when both flags are present and boolean. A numeric
    /// `status` (an HTTP code echoed by some endpoints) is not a flag.
    pub fn from_value(body: Value) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_value(body)
            .map_err(|e| Error::Decode(format!("invalid response envelope: {e}")))?;

        let success = wire
            .status
            .as_ref()
            .and_then(Value::as_bool)
            .or_else(|| wire.success.as_ref().and_then(Value::as_bool))
            .unwrap_or(false);

        Ok(Self {
            success,
            code: wire.code,
            data: wire.data,
            total: wire.total,
            message: wire.message.filter(|m| !m.trim().is_empty()),
            errors: wire.errors,
        })
    }

    /// Fail with `Error::Business` unless the success flag is set.
    pub fn ensure_success(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::Business(
                self.message.unwrap_or_else(|| BUSINESS_MESSAGE.into()),
            ))
        }
    }

    /// Deserialize `data` into the caller's type. A missing `data` is read
    /// as `null`, so `Option<T>`, `()` and `Value` accept it.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.data)
            .map_err(|e| Error::Decode(format!("unexpected response data: {e}")))
    }
}

/// One page of a listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total row count reported by the backend; the item count when absent
    pub total: u64,
}

impl<T: DeserializeOwned> Page<T> {
    pub(crate) fn from_envelope(envelope: &Envelope) -> Result<Self> {
        let items: Vec<T> = match envelope.data {
            Value::Null => Vec::new(),
            _ => envelope.data_as()?,
        };
        let total = envelope.total.unwrap_or(items.len() as u64);
        Ok(Self { items, total })
    }
}
