//! Execution statistics returned alongside results in explain/analyze mode.

use once_cell::sync::OnceCell;

use crate::error::{ClientError, ClientResult};
use crate::protocol::{AnyPayload, ExplainStatsPayload};

/// Type URL of payloads carrying a single UTF-8 string.
pub const STRING_VALUE_TYPE: &str = "type.googleapis.com/google.protobuf.StringValue";

#[derive(Debug, Clone)]
pub struct ExplainStats {
    payload: ExplainStatsPayload,
    text: OnceCell<String>,
}

impl ExplainStats {
    pub fn new(payload: ExplainStatsPayload) -> Self {
        Self {
            payload,
            text: OnceCell::new(),
        }
    }

    fn data(&self) -> ClientResult<&AnyPayload> {
        self.payload
            .data
            .as_ref()
            .ok_or_else(|| ClientError::Decode("explain stats carry no payload".to_string()))
    }

    pub fn type_url(&self) -> Option<&str> {
        self.payload.data.as_ref().map(|d| d.type_url.as_str())
    }

    /// The undecoded payload.
    pub fn raw_data(&self) -> ClientResult<&AnyPayload> {
        self.data()
    }

    /// Payload decoded as text. Only string payloads have a text form.
    pub fn text(&self) -> ClientResult<&str> {
        let data = self.data()?;
        if data.type_url != STRING_VALUE_TYPE {
            return Err(ClientError::Decode(format!(
                "explain stats requested as text ({}), but the payload is {}",
                STRING_VALUE_TYPE, data.type_url
            )));
        }
        self.text
            .get_or_try_init(|| decode_string_value(&data.value))
            .map(String::as_str)
    }

    /// Text payload parsed as JSON.
    pub fn json(&self) -> ClientResult<serde_json::Value> {
        let text = self.text()?;
        serde_json::from_str(text)
            .map_err(|e| ClientError::Decode(format!("explain stats are not valid JSON: {}", e)))
    }
}

/// Decodes a serialized string wrapper: field 1, length-delimited, UTF-8.
fn decode_string_value(bytes: &[u8]) -> ClientResult<String> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    if bytes[0] != 0x0A {
        return Err(ClientError::Decode(format!(
            "unexpected tag 0x{:02X} in string payload",
            bytes[0]
        )));
    }

    let (len, consumed) = read_varint(&bytes[1..])?;
    let start = 1 + consumed;
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| ClientError::Decode("truncated string payload".to_string()))?;

    String::from_utf8(bytes[start..end].to_vec())
        .map_err(|e| ClientError::Decode(format!("string payload is not UTF-8: {}", e)))
}

fn read_varint(bytes: &[u8]) -> ClientResult<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(ClientError::Decode("malformed length in string payload".to_string()))
}

/// Encodes text as a string wrapper payload.
pub fn encode_string_value(text: &str) -> AnyPayload {
    let mut value = vec![0x0A];
    let mut len = text.len() as u64;
    loop {
        let byte = (len & 0x7F) as u8;
        len >>= 7;
        if len == 0 {
            value.push(byte);
            break;
        }
        value.push(byte | 0x80);
    }
    value.extend_from_slice(text.as_bytes());
    AnyPayload {
        type_url: STRING_VALUE_TYPE.to_string(),
        value,
    }
}
