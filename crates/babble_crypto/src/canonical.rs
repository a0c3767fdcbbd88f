//! Canonical JSON encoding.
//!
//! Signed documents must be reproducible byte-for-byte by any peer, so we do
//! not rely on a serializer's defaults. The encoding is:
//!   - object keys sorted by their UTF-8 bytes,
//!   - `,` and `:` separators with no whitespace,
//!   - ASCII-only output: non-ASCII characters become `\uXXXX` escapes
//!     (UTF-16 surrogate pairs above the BMP),
//!   - integers only; floating point numbers are rejected.
//!
//! This matches `json.dumps(v, sort_keys=True, separators=(",", ":"))`,
//! which is what the rest of the network signs.

use serde::Serialize;
use serde_json::Value;

use crate::error::CryptoError;

pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CryptoError> {
    Ok(to_string(value)?.into_bytes())
}

pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    let value = serde_json::to_value(value)?;
    let mut out = String::new();
    write_value(&value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut String) -> Result<(), CryptoError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(CryptoError::NonCanonical(format!(
                    "floating point number {n}"
                )));
            }
            out.push_str(&n.to_string());
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
