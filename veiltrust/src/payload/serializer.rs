// Handshake payload protobuf serializer / deserializer.
//
// Wire format (proto2, every field length-delimited, wire type 2):
//
//   message NoiseHandshakePayload {
//     bytes identity_key = 1;   // protobuf-encoded PublicKey
//     bytes identity_sig = 2;   // Ed25519 signature over the static key
//     bytes data         = 3;   // optional early / extension data
//   }
//
// Field key = (field_number << 3) | wire_type, as a base-128 varint.
// Unknown fields of wire type 0, 1, 2 and 5 are skipped.

use crate::error::{Result, VeilTrustError};
use crate::payload::NoiseHandshakePayload;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// Maximum encoded size of a u64 varint.
const MAX_VARINT_LEN: usize = 10;

// ── Primitive writers ────────────────────────────────────────────────────

pub(crate) fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_key(buf: &mut Vec<u8>, field: u32, wire_type: u8) {
    put_varint(buf, (u64::from(field) << 3) | u64::from(wire_type));
}

pub(crate) fn put_varint_field(buf: &mut Vec<u8>, field: u32, value: u64) {
    put_key(buf, field, WIRE_VARINT);
    put_varint(buf, value);
}

pub(crate) fn put_bytes_field(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_key(buf, field, WIRE_LEN);
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

// ── Primitive readers ────────────────────────────────────────────────────

fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| VeilTrustError::PayloadDecode("truncated varint".into()))?;
        *pos += 1;
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(VeilTrustError::PayloadDecode("varint longer than 10 bytes".into()))
}

fn read_slice<'a>(data: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(n)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| VeilTrustError::PayloadDecode("unexpected end of data".into()))?;
    let slice = &data[*pos..end];
    *pos = end;
    Ok(slice)
}

/// The value of one decoded protobuf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    /// A fixed 32- or 64-bit value; only ever skipped.
    Fixed,
}

/// Iterator over the `(field_number, value)` pairs of a protobuf message.
/// Borrowed slices live only as long as the input buffer.
pub(crate) struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }

    fn read_field(&mut self) -> Result<(u32, WireValue<'a>)> {
        let key = read_varint(self.data, &mut self.pos)?;
        let field = u32::try_from(key >> 3)
            .ok()
            .filter(|f| *f != 0)
            .ok_or_else(|| VeilTrustError::PayloadDecode(format!("invalid field key {key}")))?;
        let value = match (key & 0x07) as u8 {
            WIRE_VARINT => WireValue::Varint(read_varint(self.data, &mut self.pos)?),
            WIRE_FIXED64 => {
                read_slice(self.data, &mut self.pos, 8)?;
                WireValue::Fixed
            }
            WIRE_LEN => {
                let len = read_varint(self.data, &mut self.pos)?;
                let len = usize::try_from(len)
                    .map_err(|_| VeilTrustError::PayloadDecode("length overflow".into()))?;
                WireValue::Bytes(read_slice(self.data, &mut self.pos, len)?)
            }
            WIRE_FIXED32 => {
                read_slice(self.data, &mut self.pos, 4)?;
                WireValue::Fixed
            }
            other => {
                return Err(VeilTrustError::PayloadDecode(format!(
                    "unsupported wire type {other}"
                )))
            }
        };
        Ok((field, value))
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = Result<(u32, WireValue<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let field = self.read_field();
        self.failed = field.is_err();
        Some(field)
    }
}

// ── Payload ──────────────────────────────────────────────────────────────

/// Serialize a [`NoiseHandshakePayload`] into its protobuf form.
///
/// The `data` field is omitted when empty.
pub fn serialize(payload: &NoiseHandshakePayload) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        payload.identity_key.len() + payload.identity_sig.len() + payload.data.len() + 8,
    );
    put_bytes_field(&mut buf, 1, &payload.identity_key);
    put_bytes_field(&mut buf, 2, &payload.identity_sig);
    if !payload.data.is_empty() {
        put_bytes_field(&mut buf, 3, &payload.data);
    }
    buf
}

/// Deserialize a [`NoiseHandshakePayload`] from its protobuf form.
///
/// `identity_key` and `identity_sig` are required; `data` defaults to empty.
/// When a field repeats, the last occurrence wins.
pub fn deserialize(data: &[u8]) -> Result<NoiseHandshakePayload> {
    let mut identity_key = None;
    let mut identity_sig = None;
    let mut extension = Vec::new();

    for field in FieldReader::new(data) {
        match field? {
            (1, WireValue::Bytes(b)) => identity_key = Some(b.to_vec()),
            (2, WireValue::Bytes(b)) => identity_sig = Some(b.to_vec()),
            (3, WireValue::Bytes(b)) => extension = b.to_vec(),
            (n @ 1..=3, _) => {
                return Err(VeilTrustError::PayloadDecode(format!(
                    "field {n} must be length-delimited"
                )))
            }
            _ => {}
        }
    }

    Ok(NoiseHandshakePayload {
        identity_key: identity_key
            .ok_or(VeilTrustError::PayloadMissingField("identity_key"))?,
        identity_sig: identity_sig
            .ok_or(VeilTrustError::PayloadMissingField("identity_sig"))?,
        data: extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NoiseHandshakePayload {
        NoiseHandshakePayload {
            identity_key: vec![0x08, 0x01, 0x12, 0x01, 0xAA],
            identity_sig: vec![0x55; 64],
            data: b"early".to_vec(),
        }
    }

    #[test]
    fn varint_multi_byte() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 300);
        assert_eq!(buf, [0xAC, 0x02]);
        let mut pos = 0;
        assert_eq!(read_varint(&buf, &mut pos).unwrap(), 300);
        assert_eq!(pos, 2);
    }

    #[test]
    fn roundtrip_with_data() {
        let p = sample();
        assert_eq!(deserialize(&serialize(&p)).unwrap(), p);
    }

    #[test]
    fn absent_data_field_decodes_empty() {
        let p = NoiseHandshakePayload {
            data: Vec::new(),
            ..sample()
        };
        let bytes = serialize(&p);
        // identity_key(2 + 5) + identity_sig(2 + 64), no field 3.
        assert_eq!(bytes.len(), 73);
        assert!(deserialize(&bytes).unwrap().data.is_empty());
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let mut bytes = serialize(&sample());
        put_varint_field(&mut bytes, 7, 99);
        put_bytes_field(&mut bytes, 4, b"extensions");
        bytes.push((9 << 3) | WIRE_FIXED32);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(deserialize(&bytes).unwrap(), sample());
    }

    #[test]
    fn missing_signature_fails() {
        let mut bytes = Vec::new();
        put_bytes_field(&mut bytes, 1, b"key");
        let err = deserialize(&bytes).unwrap_err();
        assert!(matches!(err, VeilTrustError::PayloadMissingField("identity_sig")));
    }

    #[test]
    fn truncated_data_fails() {
        let bytes = serialize(&sample());
        assert!(deserialize(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn wrong_wire_type_for_known_field_fails() {
        let mut bytes = Vec::new();
        put_varint_field(&mut bytes, 1, 5);
        assert!(deserialize(&bytes).is_err());
    }
}
