use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{ProtoError, Result};
use crate::message::{Message, MessageKind, MAX_TID};

/// Outbound wire shape. Keys are single letters:
/// `t` kind, `i` tid, `c` channel, `u` metadata, `d` payload, `e` error/reason.
#[derive(Serialize)]
struct WireOut<'a> {
    t: u8,
    i: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    c: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    u: Option<&'a Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<&'a Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    e: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireIn {
    t: u8,
    i: u64,
    #[serde(default)]
    c: Option<u64>,
    #[serde(default)]
    u: Option<Bytes>,
    #[serde(default)]
    d: Option<Bytes>,
    #[serde(default)]
    e: Option<String>,
}

/// Encode a message into one transport payload.
pub fn encode_message(msg: &Message) -> Result<Bytes> {
    let (t, i) = (msg.kind() as u8, msg.tid());
    let wire = match msg {
        Message::Ack { .. } => WireOut {
            t,
            i,
            c: None,
            u: None,
            d: None,
            e: None,
        },
        Message::Nack { error, .. } => WireOut {
            t,
            i,
            c: None,
            u: None,
            d: None,
            e: Some(error),
        },
        Message::Create {
            channel, metadata, ..
        } => WireOut {
            t,
            i,
            c: Some(*channel),
            u: Some(metadata),
            d: None,
            e: None,
        },
        Message::Data {
            channel, payload, ..
        } => WireOut {
            t,
            i,
            c: Some(*channel),
            u: None,
            d: payload.as_ref(),
            e: None,
        },
        Message::Close {
            channel, reason, ..
        } => WireOut {
            t,
            i,
            c: Some(*channel),
            u: None,
            d: None,
            e: reason.as_deref(),
        },
    };

    let mut writer = BytesMut::with_capacity(32).writer();
    ciborium::into_writer(&wire, &mut writer).map_err(|err| ProtoError::Encode(err.to_string()))?;
    Ok(writer.into_inner().freeze())
}

/// Decode one transport payload into a message.
pub fn decode_message(payload: &[u8]) -> Result<Message> {
    let wire: WireIn =
        ciborium::from_reader(payload).map_err(|err| ProtoError::Decode(err.to_string()))?;

    let kind = MessageKind::from_u8(wire.t).ok_or(ProtoError::UnknownKind(wire.t))?;
    if wire.i > MAX_TID {
        return Err(ProtoError::TidOutOfRange(wire.i));
    }
    let tid = wire.i;

    let channel = || {
        wire.c.ok_or(ProtoError::MissingField {
            kind: kind.name(),
            field: "c",
        })
    };

    let msg = match kind {
        MessageKind::Ack => Message::Ack { tid },
        MessageKind::Nack => Message::Nack {
            tid,
            error: wire.e.clone().ok_or(ProtoError::MissingField {
                kind: kind.name(),
                field: "e",
            })?,
        },
        MessageKind::Create => Message::Create {
            tid,
            channel: channel()?,
            metadata: wire.u.clone().unwrap_or_default(),
        },
        MessageKind::Data => Message::Data {
            tid,
            channel: channel()?,
            payload: wire.d.clone(),
        },
        MessageKind::Close => Message::Close {
            tid,
            channel: channel()?,
            reason: wire.e.clone(),
        },
    };

    Ok(msg)
}

#[cfg(test)]
mod tests {
    use ciborium::Value;

    use super::*;

    fn cbor(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        ciborium::into_writer(value, &mut out).unwrap();
        out
    }

    fn text(key: &str) -> Value {
        Value::Text(key.to_string())
    }

    #[test]
    fn end_of_stream_differs_from_empty_payload() {
        let eos = Message::Data {
            tid: 1,
            channel: 2,
            payload: None,
        };
        let empty = Message::Data {
            tid: 1,
            channel: 2,
            payload: Some(Bytes::new()),
        };

        let eos_wire = encode_message(&eos).unwrap();
        let empty_wire = encode_message(&empty).unwrap();
        assert_ne!(eos_wire, empty_wire);

        assert_eq!(decode_message(&eos_wire).unwrap(), eos);
        assert_eq!(decode_message(&empty_wire).unwrap(), empty);
    }

    #[test]
    fn explicit_null_payload_is_end_of_stream() {
        let wire = cbor(&Value::Map(vec![
            (text("t"), Value::Integer(3u8.into())),
            (text("i"), Value::Integer(9u8.into())),
            (text("c"), Value::Integer(4u8.into())),
            (text("d"), Value::Null),
        ]));

        let msg = decode_message(&wire).unwrap();
        assert_eq!(
            msg,
            Message::Data {
                tid: 9,
                channel: 4,
                payload: None
            }
        );
    }

    #[test]
    fn create_metadata_is_opaque() {
        let metadata = Bytes::from_static(br#"{"name":"x"}"#);
        let msg = Message::Create {
            tid: 6,
            channel: 0,
            metadata: metadata.clone(),
        };

        let decoded = decode_message(&encode_message(&msg).unwrap()).unwrap();
        assert!(matches!(decoded, Message::Create { metadata: m, .. } if m == metadata));
    }

    #[test]
    fn close_reason_survives() {
        let clean = Message::Close {
            tid: 2,
            channel: 8,
            reason: None,
        };
        let failed = Message::Close {
            tid: 3,
            channel: 8,
            reason: Some("boom".to_string()),
        };

        assert_eq!(decode_message(&encode_message(&clean).unwrap()).unwrap(), clean);
        assert_eq!(decode_message(&encode_message(&failed).unwrap()).unwrap(), failed);
    }

    #[test]
    fn nack_requires_error_text() {
        let wire = cbor(&Value::Map(vec![
            (text("t"), Value::Integer(1u8.into())),
            (text("i"), Value::Integer(5u8.into())),
        ]));

        let err = decode_message(&wire).unwrap_err();
        assert!(matches!(
            err,
            ProtoError::MissingField {
                kind: "nack",
                field: "e"
            }
        ));
    }

    #[test]
    fn data_requires_channel() {
        let wire = cbor(&Value::Map(vec![
            (text("t"), Value::Integer(3u8.into())),
            (text("i"), Value::Integer(5u8.into())),
            (text("d"), Value::Bytes(vec![1, 2])),
        ]));

        let err = decode_message(&wire).unwrap_err();
        assert!(matches!(err, ProtoError::MissingField { field: "c", .. }));
    }

    #[test]
    fn unknown_kind_rejected() {
        let wire = cbor(&Value::Map(vec![
            (text("t"), Value::Integer(7u8.into())),
            (text("i"), Value::Integer(1u8.into())),
        ]));

        assert!(matches!(
            decode_message(&wire),
            Err(ProtoError::UnknownKind(7))
        ));
    }

    #[test]
    fn tid_beyond_53_bits_rejected() {
        let wire = cbor(&Value::Map(vec![
            (text("t"), Value::Integer(0u8.into())),
            (text("i"), Value::Integer((MAX_TID + 1).into())),
        ]));

        assert!(matches!(
            decode_message(&wire),
            Err(ProtoError::TidOutOfRange(_))
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            decode_message(&[0xFF, 0x00, 0x13]),
            Err(ProtoError::Decode(_))
        ));
        assert!(matches!(decode_message(&[]), Err(ProtoError::Decode(_))));
    }

    #[test]
    fn unknown_keys_ignored() {
        let wire = cbor(&Value::Map(vec![
            (text("t"), Value::Integer(0u8.into())),
            (text("i"), Value::Integer(12u8.into())),
            (text("x"), Value::Bool(true)),
        ]));

        assert_eq!(decode_message(&wire).unwrap(), Message::ack(12));
    }
}
