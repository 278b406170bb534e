//! gatebridge/src/codec.rs
//! Wire encoding: typed command parts, string escaping, and response framing
//! (spec §4.A).

use crate::error::GateError;
use crate::registry::{LocalObject, ProxyRegistry};
use crate::types::{ReferenceKind, TargetId, Value};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;

/// A local value that can appear as an encoded command part: either a
/// scalar, a reference to a proxy this client already holds, or a local
/// object being registered for host callback. Unlike `Value`, this type is
/// never produced by decoding — it is what a caller builds to send.
///
/// There is deliberately no variant for an ordered local sequence (a Rust
/// `Vec<Arg>`): spec §4.A requires that encoding one fail with
/// `UnsupportedLocalType` because this implementation does not support
/// "auto-convert". `Arg::Sequence` exists solely so that failure is
/// reachable and testable; no public constructor builds one from a `Vec`
/// without going through it explicitly.
#[derive(Debug, Clone)]
pub enum Arg {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Proxy(TargetId),
    /// A local object registered as an implementation of one or more host
    /// interfaces (spec design note: "Callback object registration").
    /// Registration happens inside `encode_arg`, which is why `Encode` takes
    /// a `ProxyRegistry` — mirroring spec §4.A's `Encode(value, proxyPool?)`.
    Callback(Arc<dyn LocalObject>),
    /// See the type-level doc comment: always rejected by `encode_arg`.
    Sequence(Vec<Arg>),
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}
impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int32(v)
    }
}
impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        // Route through the same sizing rule encode_arg applies, so a
        // caller building an Arg::Int64 by hand still gets `i` for values
        // that fit in 32 bits (spec §8 "Integer sizing").
        match i32::try_from(v) {
            Ok(small) => Arg::Int32(small),
            Err(_) => Arg::Int64(v),
        }
    }
}
impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Double(v)
    }
}
impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}
impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}
impl From<Vec<u8>> for Arg {
    fn from(b: Vec<u8>) -> Self {
        Arg::Bytes(b)
    }
}
impl From<TargetId> for Arg {
    fn from(t: TargetId) -> Self {
        Arg::Proxy(t)
    }
}

/// Escape a string payload per spec §4.A: literal `\` becomes `\\`, literal
/// newline becomes the two characters `\n`.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse `escape` in a single left-to-right pass. Any other escape
/// sequence (`\` followed by something other than `\` or `n`) is an error.
pub fn unescape(s: &str) -> Result<String, GateError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some(other) => {
                return Err(GateError::ProtocolDecode(format!(
                    "invalid escape sequence \\{other}"
                )));
            }
            None => {
                return Err(GateError::ProtocolDecode(
                    "dangling escape at end of string".to_string(),
                ));
            }
        }
    }
    Ok(out)
}

/// Encode one argument into a single newline-terminated command part. The
/// `registry` is consulted only for `Arg::Callback` — spec §4.A's
/// `Encode(value, proxyPool?)`.
pub fn encode_arg(arg: &Arg, registry: &ProxyRegistry) -> Result<String, GateError> {
    let part = match arg {
        Arg::Null => "n".to_string(),
        Arg::Bool(b) => format!("b{}", if *b { "true" } else { "false" }),
        Arg::Int32(i) => format!("i{i}"),
        // Re-applies the same [-2^31, 2^31-1] sizing rule `encode_integer`
        // uses, so a value built directly as `Arg::Int64` (bypassing that
        // helper and the checked `From<i64>`) still encodes with tag `i`
        // when it fits — spec §8 "Integer sizing" applies to the value, not
        // to which constructor produced it.
        Arg::Int64(i) => match i32::try_from(*i) {
            Ok(small) => format!("i{small}"),
            Err(_) => format!("L{i}"),
        },
        Arg::Double(d) => format!("d{}", format_double(*d)),
        Arg::Str(s) => format!("s{}", escape(s)),
        Arg::Bytes(b) => format!("j{}", BASE64.encode(b)),
        Arg::Proxy(t) => format!("r{t}"),
        Arg::Callback(obj) => {
            let id = registry.register(obj.clone());
            format!("f{id};{}", obj.interfaces().join(";"))
        }
        Arg::Sequence(_) => {
            return Err(GateError::UnsupportedLocalType(
                "ordered local sequences require an auto-convert capability this client does not implement".to_string(),
            ));
        }
    };
    Ok(format!("{part}\n"))
}

/// Canonical textual form for a double: shortest round-tripping decimal,
/// always carrying a decimal point so `1.0` never serializes as `1`.
fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let s = format!("{d}");
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{s}.0")
    }
}

/// Integers outside `i32`'s range but within `i64`'s promote to the `L` tag
/// on encode (spec §4.A, §8 "Integer sizing").
pub fn encode_integer(value: i64) -> Arg {
    match i32::try_from(value) {
        Ok(small) => Arg::Int32(small),
        Err(_) => Arg::Int64(value),
    }
}

/// Decode one response line per spec §4.A. Strips an optional leading `!`,
/// dispatches on the first byte, and for `x`/`z` raises the corresponding
/// error directly rather than returning a value — those codes are never a
/// "successful decode" the caller can use as a value.
///
/// `GateError::HostInvocation::host_exception` is left `None` here: this
/// function has no `Client` to wrap a reference payload into a usable proxy
/// (spec's `Decode(line, client)` takes a client for exactly that reason).
/// `Client::dispatch` fills it in after calling this function, by running
/// the same payload back through `decode_value` and wrapping any resulting
/// reference.
pub fn decode_response(line: &str) -> Result<Value, GateError> {
    if line.is_empty() {
        return Err(GateError::Network("empty response".to_string()));
    }
    let line = line.strip_prefix('!').unwrap_or(line);
    let mut chars = line.chars();
    let code = chars
        .next()
        .ok_or_else(|| GateError::Network("empty response".to_string()))?;
    let rest = chars.as_str();

    match code {
        'y' => decode_value(rest),
        'x' => Err(GateError::HostInvocation {
            payload: rest.to_string(),
            host_exception: None,
        }),
        'z' => Err(GateError::FatalProtocol(rest.to_string())),
        other => Err(GateError::ProtocolFraming(format!(
            "unexpected response code '{other}'"
        ))),
    }
}

/// Decode a tagged value payload (the part after the `y`/`x` response code)
/// per the tag-dispatch table in spec §4.A. `Reference` and `LocalProxy`
/// variants carry only the raw id/kind here; turning them into a usable
/// proxy or local object happens in `Client::materialize`, which has access
/// to the client handle and proxy pool that this pure function does not.
pub fn decode_value(payload: &str) -> Result<Value, GateError> {
    let mut chars = payload.chars();
    let tag = chars
        .next()
        .ok_or_else(|| GateError::ProtocolDecode("empty value payload".to_string()))?;
    let rest = chars.as_str();

    match tag {
        'v' | 'n' => Ok(Value::Null),
        'b' => Ok(Value::Bool(rest.eq_ignore_ascii_case("true"))),
        'i' => rest
            .parse::<i32>()
            .map(Value::Int32)
            .map_err(|e| GateError::ProtocolDecode(format!("bad int32 payload: {e}"))),
        'L' => rest
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| GateError::ProtocolDecode(format!("bad int64 payload: {e}"))),
        'd' => rest
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| GateError::ProtocolDecode(format!("bad double payload: {e}"))),
        'D' => Ok(Value::Decimal(rest.to_string())),
        's' => unescape(rest).map(Value::String),
        'j' => BASE64
            .decode(rest)
            .map(Value::Bytes)
            .map_err(|e| GateError::ProtocolDecode(format!("bad base64 payload: {e}"))),
        'r' | 'l' | 'h' | 'a' | 't' | 'g' => {
            let kind = ReferenceKind::from_tag(tag)
                .expect("tag already matched against the reference-kind arms");
            Ok(Value::Reference {
                target_id: TargetId::instance(rest),
                kind,
            })
        }
        'f' => Ok(Value::LocalProxy {
            id: rest.to_string(),
        }),
        other => Err(GateError::ProtocolDecode(format!(
            "unrecognized type tag '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_then_unescape_is_identity() {
        for s in ["plain", "back\\slash", "line\nbreak", "both\\\n", ""] {
            assert_eq!(unescape(&escape(s)).unwrap(), s);
        }
    }

    #[test]
    fn escape_is_injective_for_distinct_inputs() {
        assert_ne!(escape("a\\b"), escape("a\nb"));
        assert_ne!(escape("\\n"), escape("\n"));
    }

    #[test]
    fn unescape_rejects_unknown_sequence() {
        assert!(unescape("\\q").is_err());
        assert!(unescape("trailing\\").is_err());
    }

    #[test]
    fn int32_range_encodes_with_i_tag() {
        let registry = ProxyRegistry::new();
        assert_eq!(
            encode_arg(&Arg::Int32(i32::MAX), &registry).unwrap(),
            "i2147483647\n"
        );
        assert_eq!(
            encode_arg(&encode_integer(5), &registry).unwrap(),
            encode_arg(&Arg::Int32(5), &registry).unwrap()
        );
    }

    #[test]
    fn int64_variant_with_in_range_value_still_encodes_with_i_tag() {
        let registry = ProxyRegistry::new();
        assert_eq!(encode_arg(&Arg::Int64(5), &registry).unwrap(), "i5\n");
    }

    #[test]
    fn out_of_i32_range_encodes_with_l_tag() {
        let registry = ProxyRegistry::new();
        let value = i64::from(i32::MAX) + 1;
        match encode_integer(value) {
            Arg::Int64(v) => assert_eq!(v, value),
            other => panic!("expected Int64, got {other:?}"),
        }
        assert_eq!(
            encode_arg(&encode_integer(value), &registry).unwrap(),
            "L2147483648\n"
        );
    }

    #[test]
    fn sequence_is_unsupported() {
        let registry = ProxyRegistry::new();
        let err = encode_arg(&Arg::Sequence(vec![Arg::Int32(1)]), &registry).unwrap_err();
        assert!(matches!(err, GateError::UnsupportedLocalType(_)));
    }

    #[test]
    fn decode_scalar_tags() {
        assert_eq!(decode_value("n").unwrap(), Value::Null);
        assert_eq!(decode_value("v").unwrap(), Value::Null);
        assert_eq!(decode_value("btrue").unwrap(), Value::Bool(true));
        assert_eq!(decode_value("bfalse").unwrap(), Value::Bool(false));
        assert_eq!(decode_value("i42").unwrap(), Value::Int32(42));
        assert_eq!(decode_value("L9999999999").unwrap(), Value::Int64(9999999999));
        assert_eq!(
            decode_value("d3.141592653589793").unwrap(),
            Value::Double(std::f64::consts::PI)
        );
        assert_eq!(
            decode_value("D123456789012345678901234567890").unwrap(),
            Value::Decimal("123456789012345678901234567890".to_string())
        );
        assert_eq!(
            decode_value("shi\\nthere").unwrap(),
            Value::String("hi\nthere".to_string())
        );
    }

    #[test]
    fn decode_bytes_uses_standard_base64() {
        let encoded = BASE64.encode(b"hello");
        assert_eq!(
            decode_value(&format!("j{encoded}")).unwrap(),
            Value::Bytes(b"hello".to_vec())
        );
    }

    #[test]
    fn decode_reference_tags_preserve_kind() {
        assert_eq!(
            decode_value("ro5").unwrap(),
            Value::Reference {
                target_id: TargetId::instance("o5"),
                kind: ReferenceKind::Object
            }
        );
        assert_eq!(
            decode_value("lo9").unwrap(),
            Value::Reference {
                target_id: TargetId::instance("o9"),
                kind: ReferenceKind::List
            }
        );
    }

    #[test]
    fn decode_unknown_tag_is_protocol_decode_error() {
        assert!(matches!(
            decode_value("?nope"),
            Err(GateError::ProtocolDecode(_))
        ));
    }

    #[test]
    fn decode_response_success_strips_leading_bang() {
        assert_eq!(decode_response("!yi7").unwrap(), Value::Int32(7));
        assert_eq!(decode_response("yi7").unwrap(), Value::Int32(7));
    }

    #[test]
    fn decode_response_error_code_raises_host_invocation() {
        let err = decode_response("!xro0").unwrap_err();
        match err {
            GateError::HostInvocation {
                payload,
                host_exception,
            } => {
                assert_eq!(payload, "ro0");
                assert!(host_exception.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_response_fatal_code_raises_fatal_protocol() {
        assert!(matches!(
            decode_response("!zboom"),
            Err(GateError::FatalProtocol(_))
        ));
    }

    #[test]
    fn decode_response_unknown_code_is_framing_error() {
        assert!(matches!(
            decode_response("qwhat"),
            Err(GateError::ProtocolFraming(_))
        ));
    }

    #[test]
    fn decode_response_empty_is_network_error() {
        assert!(matches!(decode_response(""), Err(GateError::Network(_))));
    }
}
