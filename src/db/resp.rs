//! RESP (REdis Serialization Protocol) framing.
//!
//! Requests are arrays of bulk strings. Replies may be any RESP2 type,
//! including the null bulk string (`$-1`) and null array (`*-1`).

use std::io::{BufRead, Read};

use crate::error::{LibrarianError, Result};

/// Nesting limit for array replies.
const MAX_DEPTH: usize = 16;

/// Largest bulk string accepted from the server, 512 MiB.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Bulk(None) | RespValue::Array(None))
    }

    /// Text form of simple and bulk strings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RespValue::Simple(s) => Some(s.clone()),
            RespValue::Bulk(Some(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(Some(items)) => Some(items),
            _ => None,
        }
    }
}

/// Encode a command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

fn protocol(message: impl Into<String>) -> LibrarianError {
    LibrarianError::Protocol(message.into())
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(LibrarianError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by server",
        )));
    }
    if !line.ends_with(b"\r\n") {
        return Err(protocol("reply line not terminated by CRLF"));
    }
    line.truncate(line.len() - 2);
    String::from_utf8(line).map_err(|_| protocol("reply line is not UTF-8"))
}

fn parse_len(text: &str) -> Result<i64> {
    text.parse::<i64>()
        .map_err(|_| protocol(format!("invalid length '{}'", text)))
}

/// Read one complete reply.
pub fn read_value<R: BufRead>(reader: &mut R) -> Result<RespValue> {
    read_nested(reader, 0)
}

fn read_nested<R: BufRead>(reader: &mut R, depth: usize) -> Result<RespValue> {
    if depth > MAX_DEPTH {
        return Err(protocol("reply nested too deeply"));
    }
    let line = read_line(reader)?;
    let mut chars = line.chars();
    let kind = chars.next();
    let rest = chars.as_str();
    match kind {
        Some('+') => Ok(RespValue::Simple(rest.to_string())),
        Some('-') => Ok(RespValue::Error(rest.to_string())),
        Some(':') => rest
            .parse::<i64>()
            .map(RespValue::Integer)
            .map_err(|_| protocol(format!("invalid integer '{}'", rest))),
        Some('$') => {
            let len = parse_len(rest)?;
            if len < 0 {
                return Ok(RespValue::Bulk(None));
            }
            if len > MAX_BULK_LEN {
                return Err(protocol(format!(
                    "bulk string of {} bytes exceeds limit of {}",
                    len, MAX_BULK_LEN
                )));
            }
            let mut buf = vec![0u8; len as usize + 2];
            reader.read_exact(&mut buf)?;
            if !buf.ends_with(b"\r\n") {
                return Err(protocol("bulk string not terminated by CRLF"));
            }
            buf.truncate(len as usize);
            Ok(RespValue::Bulk(Some(buf)))
        }
        Some('*') => {
            let len = parse_len(rest)?;
            if len < 0 {
                return Ok(RespValue::Array(None));
            }
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                items.push(read_nested(reader, depth + 1)?);
            }
            Ok(RespValue::Array(Some(items)))
        }
        Some(other) => Err(protocol(format!("unknown reply type '{}'", other))),
        None => Err(protocol("empty reply line")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(bytes: &[u8]) -> Result<RespValue> {
        read_value(&mut Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn test_encode_command() {
        let bytes = encode_command(&[b"GRAPH.QUERY".as_slice(), b"g".as_slice(), b"RETURN 1".as_slice()]);
        assert_eq!(
            bytes,
            b"*3\r\n$11\r\nGRAPH.QUERY\r\n$1\r\ng\r\n$8\r\nRETURN 1\r\n".to_vec()
        );
    }

    #[test]
    fn test_scalar_replies() {
        assert_eq!(parse(b"+OK\r\n").unwrap(), RespValue::Simple("OK".into()));
        assert_eq!(
            parse(b"-ERR bad\r\n").unwrap(),
            RespValue::Error("ERR bad".into())
        );
        assert_eq!(parse(b":-42\r\n").unwrap(), RespValue::Integer(-42));
        assert_eq!(
            parse(b"$5\r\nhe\r\no\r\n").unwrap(),
            RespValue::Bulk(Some(b"he\r\no".to_vec()))
        );
    }

    #[test]
    fn test_null_forms() {
        assert!(parse(b"$-1\r\n").unwrap().is_null());
        assert!(parse(b"*-1\r\n").unwrap().is_null());
    }

    #[test]
    fn test_nested_array() {
        let value = parse(b"*2\r\n*1\r\n$1\r\na\r\n:3\r\n").unwrap();
        assert_eq!(
            value,
            RespValue::Array(Some(vec![
                RespValue::Array(Some(vec![RespValue::Bulk(Some(b"a".to_vec()))])),
                RespValue::Integer(3),
            ]))
        );
    }

    #[test]
    fn test_malformed_replies_are_protocol_errors() {
        assert!(matches!(parse(b"?x\r\n"), Err(LibrarianError::Protocol(_))));
        assert!(matches!(parse(b":abc\r\n"), Err(LibrarianError::Protocol(_))));
        assert!(matches!(parse(b"+OK\n"), Err(LibrarianError::Protocol(_))));
    }

    #[test]
    fn test_oversized_bulk_is_rejected_before_allocating() {
        let reply = format!("${}\r\n", MAX_BULK_LEN + 1);
        match parse(reply.as_bytes()) {
            Err(LibrarianError::Protocol(msg)) => assert!(msg.contains("exceeds limit")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            parse(b"$9223372036854775807\r\n"),
            Err(LibrarianError::Protocol(_))
        ));
    }

    #[test]
    fn test_truncated_reply_is_io_error() {
        assert!(matches!(parse(b""), Err(LibrarianError::Io(_))));
        assert!(matches!(parse(b"$10\r\nabc"), Err(LibrarianError::Io(_))));
    }
}
