//! Byte-level HTTP/1.1 request parsing and response serialization.
//!
//! # Wire format
//! ```text
//! VERB SP PATH SP VERSION CRLF
//! name: value CRLF        (repeated)
//! CRLF
//! ```
//!
//! Every line is read with a hard byte ceiling, so a hostile peer can
//! neither make a line grow without bound nor hold the parser on a line
//! that never ends. The body is left on the stream.

use std::io::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::error::{HttpError, WriteError};
use crate::http::header::{HeaderKind, HeaderStore};
use crate::http::request::RequestHead;
use crate::http::response::{Body, BodyPart, ResponseHead};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const CRLF: &[u8] = b"\r\n";

/// Read one CRLF-terminated line, without the terminator.
///
/// Fails if the line (terminator included) exceeds `max_bytes`, if a CR is
/// followed by anything but LF, or if the stream ends first.
pub async fn read_line<R>(reader: &mut R, max_bytes: usize) -> Result<String, HttpError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut line = Vec::with_capacity(128);
    let mut seen = 0usize;
    let mut saw_cr = false;

    loop {
        let (used, outcome) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Err(HttpError::UnexpectedEof);
            }

            let mut used = 0;
            let mut outcome = None;
            for &byte in available {
                used += 1;
                seen += 1;
                if seen > max_bytes {
                    outcome = Some(Err(HttpError::LineTooLong(max_bytes)));
                    break;
                }
                if saw_cr {
                    outcome = Some(if byte == LF {
                        Ok(())
                    } else {
                        Err(HttpError::MissingLf)
                    });
                    break;
                }
                if byte == CR {
                    saw_cr = true;
                } else {
                    line.push(byte);
                }
            }
            (used, outcome)
        };
        reader.consume(used);

        match outcome {
            Some(Ok(())) => return Ok(String::from_utf8_lossy(&line).into_owned()),
            Some(Err(e)) => return Err(e),
            None => continue,
        }
    }
}

/// Parse `VERB SP PATH SP VERSION`.
fn parse_request_line(line: &str) -> Result<(String, String, String), HttpError> {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(verb), Some(path), Some(version))
            if !verb.is_empty() && !path.is_empty() && !version.is_empty() =>
        {
            Ok((
                verb.to_ascii_uppercase(),
                path.to_string(),
                version.trim().to_string(),
            ))
        }
        _ => Err(HttpError::MalformedRequestLine(line.to_string())),
    }
}

/// Split a header line on its first colon. The name is lowercased and a
/// single space after the colon is skipped.
fn parse_header_line(line: &str) -> Result<(String, String), HttpError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| HttpError::MalformedHeader(line.to_string()))?;
    if name.is_empty() {
        return Err(HttpError::MalformedHeader(line.to_string()));
    }
    let value = value.strip_prefix(' ').unwrap_or(value);
    Ok((name.to_ascii_lowercase(), value.to_string()))
}

/// Read the request line and headers up to the blank line.
pub async fn read_request_head<R>(reader: &mut R, max_line_bytes: usize) -> Result<RequestHead, HttpError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let request_line = read_line(reader, max_line_bytes).await?;
    let (verb, path, protocol) = parse_request_line(&request_line)?;

    let mut headers = HeaderStore::new(HeaderKind::Request);
    loop {
        let line = read_line(reader, max_line_bytes).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = parse_header_line(&line)?;
        headers.add(name, value);
    }

    Ok(RequestHead {
        verb,
        path,
        protocol,
        headers,
    })
}

/// Serialize the status line and headers.
///
/// `content-length` is added for single in-memory bodies when not set
/// explicitly, and `connection: close` when no `connection` header exists.
fn encode_head(head: &ResponseHead, body: &Body) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    // Writing into a Vec cannot fail.
    let _ = write!(out, "HTTP/1.1 {} {}\r\n", head.status, head.reason);

    for (name, value) in head.headers.iter() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(CRLF);
    }

    if !head.headers.contains("content-length") {
        if let Some(len) = body.known_len() {
            let _ = write!(out, "content-length: {len}\r\n");
        }
    }
    if !head.headers.contains("connection") {
        out.extend_from_slice(b"connection: close\r\n");
    }

    out.extend_from_slice(CRLF);
    out
}

/// Write a response in one left-to-right pass. Deferred parts are produced
/// only when their turn comes.
pub(crate) async fn write_response<W>(writer: &mut W, head: &ResponseHead, body: Body) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(&encode_head(head, &body)).await?;

    match body {
        Body::Empty => {}
        Body::Bytes(bytes) => writer.write_all(&bytes).await?,
        Body::Parts(parts) => {
            for part in parts {
                match part {
                    BodyPart::Bytes(bytes) => writer.write_all(&bytes).await?,
                    BodyPart::Deferred(produce) => {
                        let bytes = produce().map_err(WriteError::Producer)?;
                        writer.write_all(&bytes).await?;
                    }
                }
            }
        }
    }

    writer.flush().await?;
    Ok(())
}
