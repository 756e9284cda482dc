//! Minimal HTTP/1.1 exchange over an already-open stream
//!
//! Only what the daemon API needs: one request at a time, bodies framed by
//! `Content-Length`, `chunked`, or connection close.

use crate::error::{Result, TransportError};
use http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Version};
use std::io::{BufRead, BufReader, Cursor, Read, Write};

const MAX_HEAD_BYTES: usize = 64 * 1024;
const MAX_HEADERS: usize = 96;

/// Upper bound on buffer space reserved up front from a peer-supplied length
const MAX_BODY_PREALLOC: usize = 1024 * 1024;

/// Write `request` with `target` as the request-target
pub(crate) fn write_request<W: Write>(
    writer: &mut W,
    request: &Request<Vec<u8>>,
    target: &str,
) -> Result<()> {
    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(format!("{} {} HTTP/1.1\r\n", request.method(), target).as_bytes());

    if !request.headers().contains_key(HOST) {
        let host = request.uri().host().unwrap_or("localhost");
        head.extend_from_slice(format!("Host: {}\r\n", host).as_bytes());
    }
    for (name, value) in request.headers() {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }

    let body = request.body();
    let needs_length = !body.is_empty()
        || matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH);
    if needs_length && !request.headers().contains_key(CONTENT_LENGTH) {
        head.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    head.extend_from_slice(b"\r\n");

    writer.write_all(&head)?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

/// A parsed response plus whether the connection may carry another request
pub(crate) struct Exchange {
    pub response: Response<Vec<u8>>,
    pub reusable: bool,
}

/// Read one response for a request made with `method`
pub(crate) fn read_response<R: Read>(reader: &mut R, method: &Method) -> Result<Exchange> {
    let (mut buf, head_len) = read_head(reader)?;

    let (status, version, headers) = {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut slots);
        match parsed.parse(&buf[..head_len]) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) => {
                return Err(TransportError::Protocol("incomplete response head".to_string()))
            }
            Err(e) => return Err(TransportError::Protocol(e.to_string())),
        }

        let code = parsed
            .code
            .ok_or_else(|| TransportError::Protocol("missing status code".to_string()))?;
        let status =
            StatusCode::from_u16(code).map_err(|e| TransportError::Protocol(e.to_string()))?;
        let version = match parsed.version {
            Some(0) => Version::HTTP_10,
            _ => Version::HTTP_11,
        };

        let mut headers = HeaderMap::with_capacity(parsed.headers.len());
        for header in parsed.headers.iter() {
            let name = http::HeaderName::from_bytes(header.name.as_bytes())
                .map_err(|e| TransportError::Protocol(e.to_string()))?;
            let value = HeaderValue::from_bytes(header.value)
                .map_err(|e| TransportError::Protocol(e.to_string()))?;
            headers.append(name, value);
        }
        (status, version, headers)
    };

    let leftover = buf.split_off(head_len);
    let mut reusable = keep_alive(version, &headers);

    let body = if *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        if !leftover.is_empty() {
            reusable = false;
        }
        Vec::new()
    } else if is_chunked(&headers) {
        let mut body_reader = BufReader::new(Cursor::new(leftover).chain(reader));
        let body = read_chunked(&mut body_reader)?;
        if !body_reader.buffer().is_empty() {
            reusable = false;
        }
        body
    } else if let Some(length) = content_length(&headers)? {
        if leftover.len() > length {
            reusable = false;
        }
        let mut body = Vec::with_capacity(length.min(MAX_BODY_PREALLOC));
        Cursor::new(leftover)
            .chain(reader)
            .take(length as u64)
            .read_to_end(&mut body)?;
        if body.len() < length {
            return Err(TransportError::Protocol(format!(
                "body ended after {} of {} bytes",
                body.len(),
                length
            )));
        }
        body
    } else {
        reusable = false;
        let mut body = leftover;
        reader.read_to_end(&mut body)?;
        body
    };

    let mut builder = Response::builder().status(status).version(version);
    if let Some(map) = builder.headers_mut() {
        *map = headers;
    }
    Ok(Exchange {
        response: builder.body(body)?,
        reusable,
    })
}

/// Read until the blank line ending the head; returns the buffer and head length
fn read_head<R: Read>(reader: &mut R) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            return Ok((buf, end + 4));
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(TransportError::Protocol(format!(
                "response head exceeds {} bytes",
                MAX_HEAD_BYTES
            )));
        }
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(TransportError::Protocol(
                "connection closed before response head".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let tokens: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .collect();

    if tokens.iter().any(|t| t == "close") {
        return false;
    }
    version == Version::HTTP_11 || tokens.iter().any(|t| t == "keep-alive")
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("chunked")))
}

fn content_length(headers: &HeaderMap) -> Result<Option<usize>> {
    match headers.get(CONTENT_LENGTH) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(Some)
            .ok_or_else(|| TransportError::Protocol(format!("invalid Content-Length {:?}", value))),
    }
}

fn read_chunked<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(TransportError::Protocol("chunked body ended early".to_string()));
        }
        let size_field = line.trim_end().split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| TransportError::Protocol(format!("invalid chunk size {:?}", size_field)))?;

        if size == 0 {
            // Trailer section, terminated by an empty line.
            loop {
                line.clear();
                if reader.read_line(&mut line)? == 0 || line.trim_end().is_empty() {
                    return Ok(body);
                }
            }
        }

        let start = body.len();
        let end = start
            .checked_add(size)
            .ok_or_else(|| TransportError::Protocol("chunk size overflow".to_string()))?;
        reader.by_ref().take(size as u64).read_to_end(&mut body)?;
        if body.len() < end {
            return Err(TransportError::Protocol("chunked body ended early".to_string()));
        }

        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if &crlf != b"\r\n" {
            return Err(TransportError::Protocol("chunk not terminated by CRLF".to_string()));
        }
    }
}
