//! Human-readable dumps of buffered HTTP messages.
//!
//! The layout follows the HTTP/1.x wire format: start line, headers, blank
//! line, body. Bodies that are not valid UTF-8 are rendered lossily.

use std::fmt::Write;

use axum::http::{header, HeaderMap, Version};

use crate::proxy::{CapturedRequest, CapturedResponse};

/// Dump a request, `Host` first.
pub fn dump_request(request: &CapturedRequest) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{} {} {}\r\n",
        request.method(),
        request.uri(),
        version_str(request.version())
    );

    let host = request_host(request);
    if !host.is_empty() {
        let _ = write!(out, "Host: {host}\r\n");
    }
    write_headers(&mut out, request.headers(), true);
    out.push_str("\r\n");
    out.push_str(&String::from_utf8_lossy(request.body()));
    out
}

pub fn dump_response(response: &CapturedResponse) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{} {}\r\n",
        version_str(response.version()),
        response.status()
    );
    write_headers(&mut out, response.headers(), false);
    out.push_str("\r\n");
    out.push_str(&String::from_utf8_lossy(response.body()));
    out
}

/// The request's target host: the `Host` header, else the URI authority.
pub fn request_host(request: &CapturedRequest) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

fn write_headers(out: &mut String, headers: &HeaderMap, skip_host: bool) {
    for (name, value) in headers {
        if skip_host && *name == header::HOST {
            continue;
        }
        let _ = write!(
            out,
            "{}: {}\r\n",
            canonical_name(name.as_str()),
            String::from_utf8_lossy(value.as_bytes())
        );
    }
}

/// `content-type` → `Content-Type`. Header names are stored lowercase.
fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}
