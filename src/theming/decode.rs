//! Turning an upstream HTML body into text.

use std::io::Read;

use axum::http::{header, HeaderMap};
use encoding_rs::{Encoding, UTF_8};
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};

use crate::theming::error::RewriteError;

/// Bytes inspected when looking for a `<meta>` charset declaration.
const SNIFF_LIMIT: usize = 1024;

/// Content codings the rewrite stage can undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Identity,
    Gzip,
    Deflate,
}

/// The response's content coding, `None` when it is one we cannot decode.
pub fn content_coding(headers: &HeaderMap) -> Option<ContentCoding> {
    let Some(value) = headers.get(header::CONTENT_ENCODING) else {
        return Some(ContentCoding::Identity);
    };
    match value.to_str().ok()?.trim().to_ascii_lowercase().as_str() {
        "" | "identity" => Some(ContentCoding::Identity),
        "gzip" | "x-gzip" => Some(ContentCoding::Gzip),
        "deflate" => Some(ContentCoding::Deflate),
        _ => None,
    }
}

fn media_type(headers: &HeaderMap) -> Option<mime::Mime> {
    headers
        .get(header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .parse::<mime::Mime>()
        .ok()
}

/// `text/html` or `application/xhtml+xml`.
pub fn is_html(headers: &HeaderMap) -> bool {
    match media_type(headers) {
        Some(m) => matches!(m.essence_str(), "text/html" | "application/xhtml+xml"),
        None => false,
    }
}

/// Undo `coding`. Output longer than `limit` bytes is a decode error.
pub fn decompress(body: &[u8], coding: ContentCoding, limit: usize) -> Result<Vec<u8>, RewriteError> {
    let result = match coding {
        ContentCoding::Identity => return Ok(body.to_vec()),
        ContentCoding::Gzip => inflate(MultiGzDecoder::new(body), limit),
        // Servers send both zlib-wrapped and raw deflate under this name.
        ContentCoding::Deflate => match inflate(ZlibDecoder::new(body), limit) {
            Err(Inflate::Corrupt(_)) => inflate(DeflateDecoder::new(body), limit),
            other => other,
        },
    };
    result.map_err(|e| match e {
        Inflate::TooLarge => {
            RewriteError::Decode(format!("{:?} body inflates past {} bytes", coding, limit))
        }
        Inflate::Corrupt(e) => RewriteError::Decode(format!("{:?} body: {}", coding, e)),
    })
}

enum Inflate {
    TooLarge,
    Corrupt(std::io::Error),
}

fn inflate(reader: impl Read, limit: usize) -> Result<Vec<u8>, Inflate> {
    let mut out = Vec::new();
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)
        .map_err(Inflate::Corrupt)?;
    if out.len() > limit {
        return Err(Inflate::TooLarge);
    }
    Ok(out)
}

/// Decode `body` to text.
///
/// The encoding comes from the content type's `charset`, else a byte order
/// mark, else a `<meta>` declaration near the top, else UTF-8. Invalid
/// sequences become U+FFFD.
pub fn decode_text(body: &[u8], headers: &HeaderMap) -> String {
    let declared = media_type(headers)
        .and_then(|m| m.get_param(mime::CHARSET).map(|c| c.as_str().to_string()))
        .and_then(|label| Encoding::for_label(label.as_bytes()));

    let encoding = declared
        .or_else(|| Encoding::for_bom(body).map(|(encoding, _)| encoding))
        .or_else(|| sniff_meta_charset(body))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!(encoding = used.name(), "Replaced malformed sequences in upstream body");
    }
    text.into_owned()
}

fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(SNIFF_LIMIT)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    let mut rest = head.as_str();
    while let Some(at) = rest.find("<meta") {
        let tag = &rest[at..];
        let tag = &tag[..tag.find('>').unwrap_or(tag.len())];
        if let Some(pos) = tag.find("charset=") {
            let value = tag[pos + "charset=".len()..].trim_start_matches(['"', '\'']);
            let end = value
                .find(|c: char| matches!(c, '"' | '\'' | ';' | '/' | '>') || c.is_whitespace())
                .unwrap_or(value.len());
            if let Some(encoding) = Encoding::for_label(value[..end].as_bytes()) {
                return Some(encoding);
            }
        }
        rest = &rest[at + "<meta".len()..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), value.parse().unwrap());
        }
        map
    }

    #[test]
    fn recognises_html() {
        assert!(is_html(&headers(&[(header::CONTENT_TYPE, "text/html; charset=utf-8")])));
        assert!(is_html(&headers(&[(header::CONTENT_TYPE, "application/xhtml+xml")])));
        assert!(!is_html(&headers(&[(header::CONTENT_TYPE, "text/plain")])));
        assert!(!is_html(&HeaderMap::new()));
    }

    #[test]
    fn content_codings() {
        assert_eq!(content_coding(&HeaderMap::new()), Some(ContentCoding::Identity));
        assert_eq!(
            content_coding(&headers(&[(header::CONTENT_ENCODING, "GZIP")])),
            Some(ContentCoding::Gzip)
        );
        assert_eq!(content_coding(&headers(&[(header::CONTENT_ENCODING, "br")])), None);
    }

    #[test]
    fn inflates_gzip_and_deflate() {
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(b"<p>gzip</p>").unwrap();
        let gz = gz.finish().unwrap();
        assert_eq!(decompress(&gz, ContentCoding::Gzip, 1024).unwrap(), b"<p>gzip</p>");

        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(b"<p>deflate</p>").unwrap();
        let zlib = zlib.finish().unwrap();
        assert_eq!(decompress(&zlib, ContentCoding::Deflate, 1024).unwrap(), b"<p>deflate</p>");

        assert!(matches!(
            decompress(b"not gzip", ContentCoding::Gzip, 1024),
            Err(RewriteError::Decode(_))
        ));
    }

    #[test]
    fn inflation_is_bounded() {
        let page = vec![b'a'; 4 * 1024 * 1024];
        let mut gz = GzEncoder::new(Vec::new(), Compression::best());
        gz.write_all(&page).unwrap();
        let gz = gz.finish().unwrap();
        assert!(gz.len() < 64 * 1024);

        let err = decompress(&gz, ContentCoding::Gzip, 1024 * 1024).unwrap_err();
        assert!(matches!(err, RewriteError::Decode(ref m) if m.contains("inflates past")), "{:?}", err);
        assert_eq!(decompress(&gz, ContentCoding::Gzip, page.len()).unwrap().len(), page.len());

        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::best());
        zlib.write_all(&page).unwrap();
        let zlib = zlib.finish().unwrap();
        assert!(matches!(
            decompress(&zlib, ContentCoding::Deflate, 1024 * 1024),
            Err(RewriteError::Decode(_))
        ));
    }

    #[test]
    fn charset_precedence() {
        // "café" in latin-1
        let latin1 = b"<p>caf\xe9</p>";
        let declared = headers(&[(header::CONTENT_TYPE, "text/html; charset=iso-8859-1")]);
        assert_eq!(decode_text(latin1, &declared), "<p>café</p>");

        let bom = b"\xef\xbb\xbf<p>caf\xc3\xa9</p>";
        assert_eq!(decode_text(bom, &HeaderMap::new()), "<p>café</p>");

        let meta = b"<html><head><meta charset=\"windows-1252\"></head><p>caf\xe9</p>";
        assert!(decode_text(meta, &HeaderMap::new()).contains("café"));

        let equiv = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\"><p>caf\xe9</p>";
        assert!(decode_text(equiv, &HeaderMap::new()).contains("café"));

        assert_eq!(decode_text("<p>café</p>".as_bytes(), &HeaderMap::new()), "<p>café</p>");
    }
}
