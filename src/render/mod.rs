//! Response rendering.
//!
//! A [`Render`] knows its content type and how to serialize itself onto a
//! [`ResponseWriter`]. The content type is only set when the handler has
//! not set one already.

use std::io;

use axum::http::{header::CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use thiserror::Error;

use crate::http::response::ResponseWriter;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const JSONP_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("render write: {0}")]
    Io(#[from] io::Error),
}

/// Something that can be written as a response body.
pub trait Render {
    fn write_content_type(&self, w: &mut dyn ResponseWriter);

    fn render(&self, w: &mut dyn ResponseWriter) -> Result<(), RenderError>;
}

fn write_content_type(w: &mut dyn ResponseWriter, value: &'static str) {
    let headers = w.headers_mut();
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
    }
}

/// Plain text.
#[derive(Debug, Clone, Copy)]
pub struct Text<'a>(pub &'a str);

impl Render for Text<'_> {
    fn write_content_type(&self, w: &mut dyn ResponseWriter) {
        write_content_type(w, TEXT_CONTENT_TYPE);
    }

    fn render(&self, w: &mut dyn ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        w.write_str(self.0)?;
        Ok(())
    }
}

/// Any serializable value as JSON.
#[derive(Debug, Clone, Copy)]
pub struct Json<'a, T: ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> Render for Json<'_, T> {
    fn write_content_type(&self, w: &mut dyn ResponseWriter) {
        write_content_type(w, JSON_CONTENT_TYPE);
    }

    fn render(&self, w: &mut dyn ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let bytes = serde_json::to_vec(self.0)?;
        w.write(&bytes)?;
        Ok(())
    }
}

/// JSON wrapped in a JavaScript callback: `callback(json);`.
///
/// An empty callback renders the bare JSON.
#[derive(Debug, Clone, Copy)]
pub struct Jsonp<'a, T: ?Sized> {
    pub callback: &'a str,
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for Jsonp<'_, T> {
    fn write_content_type(&self, w: &mut dyn ResponseWriter) {
        write_content_type(w, JSONP_CONTENT_TYPE);
    }

    fn render(&self, w: &mut dyn ResponseWriter) -> Result<(), RenderError> {
        self.write_content_type(w);
        let json = serde_json::to_vec(self.data)?;

        if self.callback.is_empty() {
            w.write(&json)?;
            return Ok(());
        }

        let callback = js_escape(self.callback);
        let mut out = Vec::with_capacity(callback.len() + json.len() + 3);
        out.extend_from_slice(callback.as_bytes());
        out.push(b'(');
        out.extend_from_slice(&json);
        out.extend_from_slice(b");");
        w.write(&out)?;
        Ok(())
    }
}

/// Escape `s` for safe embedding in JavaScript source.
///
/// Quotes and backslashes get a backslash; `<`, `>`, `&`, `=` and
/// non-printable characters become `\uXXXX`.
pub fn js_escape(s: &str) -> String {
    if !s.chars().any(needs_escape) {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            c if needs_escape(c) => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn needs_escape(c: char) -> bool {
    match c {
        '\\' | '\'' | '"' | '<' | '>' | '&' | '=' => true,
        c if c.is_ascii() => c < ' ',
        c => c.is_control() || c.is_whitespace(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{BufferedSink, TrackedWriter};
    use axum::http::{header::CONTENT_TYPE, StatusCode};
    use serde_json::json;

    fn writer() -> TrackedWriter<BufferedSink> {
        TrackedWriter::new(BufferedSink::new())
    }

    #[test]
    fn test_text() {
        let mut w = writer();
        Text("hello").render(&mut w).unwrap();

        assert_eq!(w.sink().headers()[CONTENT_TYPE], TEXT_CONTENT_TYPE);
        assert_eq!(w.sink().body(), b"hello");
        assert_eq!(w.size(), Some(5));
    }

    #[test]
    fn test_json_keeps_handler_content_type() {
        let mut w = writer();
        w.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/problem+json"));
        Json(&json!({"a": 1})).render(&mut w).unwrap();

        assert_eq!(w.sink().headers()[CONTENT_TYPE], "application/problem+json");
        assert_eq!(w.sink().body(), br#"{"a":1}"#);
    }

    #[test]
    fn test_jsonp_escapes_callback() {
        let mut w = writer();
        Jsonp {
            callback: "x<y",
            data: &json!([1]),
        }
        .render(&mut w)
        .unwrap();

        assert_eq!(w.sink().body(), b"x\\u003Cy([1]);");
    }

    #[test]
    fn test_jsonp_empty_callback_is_json() {
        let mut w = writer();
        Jsonp {
            callback: "",
            data: &json!({"a": 1}),
        }
        .render(&mut w)
        .unwrap();

        assert_eq!(w.sink().body(), br#"{"a":1}"#);
        assert_eq!(w.sink().headers()[CONTENT_TYPE], JSONP_CONTENT_TYPE);
    }

    #[test]
    fn test_render_uses_status_set_before() {
        let mut w = writer();
        w.write_header(StatusCode::CREATED);
        Text("made").render(&mut w).unwrap();
        assert_eq!(w.sink().status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn test_js_escape() {
        assert_eq!(js_escape("callback_1.fn"), "callback_1.fn");
        assert_eq!(js_escape(r#"a\b'c"d"#), r#"a\\b\'c\"d"#);
        assert_eq!(js_escape("<>&="), "\\u003C\\u003E\\u0026\\u003D");
        assert_eq!(js_escape("a\nb\tc"), "a\\u000Ab\\u0009c");
        assert_eq!(js_escape("\u{2028}"), "\\u2028");
        assert_eq!(js_escape("héllo"), "héllo");
    }
}
