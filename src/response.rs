// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 处理函数返回的响应
//!
//! `Response` 只能通过具名构造函数创建，每个构造函数同时确定响应种类与负载，
//! 不存在种类与负载不匹配的中间状态：
//!
//! | 构造函数 | 种类 | 负载 |
//! |---|---|---|
//! | `text` / `text_with_code` | Text | 字符串 |
//! | `json` / `json_with_code` | Json | 任意可序列化值 |
//! | `static_file` | StaticFile | 视图根目录下的文件名 |
//! | `view` / `view_with_code` | TemplatedFile | 模板文件名与数据 |
//!
//! 渲染（[`Response::render`]）把负载变成状态码、`Content-Type` 与响应体。
//! 文件类响应在渲染时才读取文件；文件缺失或模板出错时渲染出一个诊断页面，
//! 而不是向上返回错误。

use std::io::{self, Write};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::Utc;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};
use serde::Serialize;
use serde_json::Value;

use crate::{
    exception::{Exception, Result},
    param::*,
    template,
    util::{format_http_date, HtmlBuilder},
    views::Views,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Text,
    Json,
    StaticFile,
    TemplatedFile,
}

#[derive(Debug, Clone)]
enum Payload {
    Text(String),
    Json(Value),
    StaticFile(String),
    TemplatedFile { name: String, data: Value },
}

#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    payload: Payload,
    headers: Vec<(String, String)>,
}

impl Response {
    fn from_payload(payload: Payload, status_code: u16) -> Self {
        Self {
            status_code,
            payload,
            headers: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::text_with_code(text, 200)
    }

    pub fn text_with_code(text: impl Into<String>, code: u16) -> Self {
        Self::from_payload(Payload::Text(text.into()), code)
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::json_with_code(value, 200)
    }

    /// 值无法序列化时退化为 500 文本响应。
    pub fn json_with_code<T: Serialize + ?Sized>(value: &T, code: u16) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Self::from_payload(Payload::Json(v), code),
            Err(e) => {
                error!("序列化JSON响应失败：{}", e);
                Self::text_with_code("Error while marshaling JSON.", 500)
            }
        }
    }

    /// 视图根目录下的静态文件，`Content-Type` 由扩展名推断。
    pub fn static_file(name: impl Into<String>) -> Self {
        Self::from_payload(Payload::StaticFile(name.into()), 200)
    }

    pub fn view<T: Serialize + ?Sized>(name: impl Into<String>, data: &T) -> Self {
        Self::view_with_code(name, data, 200)
    }

    pub fn view_with_code<T: Serialize + ?Sized>(
        name: impl Into<String>,
        data: &T,
        code: u16,
    ) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self::from_payload(
                Payload::TemplatedFile {
                    name: name.into(),
                    data,
                },
                code,
            ),
            Err(e) => {
                error!("序列化模板数据失败：{}", e);
                Self::text_with_code("Error while marshaling view data.", 500)
            }
        }
    }

    /// 附加一个响应头，渲染时原样输出
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

impl Response {
    pub fn kind(&self) -> ResponseKind {
        match self.payload {
            Payload::Text(_) => ResponseKind::Text,
            Payload::Json(_) => ResponseKind::Json,
            Payload::StaticFile(_) => ResponseKind::StaticFile,
            Payload::TemplatedFile { .. } => ResponseKind::TemplatedFile,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// 把负载解析为线路上的状态码、内容类型与响应体。
    pub fn render(&self, views: &Views) -> Rendered {
        let rendered = match self.render_payload(views) {
            Ok((content_type, body)) => Rendered {
                status_code: self.status_code,
                content_type: Some(content_type),
                content_encoding: None,
                headers: self.headers.clone(),
                body,
            },
            Err(e) => {
                warn!("渲染{:?}响应失败，输出诊断页面：{}", self.kind(), e);
                Rendered::diagnostic(&e)
            }
        };
        debug!(
            "响应渲染完成：{} {:?}，{}字节",
            rendered.status_code,
            rendered.content_type,
            rendered.body.len()
        );
        rendered
    }

    /// 渲染并把状态行、响应头和响应体写入 `sink`
    pub fn render_to<W: Write>(&self, views: &Views, sink: &mut W) -> io::Result<()> {
        self.render(views).write_to(sink, false)
    }

    fn render_payload(&self, views: &Views) -> Result<(String, Bytes)> {
        match &self.payload {
            Payload::Text(text) => Ok((TEXT_PLAIN.to_string(), Bytes::from(text.clone()))),
            Payload::Json(value) => Ok((
                APPLICATION_JSON.to_string(),
                Bytes::from(serde_json::to_vec(value).map_err(io::Error::from)?),
            )),
            Payload::StaticFile(name) => {
                let (path, bytes) = views.load(name)?;
                let mime = mime_for(path.extension().and_then(|e| e.to_str()));
                Ok((mime.to_string(), bytes))
            }
            Payload::TemplatedFile { name, data } => {
                let (_, bytes) = views.load(name)?;
                let source = std::str::from_utf8(&bytes).map_err(|_| Exception::TemplateRender {
                    name: name.clone(),
                    reason: "template is not valid UTF-8".to_string(),
                })?;
                let html = template::render(name, source, data)?;
                Ok((TEXT_HTML.to_string(), Bytes::from(html)))
            }
        }
    }
}

/// 渲染完成、可以直接写到线路上的响应。
#[derive(Debug, Clone)]
pub struct Rendered {
    status_code: u16,
    content_type: Option<String>,
    content_encoding: Option<HttpEncoding>,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Rendered {
    /// 渲染失败时的诊断页面。状态码随错误种类而定（缺失为 404，越界为 400，其余为 500）。
    pub fn diagnostic(error: &Exception) -> Self {
        let code = error.status_code();
        let html = HtmlBuilder::from_status_code(code, Some(&error.to_string())).build();
        Self {
            status_code: code,
            content_type: Some(TEXT_HTML.to_string()),
            content_encoding: None,
            headers: Vec::new(),
            body: Bytes::from(html),
        }
    }

    /// 线路层错误（无法解析的请求等）直接生成的纯文本响应
    pub fn plain(code: u16, text: &str) -> Self {
        Self {
            status_code: code,
            content_type: Some(TEXT_PLAIN.to_string()),
            content_encoding: None,
            headers: Vec::new(),
            body: Bytes::from(text.to_string()),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 按客户端支持的编码压缩响应体。已压缩的媒体类型与空响应体保持原样，
    /// 压缩失败时退回未压缩内容。
    pub fn compress(mut self, accept_encoding: &[HttpEncoding]) -> Self {
        if self.body.is_empty() || self.content_encoding.is_some() {
            return self;
        }
        if self.content_type.as_deref().map_or(true, should_skip_compression) {
            return self;
        }
        let encoding = match decide_encoding(accept_encoding) {
            Some(e) => e,
            None => return self,
        };
        match compress(&self.body, encoding) {
            Ok(compressed) => {
                debug!(
                    "压缩完成: {}, 原始大小: {} bytes, 压缩后: {} bytes",
                    encoding,
                    self.body.len(),
                    compressed.len()
                );
                self.body = Bytes::from(compressed);
                self.content_encoding = Some(encoding);
            }
            Err(e) => error!("压缩响应体失败：{}，返回未压缩内容", e),
        }
        self
    }

    /// 序列化为完整的 HTTP/1.1 报文。`head_only` 时省略响应体但保留 `Content-Length`。
    pub fn as_bytes(&self, head_only: bool) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}{}",
            self.status_code,
            reason_phrase(self.status_code),
            CRLF
        );
        if let Some(t) = &self.content_type {
            head.push_str(&["Content-Type: ", t, CRLF].concat());
        }
        if let Some(e) = self.content_encoding {
            head.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        head.push_str(&format!("Content-Length: {}{}", self.body.len(), CRLF));
        head.push_str(&["Date: ", &format_http_date(&Utc::now()), CRLF].concat());
        head.push_str(&["Server: ", SERVER_NAME, CRLF].concat());
        for (name, value) in &self.headers {
            head.push_str(&[name.as_str(), ": ", value, CRLF].concat());
        }
        head.push_str(&["Connection: close", CRLF, CRLF].concat());

        let mut bytes = head.into_bytes();
        if !head_only {
            bytes.extend_from_slice(&self.body);
        }
        bytes
    }

    pub fn write_to<W: Write>(&self, sink: &mut W, head_only: bool) -> io::Result<()> {
        sink.write_all(&self.as_bytes(head_only))?;
        sink.flush()
    }
}

fn compress(data: &[u8], mode: HttpEncoding) -> io::Result<Vec<u8>> {
    match mode {
        HttpEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        HttpEncoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        HttpEncoding::Br => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
    }
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/",
        "video/",
        "audio/",
        "font/woff",
        "application/zip",
        "application/gzip",
        "application/x-tar",
        "application/wasm",
    ];
    skip_types.iter().any(|&skip| mime_type.starts_with(skip))
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    [HttpEncoding::Gzip, HttpEncoding::Br, HttpEncoding::Deflate]
        .into_iter()
        .find(|e| accept_encoding.contains(e))
}
