// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 线路层请求解析
//!
//! 把 TCP（或 TLS）流中读到的原始字节整理成 `RawRequest`：
//! 1. 按 `Content-Length` 读满请求体，总长度受 `max_request_size` 约束。
//! 2. 解析请求行（方法、目标、版本）。
//! 3. 收集请求头，名称统一转为小写。
//!
//! `RawRequest` 只是多路复用器的输入，路由匹配之后才会被转换成交给处理函数的 `Request`。

use bytes::Bytes;
use log::{debug, error};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    exception::{Exception, Result},
    param::*,
};

/// 解析完成但尚未匹配路由的请求。
#[derive(Debug, Clone)]
pub struct RawRequest {
    method: HttpRequestMethod,
    /// 请求目标，包含查询字符串
    target: String,
    version: HttpVersion,
    /// (小写名称, 值)，保持报文中的顺序
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl RawRequest {
    /// 构造一个没有请求头和请求体的请求，主要供测试与基准使用。
    pub fn new(method: HttpRequestMethod, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            version: HttpVersion::V1_1,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 从完整的请求报文字节解析。
    ///
    /// # 错误处理
    /// 报文头不是 UTF-8、请求行残缺、方法或版本不受支持时返回对应的 `Exception`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self> {
        let (head, body) = match find_head_end(buffer) {
            Some(end) => (&buffer[..end], &buffer[end + HEAD_TERMINATOR.len()..]),
            None => (buffer, &buffer[buffer.len()..]),
        };

        let head = match std::str::from_utf8(head) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]请求头不是合法的UTF-8", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = head.split(CRLF);
        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest(request_line.to_string()));
        }

        let method = match HttpRequestMethod::parse(parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, parts[0]);
                return Err(Exception::UnsupportedRequestMethod(parts[0].to_string()));
            }
        };

        let version = match parts[2].to_ascii_uppercase().as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::UnsupportedHttpVersion(other.to_string()));
            }
        };

        let target = parts[1];
        if !target.starts_with('/') {
            return Err(Exception::MalformedRequest(format!("request target `{}`", target)));
        }

        let mut headers = Vec::new();
        for line in lines.filter(|l| !l.is_empty()) {
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()))
                }
                None => {
                    error!("[ID{}]无法解析的请求头：{}", id, line);
                    return Err(Exception::MalformedRequest(line.to_string()));
                }
            }
        }

        let mut request = Self {
            method,
            target: target.to_string(),
            version,
            headers,
            body: Bytes::new(),
        };
        let body_len = request.content_length().unwrap_or(0).min(body.len());
        request.body = Bytes::copy_from_slice(&body[..body_len]);
        debug!(
            "[ID{}]请求解析完成：{} {}，请求头{}个，请求体{}字节",
            id,
            request.method,
            request.target,
            request.headers.len(),
            body_len
        );
        Ok(request)
    }
}

impl RawRequest {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// 不含查询字符串的路径
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// 原始查询字符串（不含 `?`）
    pub fn query(&self) -> &str {
        match self.target.split_once('?') {
            Some((_, query)) => query,
            None => "",
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// 按名称查找请求头，大小写不敏感
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    /// 客户端支持的压缩算法，按 Br、Gzip、Deflate 的顺序检测
    pub fn accept_encoding(&self) -> Vec<HttpEncoding> {
        let mut encodings = Vec::new();
        if let Some(value) = self.header("accept-encoding") {
            for token in value.split(',').map(|t| t.split(';').next().unwrap_or("").trim()) {
                let encoding = match token {
                    "gzip" => HttpEncoding::Gzip,
                    "deflate" => HttpEncoding::Deflate,
                    "br" => HttpEncoding::Br,
                    _ => continue,
                };
                if !encodings.contains(&encoding) {
                    encodings.push(encoding);
                }
            }
        }
        encodings
    }
}

/// 报文头结束位置（`\r\n\r\n` 的起点）
pub fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
}

/// 从报文头文本中提取 `Content-Length`，不存在或非法时视为 0。
fn declared_content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .split(CRLF)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// 从流中读取一个完整的请求报文。
///
/// 对端在发送任何字节之前关闭连接时返回 `Ok(None)`。
pub async fn read_request<S>(stream: &mut S, max_size: usize, id: u128) -> Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = vec![0u8; 4096];

    let head_end = loop {
        if let Some(end) = find_head_end(&buffer) {
            break end;
        }
        if buffer.len() > max_size {
            return Err(Exception::RequestTooLarge(max_size));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(Exception::MalformedRequest("connection closed mid-request".into()));
        }
        buffer.extend_from_slice(&chunk[..n]);
    };

    let total = match (head_end + HEAD_TERMINATOR.len())
        .checked_add(declared_content_length(&buffer[..head_end]))
    {
        Some(total) if total <= max_size => total,
        _ => return Err(Exception::RequestTooLarge(max_size)),
    };
    while buffer.len() < total {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Exception::MalformedRequest("request body truncated".into()));
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    debug!("[ID{}]HTTP请求接收完毕，共{}字节", id, buffer.len());
    Ok(Some(buffer))
}
