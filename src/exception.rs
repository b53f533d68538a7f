// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 框架在启动与请求处理两个阶段可能产生的全部错误。
//!
//! - **启动期**：路由注册冲突、配置解析失败、证书缺失。这些错误在监听端口之前
//!   就会返回给 `main`，进程直接退出。
//! - **请求期**：路径参数缺失、请求体格式错误。它们以 `Result` 的形式交给处理函数，
//!   由处理函数决定映射成什么样的响应。
//! - **渲染期**：视图文件缺失、模板渲染失败。它们不会向上传播，而是被渲染成
//!   响应体中的诊断信息。

use std::io;

use thiserror::Error;

/// 框架统一的结果类型
pub type Result<T> = std::result::Result<T, Exception>;

#[derive(Debug, Error)]
pub enum Exception {
    /// 同一个 (方法, 路径) 被注册了两次，或路径模式无法被多路复用器接受。
    #[error("route registration failed: {0}")]
    RouteRegistration(String),

    /// 处理函数读取了路由模式中不存在的路径参数。
    #[error("path parameter `{0}` was not matched by the route")]
    ParamNotFound(String),

    /// 请求体无法反序列化为目标类型。
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// 视图根目录下找不到请求的文件。
    #[error("view `{0}` not found")]
    ViewNotFound(String),

    /// 模板解析或渲染失败。
    #[error("failed to render template `{name}`: {reason}")]
    TemplateRender { name: String, reason: String },

    /// 视图名试图越出视图根目录（目录遍历），或路径本身不合法。
    #[error("invalid path `{0}`")]
    InvalidPath(String),

    /// 请求字节流不是合法的 UTF-8。
    #[error("request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,

    /// 请求行或请求头格式不正确。
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// 客户端使用了路由无法绑定的方法。
    #[error("unsupported request method `{0}`")]
    UnsupportedRequestMethod(String),

    /// 客户端使用了不支持的协议版本。
    #[error("unsupported HTTP version `{0}`")]
    UnsupportedHttpVersion(String),

    /// 请求超过 `server.max_request_size`。
    #[error("request exceeds {0} bytes")]
    RequestTooLarge(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    /// 后台任务池已满，任务没有被接收。
    #[error("worker pool is saturated")]
    PoolSaturated,

    #[error("mail error: {0}")]
    Mail(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Exception {
    /// 线路层错误对应的 HTTP 状态码。请求期以外的错误统一视为 500。
    pub fn status_code(&self) -> u16 {
        match self {
            Exception::RequestIsNotUtf8
            | Exception::MalformedRequest(_)
            | Exception::UnsupportedHttpVersion(_)
            | Exception::MalformedBody(_)
            | Exception::ParamNotFound(_)
            | Exception::InvalidPath(_) => 400,
            Exception::ViewNotFound(_) => 404,
            Exception::UnsupportedRequestMethod(_) => 405,
            Exception::RequestTooLarge(_) => 413,
            _ => 500,
        }
    }
}
