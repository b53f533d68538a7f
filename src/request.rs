// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 处理函数看到的请求
//!
//! `Request` 由多路复用器在路由匹配成功后构造，一次调用对应一个实例：
//! 1. 方法、匹配后的路径与路径参数。
//! 2. 请求头、查询字符串与原始请求体。
//! 3. 中间件向下游传递数据用的属性表（例如认证后的用户）。
//!
//! 请求在交给下一个处理函数之后不会再被修改；中间件只能通过
//! [`Request::with_attribute`] 得到一份带新属性的副本。

use std::{any::Any, collections::HashMap, sync::Arc};

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{
    exception::{Exception, Result},
    param::HttpRequestMethod,
    wire::RawRequest,
};

type Attributes = HashMap<String, Arc<dyn Any + Send + Sync>>;

#[derive(Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 匹配后的路径，不含查询字符串
    path: String,
    query: Vec<(String, String)>,
    params: HashMap<String, String>,
    headers: Arc<Vec<(String, String)>>,
    body: Bytes,
    attributes: Arc<Attributes>,
}

impl Request {
    /// 由线路层请求与路由匹配出的路径参数构造。
    pub fn from_raw(raw: &RawRequest, params: HashMap<String, String>) -> Self {
        Self {
            method: raw.method(),
            path: raw.path().to_string(),
            query: parse_query(raw.query()),
            params,
            headers: Arc::new(raw.headers().to_vec()),
            body: raw.body().clone(),
            attributes: Arc::new(HashMap::new()),
        }
    }

    /// 构造一个空请求，便于直接调用处理函数进行测试。
    pub fn new(method: HttpRequestMethod, path: &str) -> Self {
        Self::from_raw(&RawRequest::new(method, path), HashMap::new())
    }

    /// 返回附带一个新属性的副本，原请求保持不变。
    ///
    /// 同名属性会被覆盖。
    pub fn with_attribute<T>(&self, key: &str, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        let mut attributes = (*self.attributes).clone();
        attributes.insert(key.to_string(), Arc::new(value));
        Self {
            attributes: Arc::new(attributes),
            ..self.clone()
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        Arc::make_mut(&mut self.headers).push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

impl Request {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 读取路径参数，路由模式中没有该参数时返回 `ParamNotFound`。
    pub fn param(&self, name: &str) -> Result<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Exception::ParamNotFound(name.to_string()))
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// 查询参数的第一个值（已做百分号解码，`+` 视为空格）
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 按名称查找请求头，大小写不敏感
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 把请求体反序列化为调用方指定的类型，失败时返回 `MalformedBody`。
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// 读取中间件写入的属性；键不存在或类型不符时返回 `None`。
    pub fn attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(|v| v.downcast_ref::<T>())
    }
}

/// 把查询字符串拆成解码后的键值对。非法的 UTF-8 序列以替换字符代替。
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(text: &str) -> String {
    let text = text.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(text.as_bytes())).into_owned()
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("body_len", &self.body.len())
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}
