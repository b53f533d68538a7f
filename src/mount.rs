// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 挂载与分发
//!
//! 启动时对路由树做一次深度优先遍历，把每条路由展开成 `(方法, 绝对路径, 处理函数)`
//! 绑定，并登记到按方法划分的 [`matchit`] 基数树中：
//!
//! - 绝对路径 = 祖先节点前缀（外到内）+ 路由自身已带的本节点前缀。
//! - 处理函数 = 祖先中间件由外到内包装：`M1(M2(route.handler))`，最外层的中间件最先看到请求。
//! - 开发模式下再在最外层套上请求日志中间件；生产模式不套。两种模式只有这一处差别。
//!
//! 挂载不修改路由树。重复的 `(方法, 路径)` 或基数树无法接受的模式都会让挂载失败，
//! 错误在监听端口之前返回。

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use log::{debug, info, warn};

use crate::{
    exception::{Exception, Result},
    param::HttpRequestMethod,
    request::Request,
    response::{Rendered, Response},
    router::{middleware, Handler, Middleware, Router},
    views::Views,
    wire::RawRequest,
};

/// 挂载后的一条绑定
#[derive(Clone)]
pub struct Binding {
    method: HttpRequestMethod,
    path: String,
    handler: Handler,
}

impl Binding {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 带 `:name` 参数的绝对路径模式
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// 路由查找结果
pub enum Lookup<'a> {
    Found {
        binding: &'a Binding,
        params: HashMap<String, String>,
    },
    /// 路径存在，但没有为该方法注册；附带允许的方法
    MethodNotAllowed(Vec<HttpRequestMethod>),
    /// 路径参数解码后不是合法的 UTF-8
    MalformedParam(String),
    NotFound,
}

/// 多路复用器：挂载完成后只读，可在各连接任务间共享。
#[derive(Default)]
pub struct Mux {
    bindings: Vec<Binding>,
    trees: HashMap<HttpRequestMethod, matchit::Router<usize>>,
}

impl Mux {
    /// 挂载路由树。`development` 为真时注入请求日志中间件。
    pub fn mount(router: &Router, development: bool) -> Result<Self> {
        let logging = if development { Some(logger()) } else { None };
        Self::mount_with(router, logging)
    }

    /// 以指定的最外层中间件挂载路由树。
    pub fn mount_with(router: &Router, outermost: Option<Middleware>) -> Result<Self> {
        let mut mux = Mux::default();
        let mut seen = HashSet::new();
        mux.bind_node(router, "", &[], outermost.as_ref(), &mut seen)?;
        info!("路由挂载完成，共{}条绑定", mux.bindings.len());
        Ok(mux)
    }

    fn bind_node(
        &mut self,
        node: &Router,
        ancestor_prefix: &str,
        ancestors: &[Middleware],
        outermost: Option<&Middleware>,
        seen: &mut HashSet<(HttpRequestMethod, String)>,
    ) -> Result<()> {
        for route in node.routes() {
            let path = [ancestor_prefix, route.path()].concat();
            let mut handler = route.handler().clone();
            for m in ancestors.iter().rev() {
                handler = m(handler);
            }
            if let Some(m) = outermost {
                handler = m(handler);
            }
            self.bind(route.method(), path, handler, seen)?;
        }

        let child_prefix = [ancestor_prefix, node.prefix()].concat();
        let mut chain = ancestors.to_vec();
        if let Some(m) = node.middleware() {
            chain.push(m.clone());
        }
        for child in node.children() {
            self.bind_node(child, &child_prefix, &chain, outermost, seen)?;
        }
        Ok(())
    }

    fn bind(
        &mut self,
        method: HttpRequestMethod,
        path: String,
        handler: Handler,
        seen: &mut HashSet<(HttpRequestMethod, String)>,
    ) -> Result<()> {
        if !path.starts_with('/') {
            return Err(Exception::RouteRegistration(format!(
                "route `{} {}` must start with '/'",
                method, path
            )));
        }
        if !seen.insert((method, path.clone())) {
            return Err(Exception::RouteRegistration(format!(
                "duplicate route `{} {}`",
                method, path
            )));
        }

        let index = self.bindings.len();
        self.trees
            .entry(method)
            .or_insert_with(matchit::Router::new)
            .insert(to_matchit_pattern(&path), index)
            .map_err(|e| Exception::RouteRegistration(format!("`{} {}`: {}", method, path, e)))?;
        debug!("绑定路由：{} {}", method, path);
        self.bindings.push(Binding {
            method,
            path,
            handler,
        });
        Ok(())
    }
}

impl Mux {
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn lookup(&self, method: HttpRequestMethod, path: &str) -> Lookup<'_> {
        if let Some(matched) = self.trees.get(&method).and_then(|t| t.at(path).ok()) {
            let mut params = HashMap::new();
            for (name, value) in matched.params.iter() {
                match urlencoding::decode(value) {
                    Ok(decoded) => params.insert(name.to_string(), decoded.into_owned()),
                    Err(_) => return Lookup::MalformedParam(name.to_string()),
                };
            }
            return Lookup::Found {
                binding: &self.bindings[*matched.value],
                params,
            };
        }

        let allowed: Vec<HttpRequestMethod> = HttpRequestMethod::ALL
            .into_iter()
            .filter(|m| *m != method)
            .filter(|m| self.trees.get(m).is_some_and(|t| t.at(path).is_ok()))
            .collect();
        if allowed.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::MethodNotAllowed(allowed)
        }
    }

    /// 构造 `Request`、调用绑定的处理函数并返回其响应；未匹配时给出 404/405。
    pub fn dispatch(&self, raw: &RawRequest, id: u128) -> Response {
        match self.lookup(raw.method(), raw.path()) {
            Lookup::Found { binding, params } => {
                debug!("[ID{}]匹配路由：{:?}", id, binding);
                (binding.handler)(Request::from_raw(raw, params))
            }
            Lookup::MethodNotAllowed(allowed) => {
                warn!("[ID{}]{} {}：方法不允许", id, raw.method(), raw.path());
                let allow = allowed
                    .iter()
                    .map(|m| m.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Response::text_with_code("Method Not Allowed", 405).with_header("Allow", &allow)
            }
            Lookup::MalformedParam(name) => {
                warn!("[ID{}]{} {}：路径参数{}解码失败", id, raw.method(), raw.path(), name);
                Response::text_with_code("Bad Request", 400)
            }
            Lookup::NotFound => {
                warn!("[ID{}]{} {}：路由不存在", id, raw.method(), raw.path());
                Response::text_with_code("Not Found", 404)
            }
        }
    }

    /// 分发并渲染，得到可以直接写到线路上的响应
    pub fn handle(&self, raw: &RawRequest, views: &Views, id: u128) -> Rendered {
        self.dispatch(raw, id).render(views)
    }
}

/// 开发模式的请求日志中间件：在调用处理函数前记录方法与路径。
pub fn logger() -> Middleware {
    middleware(|next: Handler| -> Handler {
        std::sync::Arc::new(move |req: Request| {
            info!("[PULSAR] {} {}", req.method(), req.path());
            let start = Instant::now();
            let response = next(req);
            debug!(
                "[PULSAR] 处理完成：{}，用时{}ms",
                response.status_code(),
                start.elapsed().as_millis()
            );
            response
        })
    })
}

/// `:name` 转换为 matchit 的 `{name}`，`*name` 转换为 `{*name}`，字面量花括号转义。
fn to_matchit_pattern(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{}}}", name)
            } else {
                segment.replace('{', "{{").replace('}', "}}")
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
