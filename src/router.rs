// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由树与注册接口
//!
//! 应用代码在启动阶段通过本模块搭建一棵路由树：
//!
//! ```text
//! Router { prefix: "",     routes: [GET /ping] }
//!  └─ Router { prefix: "/api", middleware: auth, routes: [GET /api/me] }
//!      └─ Router { prefix: "/v1", routes: [POST /v1/users] }
//! ```
//!
//! 每次注册都会立即完成两件事：用本节点的中间件包装处理函数，并把本节点的前缀
//! 拼到 uri 前面。祖先节点的前缀与中间件不在注册时合并，而是在挂载
//! （[`crate::mount::Mux::mount`]）时沿遍历路径叠加，因此上例中的用户接口
//! 最终绑定在 `/api/v1/users`，处理函数为 `auth(raw)`。
//!
//! 注册只允许在单线程的启动阶段进行；挂载之后路由树只读。

use std::{fmt, sync::Arc};

use crate::{param::HttpRequestMethod, request::Request, response::Response};

/// 处理函数：请求到响应
pub type Handler = Arc<dyn Fn(Request) -> Response + Send + Sync>;

/// 中间件：把一个处理函数包装成另一个处理函数。
///
/// 中间件可以不调用内层处理函数而直接返回响应（例如鉴权失败），此时内层的
/// 副作用不会发生。框架本身不对处理函数施加超时，需要截止时间的应用可以
/// 提供自己的中间件。
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// 把闭包装箱为 [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(Request) -> Response + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 把闭包装箱为 [`Middleware`]
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 分组选项：路径前缀与可选的中间件。空前缀与缺省中间件都是合法的空操作。
#[derive(Clone, Default)]
pub struct Options {
    prefix: String,
    middleware: Option<Middleware>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn middleware<F>(mut self, f: F) -> Self
    where
        F: Fn(Handler) -> Handler + Send + Sync + 'static,
    {
        self.middleware = Some(Arc::new(f));
        self
    }

    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware = Some(middleware);
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("prefix", &self.prefix)
            .field("middleware", &self.middleware.is_some())
            .finish()
    }
}

/// 一条已注册的路由。路径已带上所在节点的前缀，处理函数已被所在节点的中间件包装。
#[derive(Clone)]
pub struct Route {
    method: HttpRequestMethod,
    path: String,
    handler: Handler,
}

impl Route {
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// 路由树节点，独占自己的路由与子节点，没有指向父节点的引用。
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    options: Options,
    children: Vec<Router>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            routes: Vec::new(),
            options,
            children: Vec::new(),
        }
    }

    pub fn get<F>(&mut self, uri: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.route(HttpRequestMethod::Get, uri, handler)
    }

    pub fn head<F>(&mut self, uri: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.route(HttpRequestMethod::Head, uri, handler)
    }

    pub fn post<F>(&mut self, uri: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.route(HttpRequestMethod::Post, uri, handler)
    }

    pub fn put<F>(&mut self, uri: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.route(HttpRequestMethod::Put, uri, handler)
    }

    pub fn patch<F>(&mut self, uri: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.route(HttpRequestMethod::Patch, uri, handler)
    }

    pub fn delete<F>(&mut self, uri: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        self.route(HttpRequestMethod::Delete, uri, handler)
    }

    /// 以任意方法注册。路径模式中 `:name` 为命名参数，`*name` 为末尾通配。
    pub fn route<F>(&mut self, method: HttpRequestMethod, uri: &str, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Response + Send + Sync + 'static,
    {
        let raw: Handler = Arc::new(handler);
        let handler = match &self.options.middleware {
            Some(m) => m(raw),
            None => raw,
        };
        self.routes.push(Route {
            method,
            path: [self.options.prefix.as_str(), uri].concat(),
            handler,
        });
        self
    }

    /// 新建一个带独立选项的子节点，交给 `build` 注册其中的路由后挂到本节点下。
    pub fn group<F>(&mut self, options: Options, build: F) -> &mut Self
    where
        F: FnOnce(&mut Router),
    {
        let mut child = Router::with_options(options);
        build(&mut child);
        self.children.push(child);
        self
    }
}

impl Router {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn children(&self) -> &[Router] {
        &self.children
    }

    pub fn prefix(&self) -> &str {
        &self.options.prefix
    }

    pub fn middleware(&self) -> Option<&Middleware> {
        self.options.middleware.as_ref()
    }

    /// 整棵子树中的路由总数
    pub fn route_count(&self) -> usize {
        self.routes.len() + self.children.iter().map(Router::route_count).sum::<usize>()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("options", &self.options)
            .field("routes", &self.routes)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn call(route: &Route) -> Response {
        (route.handler())(Request::new(route.method(), route.path()))
    }

    #[test]
    fn test_registration_applies_local_prefix() {
        let mut router = Router::with_options(Options::new().prefix("/api"));
        router
            .get("/users", |_| Response::text("list"))
            .post("/users", |_| Response::text("create"))
            .delete("/users/:id", |_| Response::text("delete"));

        let routes: Vec<_> = router
            .routes()
            .iter()
            .map(|r| (r.method(), r.path().to_string()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (HttpRequestMethod::Get, "/api/users".to_string()),
                (HttpRequestMethod::Post, "/api/users".to_string()),
                (HttpRequestMethod::Delete, "/api/users/:id".to_string()),
            ]
        );
    }

    #[test]
    fn test_every_method_helper() {
        let mut router = Router::new();
        router
            .get("/r", |_| Response::text(""))
            .head("/r", |_| Response::text(""))
            .post("/r", |_| Response::text(""))
            .put("/r", |_| Response::text(""))
            .patch("/r", |_| Response::text(""))
            .delete("/r", |_| Response::text(""));
        let methods: Vec<_> = router.routes().iter().map(Route::method).collect();
        assert_eq!(methods, HttpRequestMethod::ALL.to_vec());
    }

    #[test]
    fn test_group_creates_child_with_own_options() {
        let mut router = Router::new();
        router.get("/", |_| Response::text("root"));
        router.group(Options::new().prefix("/admin"), |admin| {
            admin.get("/dashboard", |_| Response::text("dash"));
            admin.group(Options::new().prefix("/users"), |users| {
                users.get("/:id", |_| Response::text("user"));
            });
        });

        assert_eq!(router.routes().len(), 1);
        assert_eq!(router.children().len(), 1);
        let admin = &router.children()[0];
        assert_eq!(admin.prefix(), "/admin");
        assert_eq!(admin.routes()[0].path(), "/admin/dashboard");
        // 子节点只带自己的前缀，祖先前缀在挂载时叠加
        assert_eq!(admin.children()[0].routes()[0].path(), "/users/:id");
        assert_eq!(router.route_count(), 3);
    }

    #[test]
    fn test_empty_prefix_and_no_middleware_are_noops() {
        let mut router = Router::new();
        router.group(Options::new(), |g| {
            g.get("/plain", |_| Response::text("plain"));
        });
        let child = &router.children()[0];
        assert!(child.middleware().is_none());
        assert_eq!(child.routes()[0].path(), "/plain");
        assert_eq!(call(&child.routes()[0]).status_code(), 200);
    }

    #[test]
    fn test_local_middleware_wraps_at_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        let options = Options::new().middleware(move |next: Handler| -> Handler {
            let seen = Arc::clone(&seen);
            Arc::new(move |req: Request| {
                seen.lock().unwrap().push("mw");
                next(req)
            })
        });

        let mut router = Router::with_options(options);
        let inner = Arc::clone(&log);
        router.get("/x", move |_| {
            inner.lock().unwrap().push("handler");
            Response::text("x")
        });

        call(&router.routes()[0]);
        assert_eq!(*log.lock().unwrap(), vec!["mw", "handler"]);
    }
}
