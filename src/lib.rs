// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # pulsar
//!
//! 一个小巧的 Web 框架：按前缀分组的路由树、可嵌套的中间件、类型化的响应
//! （文本、JSON、静态文件、模板），以及基于 Tokio 的服务端。
//!
//! ```no_run
//! use pulsar::{Config, Options, Response, Router, Server};
//!
//! # async fn demo() -> pulsar::Result<()> {
//! let mut router = Router::new();
//! router.get("/ping", |_| Response::text("pong"));
//! router.group(Options::new().prefix("/api"), |api| {
//!     api.get("/users/:id", |req| Response::text(req.param("id").unwrap_or("?")));
//! });
//!
//! Server::bind(Config::new(), &router).await?.run().await
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod exception;
pub mod mail;
pub mod mount;
pub mod param;
pub mod queue;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod template;
pub mod tls;
pub mod util;
pub mod views;
pub mod wire;

pub use config::Config;
pub use exception::{Exception, Result};
pub use mail::{Mail, MailTransport};
pub use mount::Mux;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use queue::{Job, WorkerPool};
pub use request::Request;
pub use response::{Rendered, Response, ResponseKind};
pub use router::{handler, middleware, Handler, Middleware, Options, Router};
pub use server::Server;
pub use views::Views;
