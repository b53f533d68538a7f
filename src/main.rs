// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示服务
//!
//! 读取 `config/pulsar.toml` 与 `config/log4rs.yaml`，搭建一棵示例路由树并启动服务端：
//!
//! - `GET /ping` 存活检查
//! - `/api` 分组：JSON 接口
//! - `/admin` 分组：需要 `X-Admin-Token` 请求头的管理接口

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use log::{error, info};
use serde_derive::{Deserialize, Serialize};
use serde_json::json;
use tokio::runtime::Builder;

use pulsar::{
    handler, mail::deliver, Config, Handler, Job, Mail, MailTransport, Options, Request, Response,
    Router, Server, WorkerPool,
};

const ADMIN_TOKEN: &str = "let-me-in";

#[derive(Debug, Deserialize, Serialize)]
struct NewUser {
    name: String,
    email: String,
}

/// 只写日志的投递通道，演示环境不连接真实的邮件服务器
struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, mail: &Mail) -> pulsar::Result<()> {
        info!(
            "[MAIL] {} -> {}",
            mail.subject_line(),
            mail.recipients().collect::<Vec<_>>().join(", ")
        );
        Ok(())
    }
}

fn main() {
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
        std::process::exit(1);
    }

    let config = match Config::from_toml("config/pulsar.toml") {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.server.worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            std::process::exit(1);
        }
    };

    let pool = WorkerPool::new(config.queue.workers, runtime.handle().clone());
    let router = routes(pool, &config);

    let result = runtime.block_on(async move {
        let server = Server::bind(config, &router).await?;
        server.run().await
    });
    if let Err(e) = result {
        error!("服务端异常退出：{}", e);
        std::process::exit(1);
    }
}

fn routes(pool: WorkerPool, config: &Config) -> Router {
    let mut router = Router::new();
    router.get("/", |_| Response::view("index.html", &json!({ "title": "pulsar" })));
    router.get("/ping", |_| Response::text("pong"));
    router.get("/assets/*file", |req: Request| {
        Response::static_file(req.param("file").unwrap_or_default())
    });

    let mail = Mail::from_config(&config.mail);
    router.group(Options::new().prefix("/api"), move |api| {
        api.get("/users/:id", |req: Request| match req.param("id") {
            Ok(id) => Response::json(&json!({ "id": id })),
            Err(e) => Response::text_with_code(e.to_string(), 400),
        });
        api.post("/users", move |req: Request| match req.json::<NewUser>() {
            Ok(user) => {
                let welcome = mail
                    .clone()
                    .to(&user.email)
                    .subject("Welcome")
                    .text(&format!("Hello, {}!", user.name));
                let job = Job::new(move || {
                    if let Err(e) = deliver(&LogTransport, &welcome) {
                        error!("欢迎邮件发送失败：{}", e);
                    }
                });
                if let Err(e) = job.dispatch(&pool) {
                    error!("{}", e);
                }
                Response::json_with_code(&user, 201)
            }
            Err(e) => Response::text_with_code(e.to_string(), 400),
        });
    });

    let served = Arc::new(AtomicU64::new(0));
    router.group(
        Options::new().prefix("/admin").middleware(require_token),
        move |admin| {
            admin.get("/dashboard", move |_| {
                let count = served.fetch_add(1, Ordering::SeqCst) + 1;
                Response::view("dashboard.html", &json!({ "visits": count }))
            });
        },
    );
    router
}

/// 缺少或错误的 `X-Admin-Token` 直接返回 403，不调用内层处理函数
fn require_token(next: Handler) -> Handler {
    handler(move |req: Request| {
        if req.header("X-Admin-Token") == Some(ADMIN_TOKEN) {
            next(req)
        } else {
            Response::text_with_code("Forbidden", 403)
        }
    })
}
