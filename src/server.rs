// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 异步 HTTP 服务端
//!
//! 基于 Tokio 的监听循环。每个连接在独立的任务中处理：
//!
//! 1. 读取完整报文（报文头加上 `Content-Length` 指定长度的请求体）；
//! 2. 解析请求行与请求头，失败时直接写回 4xx；
//! 3. 在阻塞线程池上分发、调用处理函数并渲染响应；
//! 4. 按需压缩后写回，然后关闭连接。
//!
//! 路由在绑定端口之前挂载，注册错误会使启动失败。

use std::{
    net::SocketAddr,
    sync::Arc,
    time::Instant,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;

use crate::{
    config::Config,
    exception::Result,
    mount::Mux,
    param::{HttpRequestMethod, SERVER_NAME},
    response::Rendered,
    router::Router,
    tls,
    views::Views,
    wire::{self, RawRequest},
};

/// 所有连接任务共享的只读状态
struct Shared {
    mux: Mux,
    views: Views,
    config: Config,
}

/// 已挂载路由并绑定端口的服务端
pub struct Server {
    shared: Arc<Shared>,
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl Server {
    /// 挂载路由、准备证书并绑定监听地址。
    pub async fn bind(config: Config, router: &Router) -> Result<Self> {
        let mux = Mux::mount(router, config.server.development).map_err(|e| {
            error!("路由挂载失败：{}", e);
            e
        })?;

        let tls = if config.certificate.enabled {
            Some(tls::acceptor(&config.certificate)?)
        } else {
            None
        };

        let address = config.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            error!("无法绑定地址：{}，错误：{}", address, e);
            e
        })?;
        info!("服务端将在{}上监听Socket连接", listener.local_addr()?);

        let views = Views::with_cache_capacity(&config.views.path, config.views.cache_size);
        info!("视图根目录：{}", views.root().display());

        if config.server.development {
            print_banner(&config, &mux, listener.local_addr()?, tls.is_some());
        }

        Ok(Self {
            shared: Arc::new(Shared { mux, views, config }),
            listener,
            tls,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn mux(&self) -> &Mux {
        &self.shared.mux
    }

    /// 主事件循环：持续接收新连接并分发到独立任务。
    pub async fn run(self) -> Result<()> {
        let mut id: u128 = 0;
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("接收连接失败：{}", e);
                    continue;
                }
            };
            debug!("[ID{}]TCP连接已建立：{}", id, addr);

            let shared = Arc::clone(&self.shared);
            match &self.tls {
                Some(acceptor) => {
                    let acceptor = acceptor.clone();
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(stream) => handle_connection(stream, id, shared).await,
                            Err(e) => warn!("[ID{}]TLS握手失败：{}", id, e),
                        }
                    });
                }
                None => {
                    tokio::spawn(handle_connection(stream, id, shared));
                }
            }
            id += 1;
        }
    }
}

/// 处理单个连接的完整生命周期
async fn handle_connection<S>(mut stream: S, id: u128, shared: Arc<Shared>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let start_time = Instant::now();
    let max_size = shared.config.server.max_request_size;

    let buffer = match wire::read_request(&mut stream, max_size, id).await {
        Ok(Some(buffer)) => buffer,
        Ok(None) => {
            debug!("[ID{}]客户端未发送数据即关闭连接", id);
            return;
        }
        Err(e) => {
            warn!("[ID{}]读取请求失败：{}", id, e);
            let rendered = Rendered::plain(e.status_code(), &e.to_string());
            write_response(&mut stream, &rendered, false, id).await;
            return;
        }
    };

    let raw = match RawRequest::try_from(&buffer, id) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败：{}", id, e);
            let rendered = Rendered::plain(e.status_code(), &e.to_string());
            write_response(&mut stream, &rendered, false, id).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let head_only = raw.method() == HttpRequestMethod::Head;
    let accept_encoding = raw.accept_encoding();
    let summary = format!(
        "{}, {}, {}, {}",
        raw.version(),
        raw.method(),
        raw.target(),
        raw.user_agent()
    );

    // 处理函数可能阻塞，放到阻塞线程池执行
    let worker = Arc::clone(&shared);
    let rendered = match tokio::task::spawn_blocking(move || {
        worker.mux.handle(&raw, &worker.views, id)
    })
    .await
    {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("[ID{}]处理函数异常终止：{}", id, e);
            Rendered::plain(500, "Internal Server Error")
        }
    };

    let rendered = if shared.config.server.compression {
        rendered.compress(&accept_encoding)
    } else {
        rendered
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );
    info!("[ID{}] {}, {}", id, summary, rendered.status_code());

    write_response(&mut stream, &rendered, head_only, id).await;
}

async fn write_response<S>(stream: &mut S, rendered: &Rendered, head_only: bool, id: u128)
where
    S: AsyncWrite + Unpin,
{
    let bytes = rendered.as_bytes(head_only);
    debug!("[ID{}]发送响应，长度：{}", id, bytes.len());
    if let Err(e) = stream.write_all(&bytes).await {
        error!("[ID{}]发送响应失败：{}", id, e);
        return;
    }
    if let Err(e) = stream.flush().await {
        debug!("[ID{}]刷新连接失败：{}", id, e);
    }
    if let Err(e) = stream.shutdown().await {
        debug!("[ID{}]关闭连接失败：{}", id, e);
    }
}

fn print_banner(config: &Config, mux: &Mux, addr: SocketAddr, secure: bool) {
    let scheme = if secure { "https" } else { "http" };
    println!("== {} (development) ==", SERVER_NAME);
    println!("listening on {}://{}", scheme, addr);
    println!("views: {}", config.views.path.display());
    for binding in mux.bindings() {
        println!("  {:<7} {}", binding.method().to_string(), binding.path());
    }
    println!("====================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use tokio::io::{duplex, AsyncReadExt};

    fn shared(router: &Router) -> Arc<Shared> {
        let mut config = Config::default();
        config.server.max_request_size = 256;
        Arc::new(Shared {
            mux: Mux::mount(router, false).unwrap(),
            views: Views::new("views"),
            config,
        })
    }

    async fn exchange(shared: Arc<Shared>, request: &[u8]) -> String {
        let (mut client, server) = duplex(64 * 1024);
        let task = tokio::spawn(handle_connection(server, 0, shared));
        client.write_all(request).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        task.await.unwrap();
        String::from_utf8_lossy(&response).to_string()
    }

    #[tokio::test]
    async fn test_connection_roundtrip() {
        let mut router = Router::new();
        router.get("/ping", |_| Response::text("pong"));
        let response = exchange(shared(&router), b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Server: pulsar\r\n"));
        assert!(response.ends_with("\r\n\r\npong"));
    }

    #[tokio::test]
    async fn test_head_omits_body() {
        let mut router = Router::new();
        router.head("/ping", |_| Response::text("pong"));
        let response = exchange(shared(&router), b"HEAD /ping HTTP/1.1\r\n\r\n").await;
        assert!(response.contains("Content-Length: 4\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_malformed_request_gets_400() {
        let response = exchange(shared(&Router::new()), b"garbage\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400"));
    }

    #[tokio::test]
    async fn test_oversized_request_gets_413() {
        let mut request = b"POST /upload HTTP/1.1\r\nContent-Length: 4096\r\n\r\n".to_vec();
        request.extend(std::iter::repeat(b'a').take(64));
        let response = exchange(shared(&Router::new()), &request).await;
        assert!(response.starts_with("HTTP/1.1 413"));
    }

    #[tokio::test]
    async fn test_panicking_handler_gets_500() {
        let mut router = Router::new();
        router.get("/boom", |_| panic!("handler failure"));
        let response = exchange(shared(&router), b"GET /boom HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 500"));
    }

    /// 写入成功但刷新与关闭都失败的连接
    struct BrokenClose {
        written: Vec<u8>,
    }

    impl AsyncWrite for BrokenClose {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.written.extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::NotConnected.into()))
        }
    }

    #[tokio::test]
    async fn test_close_errors_do_not_abort_response() {
        let mut stream = BrokenClose { written: Vec::new() };
        let rendered = Rendered::plain(200, "done");
        write_response(&mut stream, &rendered, false, 7).await;
        let text = String::from_utf8_lossy(&stream.written).to_string();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("done"));
    }
}
