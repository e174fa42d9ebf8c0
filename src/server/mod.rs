// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// HTTP 服务 (无状态, axum)
//
// 线程模型:
// - tokio 多线程运行时 (独立线程) 负责连接与 multipart 解析
// - 检测/分类在阻塞线程池执行 (最多 `workers` 个并发), 共享只读流水线

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};
use tokio::sync::watch;

use crate::config::{AnalyzerConfig, ServerConfig};
use crate::pipeline::Pipeline;

pub use self::routes::{create_router, AnalyzeResponse, ErrorResponse};

/// 运行中的服务句柄
#[derive(Debug)]
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerHandle {
    /// 停止接收新连接, 等待进行中的请求完成
    pub fn stop(mut self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.join_server()
    }

    /// 阻塞直到服务线程退出
    pub fn wait(mut self) -> Result<()> {
        self.join_server()
    }

    fn join_server(&mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("http server thread panicked"))??;
        }
        Ok(())
    }
}

pub struct HttpServer {
    config: ServerConfig,
    analyzer: Arc<AnalyzerConfig>,
    pipeline: Arc<Pipeline>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, analyzer: AnalyzerConfig, pipeline: Arc<Pipeline>) -> Self {
        Self {
            config,
            analyzer: Arc::new(analyzer),
            pipeline,
        }
    }

    /// 绑定监听地址并在后台线程启动服务
    ///
    /// 不能在 tokio 运行时内部调用
    pub fn spawn(self) -> Result<ServerHandle> {
        self.config.validate()?;
        self.analyzer.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.workers)
            .max_blocking_threads(self.config.workers)
            .thread_name("http-worker")
            .enable_all()
            .build()?;

        let listener =
            runtime.block_on(tokio::net::TcpListener::bind(self.config.addr.as_str()))?;
        let addr = listener.local_addr()?;
        let app = create_router(self.pipeline, self.analyzer, &self.config);

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let join = std::thread::Builder::new()
            .name("http-server".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            let _ = shutdown_rx.changed().await;
                            log::info!("HTTP 服务正在关闭");
                        })
                        .await
                })
            })?;

        log::info!("HTTP 服务已启动: http://{}", addr);
        Ok(ServerHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}
