/// 举手统计 HTTP 服务
///
/// 主程序入口 - 直接运行: cargo run --bin handcount-server --release
///
/// 接口:
/// - POST /analyze  multipart/form-data, 字段 `image` (可选 `annotate=false`)
/// - GET  /health
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;

use handcount::annotate::load_font;
use handcount::{HogSvmDetector, HttpServer, Pipeline, Settings};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 举手统计 HTTP 服务参数
#[derive(Parser, Debug)]
#[command(author, version, about = "Hand counter HTTP service", long_about = None)]
struct Args {
    /// JSON 配置文件
    #[arg(short, long, env = "HANDCOUNT_CONFIG")]
    config: Option<PathBuf>,

    /// 线性SVM模型文件 (覆盖配置文件)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// 监听地址 (覆盖配置文件)
    #[arg(short, long)]
    addr: Option<String>,

    /// 工作线程数 (覆盖配置文件)
    #[arg(short, long)]
    workers: Option<usize>,

    /// 打印生效的配置 (JSON) 后退出
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(model) = args.model {
        settings.analyzer.detector.model_path = model;
    }
    if let Some(addr) = args.addr {
        settings.server.addr = addr;
    }
    if let Some(workers) = args.workers {
        settings.server.workers = workers;
    }
    settings.validate()?;

    if args.print_config {
        println!("{}", settings.to_json()?);
        return Ok(());
    }
    settings.analyzer.print_summary();

    // 检测模型在启动时加载一次, 失败即退出
    let detector = HogSvmDetector::from_config(&settings.analyzer.detector)
        .context("cannot start without a person detector")?;
    let mut pipeline = Pipeline::new(Arc::new(detector));
    if let Some(path) = &settings.analyzer.annotator.font_path {
        pipeline = pipeline.with_font(load_font(path)?);
    }

    let server = HttpServer::new(settings.server, settings.analyzer, Arc::new(pipeline));
    let handle = server.spawn()?;
    println!("✅ 举手统计服务已启动: http://{}", handle.addr);
    println!("   POST /analyze  (multipart 字段: image)");
    println!("   GET  /health");

    handle.wait()
}
