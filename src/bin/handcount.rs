/// 举手统计命令行工具
///
/// 主程序入口 - 直接运行: cargo run --bin handcount --release -- classroom.jpg
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use serde::Serialize;

use handcount::annotate::load_font;
use handcount::{
    Analysis, AnalysisResult, ClassifierMethod, HogSvmDetector, PersonDetection, Pipeline,
    Settings,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 统计图像中的人数与举手人数
#[derive(Parser, Debug)]
#[command(author, version, about = "Count people and raised hands in an image", long_about = None)]
struct Args {
    /// 图像文件路径
    image: PathBuf,

    /// JSON 配置文件
    #[arg(short, long, env = "HANDCOUNT_CONFIG")]
    config: Option<PathBuf>,

    /// 线性SVM模型文件 (覆盖配置文件)
    #[arg(short, long, env = "HANDCOUNT_MODEL")]
    model: Option<PathBuf>,

    /// 检测框最低置信度
    #[arg(long)]
    min_confidence: Option<f32>,

    /// NMS IoU 阈值
    #[arg(long)]
    iou_threshold: Option<f32>,

    /// 上部区域边缘密度阈值
    #[arg(long)]
    density_threshold: Option<f32>,

    /// 上部分析区域占检测框高度的比例
    #[arg(long)]
    upper_fraction: Option<f32>,

    /// 举手判定方法: edge-density 或 region-contrast
    #[arg(long)]
    method: Option<ClassifierMethod>,

    /// 标注图输出路径
    #[arg(short, long)]
    annotate: Option<PathBuf>,

    /// 打印每个检测结果
    #[arg(long)]
    details: bool,

    /// 以 JSON 格式输出统计结果
    #[arg(long)]
    json: bool,
}

/// `--json` 输出
#[derive(Serialize)]
struct Report<'a> {
    results: &'a AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    detections: Option<&'a [PersonDetection]>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !args.image.exists() {
        eprintln!("Error: Image file not found: {}", args.image.display());
        return ExitCode::FAILURE;
    }

    if !args.json {
        println!("Processing image: {}", args.image.display());
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error processing image: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let settings = load_settings(args)?;
    let config = &settings.analyzer;

    let detector = HogSvmDetector::from_config(&config.detector)?;
    let mut pipeline = Pipeline::new(Arc::new(detector));
    if let Some(path) = &config.annotator.font_path {
        pipeline = pipeline.with_font(load_font(path)?);
    }

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;

    if !args.json {
        println!("Detecting people and analyzing hand positions...");
    }
    let analysis = pipeline.analyze_bytes(&bytes, config, args.annotate.is_some())?;

    if args.json {
        let report = Report {
            results: &analysis.result,
            detections: args.details.then_some(analysis.detections.as_slice()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_results(&analysis.result);
        if args.details {
            print_details(&analysis);
        }
    }

    if let (Some(path), Some(annotated)) = (&args.annotate, &analysis.annotated) {
        annotated
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        if !args.json {
            println!("Annotated image saved to: {}", path.display());
        }
    }
    Ok(())
}

/// 默认值 → 配置文件 → 环境变量 → 命令行参数
fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;
    let config = &mut settings.analyzer;

    if let Some(model) = &args.model {
        config.detector.model_path = model.clone();
    }
    if let Some(v) = args.min_confidence {
        config.filter.min_confidence = v;
    }
    if let Some(v) = args.iou_threshold {
        config.filter.iou_threshold = v;
    }
    if let Some(v) = args.density_threshold {
        config.classifier.edge_density_threshold = v;
    }
    if let Some(v) = args.upper_fraction {
        config.classifier.upper_region_fraction = v;
    }
    if let Some(method) = args.method {
        config.classifier.method = method;
    }

    settings.validate()?;
    Ok(settings)
}

fn print_results(results: &AnalysisResult) {
    println!("\n{}", "=".repeat(50));
    println!("HAND COUNTER RESULTS");
    println!("{}", "=".repeat(50));
    println!("\nTotal people detected: {}", results.total_people);
    println!("\nPeople with hands raised: {}", results.hands_raised);
    println!("People with hands down: {}", results.hands_down);
    println!("\nProportions:");
    println!("  - Hands raised: {:.1}%", results.raised_proportion);
    println!("  - Hands down: {:.1}%", results.down_proportion);
    println!("{}\n", "=".repeat(50));
}

fn print_details(analysis: &Analysis) {
    println!("Detections:");
    for (i, d) in analysis.detections.iter().enumerate() {
        println!(
            "  #{} [x={:.0}, y={:.0}, w={:.0}, h={:.0}] conf={:.2} → {}",
            i + 1,
            d.bbox.x(),
            d.bbox.y(),
            d.bbox.width(),
            d.bbox.height(),
            d.bbox.confidence(),
            d.hand_state.label()
        );
    }
}
