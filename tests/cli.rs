use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{Rgb, RgbImage};
use serde_json::Value;
use tempfile::TempDir;

const DESCRIPTOR_LEN: usize = 3780;

fn handcount(args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_handcount"));
    for var in [
        "HANDCOUNT_CONFIG",
        "HANDCOUNT_MODEL",
        "HANDCOUNT_FONT",
        "HANDCOUNT_ADDR",
        "HANDCOUNT_WORKERS",
    ] {
        cmd.env_remove(var);
    }
    cmd.args(args).output().unwrap()
}

/// 模型文件 (全零权重, 每个窗口得分 2.0) + 一张上部为棋盘格的单人图像
fn fixture() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();

    let model = dir.path().join("people.txt");
    let mut coefficients = "0.0\n".repeat(DESCRIPTOR_LEN);
    coefficients.push_str("2.0\n");
    std::fs::write(&model, coefficients).unwrap();

    let image = dir.path().join("person.png");
    RgbImage::from_fn(64, 128, |x, y| {
        if y < 52 && ((x / 8) + (y / 8)) % 2 == 0 {
            Rgb([255, 255, 255])
        } else if y < 52 {
            Rgb([0, 0, 0])
        } else {
            Rgb([100, 100, 100])
        }
    })
    .save(&image)
    .unwrap();

    (dir, model, image)
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn missing_image_exits_with_failure() {
    let output = handcount(&["/nonexistent/classroom.jpg"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: Image file not found"), "{}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn prints_statistics_block() {
    let (dir, model, image) = fixture();
    let annotated = dir.path().join("annotated.png");
    let output = handcount(&[
        arg(&image),
        "--model",
        arg(&model),
        "--annotate",
        arg(&annotated),
    ]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("HAND COUNTER RESULTS"));
    assert!(stdout.contains("Total people detected: 1"));
    assert!(stdout.contains("People with hands raised: 1"));
    assert!(stdout.contains("People with hands down: 0"));
    assert!(stdout.contains("  - Hands raised: 100.0%"));
    assert!(stdout.contains("  - Hands down: 0.0%"));

    let saved = image::open(&annotated).unwrap();
    assert_eq!((saved.width(), saved.height()), (64, 128));
}

#[test]
fn json_report() {
    let (_dir, model, image) = fixture();
    let output = handcount(&[arg(&image), "--model", arg(&model), "--json", "--details"]);
    assert_eq!(output.status.code(), Some(0));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["results"]["total_people"], 1);
    assert_eq!(report["results"]["hands_raised"], 1);
    assert_eq!(report["detections"].as_array().map(Vec::len), Some(1));
}

#[test]
fn missing_model_exits_with_failure() {
    let (_dir, _model, image) = fixture();
    let output = handcount(&[arg(&image), "--model", "/nonexistent/people.txt"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error processing image"), "{}", stderr);
}
