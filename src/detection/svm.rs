//! 线性SVM人体分类器权重
//!
//! 支持两种文件格式:
//! - `*.json`: `{"weights": [...], "bias": -0.66}`
//! - 其他: 空白或逗号分隔的浮点数, 最后一个数为偏置 (OpenCV `getDefaultPeopleDetector()` 导出格式)

use ndarray::Array1;
use serde::Deserialize;
use std::path::Path;

use crate::error::{HandCountError, Result};

#[derive(Deserialize)]
struct SvmModelFile {
    weights: Vec<f32>,
    bias: f32,
}

/// 线性SVM: score = w · x + b
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSvm {
    weights: Array1<f32>,
    bias: f32,
}

impl LinearSvm {
    /// 直接由权重构造, 长度必须等于描述子长度
    pub fn new(weights: Vec<f32>, bias: f32, descriptor_len: usize) -> Result<Self> {
        if weights.len() != descriptor_len {
            return Err(HandCountError::DetectorUnavailable(format!(
                "model has {} weights, descriptor expects {}",
                weights.len(),
                descriptor_len
            )));
        }
        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(HandCountError::DetectorUnavailable(
                "model contains non-finite coefficients".to_string(),
            ));
        }
        Ok(Self {
            weights: Array1::from_vec(weights),
            bias,
        })
    }

    /// 从文件加载模型
    pub fn load(path: &Path, descriptor_len: usize) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HandCountError::DetectorUnavailable(format!(
                "failed to read model {}: {}",
                path.display(),
                e
            ))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let (weights, bias) = if is_json {
            let file: SvmModelFile = serde_json::from_str(&raw).map_err(|e| {
                HandCountError::DetectorUnavailable(format!(
                    "invalid model {}: {}",
                    path.display(),
                    e
                ))
            })?;
            (file.weights, file.bias)
        } else {
            parse_coefficients(&raw).map_err(|e| {
                HandCountError::DetectorUnavailable(format!(
                    "invalid model {}: {}",
                    path.display(),
                    e
                ))
            })?
        };

        Self::new(weights, bias, descriptor_len)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// SVM 原始分数 (到分类超平面的有符号距离)
    pub fn score(&self, descriptor: &Array1<f32>) -> f32 {
        self.weights.dot(descriptor) + self.bias
    }
}

fn parse_coefficients(raw: &str) -> std::result::Result<(Vec<f32>, f32), String> {
    let mut values = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f32>()
                .map_err(|_| format!("'{}' is not a number", tok))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let bias = values.pop().ok_or_else(|| "model file is empty".to_string())?;
    Ok((values, bias))
}

/// SVM 分数映射到 [0, 1] 置信度
pub fn score_to_confidence(score: f32) -> f32 {
    1.0 / (1.0 + (-score).exp())
}
