//! HOG 特征 (Histogram of Oriented Gradients)
//!
//! Dalal-Triggs 行人描述子, 计算方式与 OpenCV `HOGDescriptor` 默认参数一致:
//! - 窗口 64×128, 细胞 8×8, 块 16×16 (2×2 细胞), 块步长 8
//! - 9 个无符号方向 bin (0°~180°), 相邻 bin 线性插值
//! - 像素值先做 sqrt gamma 校正, 边界按 reflect-101 延拓
//! - 块内像素按高斯窗 (sigma = 4) 加权, 并双线性分配到相邻细胞
//! - 块内 L2-Hys 归一化
//!
//! 描述子按列优先 (先 x 后 y) 排列块与块内细胞, 因此 OpenCV
//! `getDefaultPeopleDetector()` 导出的系数可以直接使用.
//!
//! 块特征只依赖块在图像中的位置, 每层金字塔计算一次 (`BlockGrid`),
//! 各窗口只需按偏移拼接.

use std::f32::consts::PI;

use image::RgbImage;
use ndarray::{s, Array1, Array2, Array3};

const L2HYS_CLIP: f32 = 0.2;

/// HOG 描述子参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HogDescriptor {
    pub window_width: usize,
    pub window_height: usize,
    pub cell_size: usize,
    pub block_cells: usize, // 每个块边长包含的细胞数
    pub block_stride: usize,
    pub bins: usize,
}

impl Default for HogDescriptor {
    fn default() -> Self {
        Self {
            window_width: 64,
            window_height: 128,
            cell_size: 8,
            block_cells: 2,
            block_stride: 8,
            bins: 9,
        }
    }
}

/// 单层金字塔图像的梯度场
///
/// 每个像素预先拆分为相邻两个方向 bin 的加权幅值
pub struct GradientField {
    width: usize,
    height: usize,
    bin: Vec<u16>,
    weight_lo: Vec<f32>,
    weight_hi: Vec<f32>,
}

impl GradientField {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

/// 单层金字塔上所有块位置 (步长 = 块步长) 的归一化块特征
pub struct BlockGrid {
    width: usize,
    height: usize,
    values: Array3<f32>, // (块列, 块行, 块特征)
}

impl BlockGrid {
    /// 对应图像的宽度 (像素)
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

impl HogDescriptor {
    fn blocks_x(&self) -> usize {
        (self.window_width - self.block_size()) / self.block_stride + 1
    }

    fn blocks_y(&self) -> usize {
        (self.window_height - self.block_size()) / self.block_stride + 1
    }

    fn block_size(&self) -> usize {
        self.cell_size * self.block_cells
    }

    fn block_len(&self) -> usize {
        self.block_cells * self.block_cells * self.bins
    }

    /// 描述子长度 (默认参数下为 3780)
    pub fn descriptor_len(&self) -> usize {
        self.blocks_x() * self.blocks_y() * self.block_len()
    }

    /// 计算梯度场: sqrt gamma, 中心差分 [-1, 0, 1], 每个像素取幅值最大的颜色通道
    pub fn gradients(&self, image: &RgbImage) -> GradientField {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let raw = image.as_raw();
        let lut: Vec<f32> = (0..256).map(|v| (v as f32).sqrt()).collect();
        let angle_scale = self.bins as f32 / PI;

        let mut bin = vec![0u16; w * h];
        let mut weight_lo = vec![0.0f32; w * h];
        let mut weight_hi = vec![0.0f32; w * h];

        let px = |x: usize, y: usize, c: usize| lut[raw[(y * w + x) * 3 + c] as usize];

        for y in 0..h {
            let (y0, y1) = (reflect101(y as isize - 1, h), reflect101(y as isize + 1, h));
            for x in 0..w {
                let (x0, x1) = (reflect101(x as isize - 1, w), reflect101(x as isize + 1, w));

                // 通道顺序 R, G, B; 幅值相同时保留先出现的通道
                let mut best = (0.0f32, 0.0f32, 0.0f32);
                for c in 0..3 {
                    let dx = px(x1, y, c) - px(x0, y, c);
                    let dy = px(x, y1, c) - px(x, y0, c);
                    let mag2 = dx * dx + dy * dy;
                    if c == 0 || mag2 > best.0 {
                        best = (mag2, dx, dy);
                    }
                }
                let (mag2, dx, dy) = best;
                if mag2 == 0.0 {
                    continue;
                }

                let magnitude = mag2.sqrt();
                let mut angle = dy.atan2(dx);
                if angle < 0.0 {
                    angle += 2.0 * PI;
                }

                // bin 中心位于 (i + 0.5) * 20°, 角度按 180° 周期回绕
                let pos = angle * angle_scale - 0.5;
                let lo = pos.floor();
                let frac = pos - lo;
                let lo = (lo as i32).rem_euclid(self.bins as i32) as usize;

                let idx = y * w + x;
                bin[idx] = lo as u16;
                weight_lo[idx] = magnitude * (1.0 - frac);
                weight_hi[idx] = magnitude * frac;
            }
        }

        GradientField {
            width: w,
            height: h,
            bin,
            weight_lo,
            weight_hi,
        }
    }

    /// 块内每个像素对各细胞的投票权重 (高斯窗 × 双线性插值)
    ///
    /// 形状 (像素, 细胞), 像素按行优先, 细胞按列优先
    fn pixel_weights(&self) -> Array2<f32> {
        let size = self.block_size();
        let ncells = self.block_cells * self.block_cells;
        let sigma = (2 * size) as f32 / 8.0;
        let gauss_scale = 1.0 / (2.0 * sigma * sigma);

        // 一维: 像素 p 对细胞 c 的插值权重, 块外细胞丢弃
        let axis = |p: usize, c: usize| -> f32 {
            let pos = (p as f32 + 0.5) / self.cell_size as f32 - 0.5;
            let c0 = pos.floor();
            let frac = pos - c0;
            match c as i64 - c0 as i64 {
                0 => 1.0 - frac,
                1 => frac,
                _ => 0.0,
            }
        };

        let mut weights = Array2::<f32>::zeros((size * size, ncells));
        for py in 0..size {
            let dy = py as f32 - size as f32 * 0.5;
            for px in 0..size {
                let dx = px as f32 - size as f32 * 0.5;
                let gauss = (-(dx * dx + dy * dy) * gauss_scale).exp();
                for cx in 0..self.block_cells {
                    for cy in 0..self.block_cells {
                        weights[[py * size + px, cx * self.block_cells + cy]] =
                            gauss * axis(px, cx) * axis(py, cy);
                    }
                }
            }
        }
        weights
    }

    /// 左上角位于 (x0, y0) 的块的原始 (未归一化) 直方图
    fn block_histogram(
        &self,
        field: &GradientField,
        weights: &Array2<f32>,
        x0: usize,
        y0: usize,
        hist: &mut [f32],
    ) {
        hist.fill(0.0);
        let size = self.block_size();
        for py in 0..size {
            let row = (y0 + py) * field.width + x0;
            for px in 0..size {
                let idx = row + px;
                let (wl, wh) = (field.weight_lo[idx], field.weight_hi[idx]);
                if wl == 0.0 && wh == 0.0 {
                    continue;
                }
                let lo = field.bin[idx] as usize;
                let hi = (lo + 1) % self.bins;
                for (cell, w) in weights.row(py * size + px).iter().enumerate() {
                    if *w == 0.0 {
                        continue;
                    }
                    hist[cell * self.bins + lo] += wl * w;
                    hist[cell * self.bins + hi] += wh * w;
                }
            }
        }
    }

    /// 计算整层图像上所有块位置的归一化特征
    pub fn block_grid(&self, field: &GradientField) -> BlockGrid {
        let size = self.block_size();
        let count = |len: usize| {
            if len < size {
                0
            } else {
                (len - size) / self.block_stride + 1
            }
        };
        let (nx, ny) = (count(field.width), count(field.height));
        let weights = self.pixel_weights();

        let mut values = Array3::<f32>::zeros((nx, ny, self.block_len()));
        let mut hist = vec![0.0f32; self.block_len()];
        for gx in 0..nx {
            for gy in 0..ny {
                self.block_histogram(
                    field,
                    &weights,
                    gx * self.block_stride,
                    gy * self.block_stride,
                    &mut hist,
                );
                l2_hys(&mut hist);
                values
                    .slice_mut(s![gx, gy, ..])
                    .assign(&ndarray::ArrayView1::from(&hist[..]));
            }
        }

        BlockGrid {
            width: field.width,
            height: field.height,
            values,
        }
    }

    /// 把 (x0, y0) 处窗口的描述子写入 `out`
    ///
    /// 调用方保证窗口完全位于图像内, 且 x0, y0 是块步长的整数倍
    pub fn fill_descriptor(&self, grid: &BlockGrid, x0: usize, y0: usize, out: &mut Array1<f32>) {
        debug_assert!(x0 + self.window_width <= grid.width);
        debug_assert!(y0 + self.window_height <= grid.height);
        debug_assert!(x0 % self.block_stride == 0 && y0 % self.block_stride == 0);
        debug_assert_eq!(out.len(), self.descriptor_len());

        let (gx0, gy0) = (x0 / self.block_stride, y0 / self.block_stride);
        let block_len = self.block_len();
        let mut offset = 0;
        for bx in 0..self.blocks_x() {
            for by in 0..self.blocks_y() {
                out.slice_mut(s![offset..offset + block_len])
                    .assign(&grid.values.slice(s![gx0 + bx, gy0 + by, ..]));
                offset += block_len;
            }
        }
    }

    /// 计算 (x0, y0) 处窗口的描述子
    pub fn compute(&self, grid: &BlockGrid, x0: usize, y0: usize) -> Array1<f32> {
        let mut descriptor = Array1::<f32>::zeros(self.descriptor_len());
        self.fill_descriptor(grid, x0, y0, &mut descriptor);
        descriptor
    }

    /// 整幅图像 (至少一个窗口大小) 左上角窗口的描述子
    pub fn describe(&self, image: &RgbImage) -> Array1<f32> {
        let grid = self.block_grid(&self.gradients(image));
        self.compute(&grid, 0, 0)
    }
}

/// reflect-101 边界: -1 → 1, n → n - 2
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    let i = if i < 0 { -i } else { i };
    let i = if i > last { 2 * last - i } else { i };
    i as usize
}

/// L2-Hys: L2 归一化 → 截断 0.2 → 再次归一化
fn l2_hys(block: &mut [f32]) {
    let eps = 0.1 * block.len() as f32;
    let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt();
    let scale = 1.0 / (norm + eps);
    for v in block.iter_mut() {
        *v = (*v * scale).min(L2HYS_CLIP);
    }

    let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt();
    let scale = 1.0 / (norm + 1e-3);
    for v in block.iter_mut() {
        *v *= scale;
    }
}
