// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 候选框过滤: 置信度阈值 + 非极大值抑制 (NMS)

use crate::config::FilterConfig;
use crate::types::BoundingBox;

/// 两步过滤: 先丢弃低置信度框, 再做 NMS
///
/// 输出中任意两个框的 IoU 都不超过 `iou_threshold`; 对同一输入结果确定
pub fn filter(boxes: &[BoundingBox], config: &FilterConfig) -> Vec<BoundingBox> {
    let mut kept: Vec<BoundingBox> = boxes
        .iter()
        .filter(|b| b.confidence() >= config.min_confidence)
        .copied()
        .collect();
    non_max_suppression(&mut kept, config.iou_threshold);
    kept
}

/// 贪心 NMS (原地)
///
/// 稳定排序: 置信度相同时保持输入顺序, 靠前的框优先保留
pub fn non_max_suppression(xs: &mut Vec<BoundingBox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
