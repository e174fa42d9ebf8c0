// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use crate::types::{AnalysisResult, PersonDetection};

/// 汇总统计: 人数 / 举手数 / 百分比
///
/// 没有检测到人时两个比例都为 0, 而不是 NaN
pub fn aggregate(detections: &[PersonDetection]) -> AnalysisResult {
    let total_people = detections.len();
    let hands_raised = detections
        .iter()
        .filter(|d| d.hand_state.is_raised())
        .count();
    let hands_down = total_people - hands_raised;

    let (raised_proportion, down_proportion) = if total_people > 0 {
        (
            100.0 * hands_raised as f64 / total_people as f64,
            100.0 * hands_down as f64 / total_people as f64,
        )
    } else {
        (0.0, 0.0)
    };

    AnalysisResult {
        total_people,
        hands_raised,
        hands_down,
        raised_proportion,
        down_proportion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, HandState};

    fn people(states: &[HandState]) -> Vec<PersonDetection> {
        states
            .iter()
            .enumerate()
            .map(|(i, s)| {
                PersonDetection::new(
                    BoundingBox::new(i as f32 * 70.0, 0.0, 64.0, 128.0, 0.8),
                    *s,
                )
            })
            .collect()
    }

    #[test]
    fn test_no_people() {
        let r = aggregate(&[]);
        assert_eq!(r.total_people, 0);
        assert_eq!(r.hands_raised, 0);
        assert_eq!(r.hands_down, 0);
        assert_eq!(r.raised_proportion, 0.0);
        assert_eq!(r.down_proportion, 0.0);
    }

    #[test]
    fn test_single_raised() {
        let r = aggregate(&people(&[HandState::Raised]));
        assert_eq!((r.total_people, r.hands_raised, r.hands_down), (1, 1, 0));
        assert_eq!(r.raised_proportion, 100.0);
        assert_eq!(r.down_proportion, 0.0);
    }

    #[test]
    fn test_counts_and_proportions_sum() {
        use HandState::*;
        for states in [
            vec![Raised, Down, Down],
            vec![Down; 7],
            vec![Raised, Raised, Down, Raised, Down, Down, Raised],
        ] {
            let r = aggregate(&people(&states));
            assert_eq!(r.hands_raised + r.hands_down, r.total_people);
            assert!((r.raised_proportion + r.down_proportion - 100.0).abs() < 1e-6);
        }

        let r = aggregate(&people(&[Raised, Down, Down]));
        assert!((r.raised_proportion - 100.0 / 3.0).abs() < 1e-9);
    }
}
