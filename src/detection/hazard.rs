// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 路面隐患汇总 (每tick重新计算, 不锁存)

use super::types::Detection;
use crate::config::ControllerConfig;

/// 单条车道本tick的隐患结果
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HazardReport {
    pub flagged: bool,
    pub hits: usize,
}

/// 隐患汇总器 (无状态)
#[derive(Clone, Debug)]
pub struct HazardAggregator {
    class_id: u32,
    conf_threshold: f32,
}

impl HazardAggregator {
    pub fn new(class_id: u32, conf_threshold: f32) -> Self {
        Self {
            class_id,
            conf_threshold,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.hazard_class_id, config.hazard_conf_threshold)
    }

    /// 至少一个隐患类别检测的置信度严格大于阈值时置位
    pub fn evaluate(&self, detections: &[Detection]) -> HazardReport {
        let hits = detections
            .iter()
            .filter(|d| d.class_id == self.class_id && d.confidence > self.conf_threshold)
            .count();
        HazardReport {
            flagged: hits > 0,
            hits,
        }
    }
}

/// 全局隐患横幅: 扫描开启且任一车道置位
pub fn any_hazard<I>(flags: I, scanning: bool) -> bool
where
    I: IntoIterator<Item = bool>,
{
    scanning && flags.into_iter().any(|f| f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;

    fn pothole(conf: f32) -> Detection {
        BBox::new(0.0, 0.0, 10.0, 10.0, conf, 0)
    }

    #[test]
    fn test_threshold_is_strict() {
        let agg = HazardAggregator::new(0, 0.5);
        assert!(!agg.evaluate(&[pothole(0.42)]).flagged);
        assert!(!agg.evaluate(&[pothole(0.5)]).flagged);
        let r = agg.evaluate(&[pothole(0.42), pothole(0.51), pothole(0.9)]);
        assert!(r.flagged);
        assert_eq!(r.hits, 2);
    }

    #[test]
    fn test_other_classes_ignored() {
        let agg = HazardAggregator::new(0, 0.5);
        let crack = BBox::new(0.0, 0.0, 10.0, 10.0, 0.99, 1);
        assert!(!agg.evaluate(&[crack]).flagged);
        assert!(!agg.evaluate(&[]).flagged);
    }

    #[test]
    fn test_banner_requires_scanning() {
        assert!(any_hazard([false, true, false], true));
        assert!(!any_hazard([false, true, false], false));
        assert!(!any_hazard([false, false], true));
    }
}
