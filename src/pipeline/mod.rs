// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 控制流水线 (Control Pipeline)
///
/// 多线程架构, 通过 crossbeam channel 通信:
/// - LaneWorker: 每条车道一个线程 (取帧 → 检测 → LaneObservation)
/// - Commands:   标准输入按键线程
/// - Runner:     固定间隔 tick 循环 (主线程), 与检测延迟解耦
pub mod command;
pub mod lane_worker;
pub mod runner;

pub use command::{read_commands, spawn_stdin_reader};
pub use lane_worker::LaneWorker;
pub use runner::{run, RunOptions, RunSummary};

use std::time::{Duration, Instant};

use crate::control::LaneInput;
use crate::detection::Detection;

// ========== 消息类型定义 ==========

/// 车道观测 (车道线程 → tick 循环)
#[derive(Clone, Debug)]
pub struct LaneObservation {
    pub lane: usize,
    pub frame_seq: u64,
    /// 检测完成时刻
    pub captured_at: Instant,
    /// 帧源是否返回了帧
    pub frame_available: bool,
    pub vehicles: Vec<Detection>,
    /// 隐患扫描关闭时为空
    pub hazards: Vec<Detection>,
}

impl LaneObservation {
    pub fn unavailable(lane: usize, frame_seq: u64) -> Self {
        Self {
            lane,
            frame_seq,
            captured_at: Instant::now(),
            frame_available: false,
            vehicles: Vec::new(),
            hazards: Vec::new(),
        }
    }
}

/// 车道输入分类
///
/// - 有新观测: Observed (帧源不可用时为 Unavailable)
/// - 新观测产生于超时之前 (检测积压): TimedOut
/// - 无新观测且距上次观测未超时: Stale
/// - 无新观测且超时: TimedOut
pub fn classify_lane(
    latest: Option<LaneObservation>,
    last_seen: Instant,
    now: Instant,
    timeout: Duration,
) -> LaneInput {
    match latest {
        Some(obs) if !obs.frame_available => LaneInput::Unavailable,
        Some(obs) if now.saturating_duration_since(obs.captured_at) > timeout => {
            LaneInput::TimedOut
        }
        Some(obs) => LaneInput::Observed {
            vehicles: obs.vehicles,
            hazards: obs.hazards,
        },
        None if now.saturating_duration_since(last_seen) > timeout => LaneInput::TimedOut,
        None => LaneInput::Stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;

    fn obs(available: bool) -> LaneObservation {
        LaneObservation {
            lane: 0,
            frame_seq: 3,
            captured_at: Instant::now(),
            frame_available: available,
            vehicles: vec![BBox::new(0.0, 0.0, 10.0, 10.0, 0.9, 2)],
            hazards: Vec::new(),
        }
    }

    #[test]
    fn test_classify_lane() {
        let t0 = Instant::now();
        let timeout = Duration::from_millis(500);

        match classify_lane(Some(obs(true)), t0, t0, timeout) {
            LaneInput::Observed { vehicles, hazards } => {
                assert_eq!(vehicles.len(), 1);
                assert!(hazards.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify_lane(Some(obs(false)), t0, t0, timeout),
            LaneInput::Unavailable
        ));
        assert!(matches!(
            classify_lane(None, t0, t0 + Duration::from_millis(500), timeout),
            LaneInput::Stale
        ));
        assert!(matches!(
            classify_lane(None, t0, t0 + Duration::from_millis(501), timeout),
            LaneInput::TimedOut
        ));
    }

    #[test]
    fn test_delayed_observation_times_out() {
        let t0 = Instant::now();
        let timeout = Duration::from_millis(500);
        let mut late = obs(true);
        late.captured_at = t0;

        assert!(matches!(
            classify_lane(Some(late.clone()), t0, t0 + Duration::from_millis(500), timeout),
            LaneInput::Observed { .. }
        ));
        assert!(matches!(
            classify_lane(Some(late), t0, t0 + Duration::from_millis(501), timeout),
            LaneInput::TimedOut
        ));
    }
}
