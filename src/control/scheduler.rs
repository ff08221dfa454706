// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 信号调度 (Signal Scheduler)
//!
//! 根据仲裁指令维护当前绿灯车道、绿灯起点与时长, 计算剩余时间与各车道灯色。

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{info, warn};

use super::arbiter::{Directive, Mode};

// ========== 数据结构 ==========

/// 绿灯时长
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GreenDuration {
    Finite(Duration),
    Infinite,
}

/// 剩余时间 (整秒, 向上取整; 或无限)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Remaining {
    Seconds(u64),
    Infinite,
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Seconds(s) => write!(f, "{}s", s),
            Remaining::Infinite => write!(f, "∞"),
        }
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Seconds(s) => serializer.serialize_u64(*s),
            Remaining::Infinite => serializer.serialize_str("∞"),
        }
    }
}

/// 灯色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalLabel {
    Green,
    Red,
}

/// 显示用灯色注解
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAnnotation {
    AccidentClearance,
    EmergencyGreen,
    Green,
    Red,
}

impl SignalAnnotation {
    pub fn label(&self) -> &'static str {
        match self {
            SignalAnnotation::AccidentClearance => "ACCIDENT CLEARANCE",
            SignalAnnotation::EmergencyGreen => "EMERGENCY GREEN",
            SignalAnnotation::Green => "GREEN",
            SignalAnnotation::Red => "RED",
        }
    }
}

/// 调度状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleState {
    pub current_lane: usize,
    pub green_start: Instant,
    pub green_duration: GreenDuration,
}

/// 绿灯时长选择策略: 基础时长, 拥堵车道追加
#[derive(Clone, Copy, Debug)]
pub struct DurationPolicy {
    pub base: Duration,
    pub bonus: Duration,
    pub heavy_threshold: usize,
}

impl DurationPolicy {
    pub fn select(&self, vehicle_count: usize) -> Duration {
        if vehicle_count > self.heavy_threshold {
            self.base + self.bonus
        } else {
            self.base
        }
    }
}

// ========== 调度器 ==========

pub struct SignalScheduler {
    lane_count: usize,
    policy: DurationPolicy,
    /// 第一次调度前为 None
    state: Option<ScheduleState>,
}

impl SignalScheduler {
    pub fn new(lane_count: usize, policy: DurationPolicy) -> Self {
        Self {
            lane_count: lane_count.max(1),
            policy,
            state: None,
        }
    }

    pub fn current_lane(&self) -> usize {
        self.state.map_or(0, |s| s.current_lane)
    }

    /// 执行仲裁指令
    pub fn apply(&mut self, directive: Directive, now: Instant, counts: &[usize]) {
        match directive {
            Directive::Hold { lane, .. } => self.hold(lane, now),
            Directive::Rotate => self.rotate(now, counts),
            Directive::RestartBase => self.restart_base(now, counts),
        }
    }

    /// 固定车道, 无限时长
    pub fn hold(&mut self, lane: usize, now: Instant) {
        let lane = lane % self.lane_count;
        let holding = matches!(
            self.state,
            Some(s) if s.current_lane == lane && s.green_duration == GreenDuration::Infinite
        );
        if !holding {
            self.state = Some(ScheduleState {
                current_lane: lane,
                green_start: now,
                green_duration: GreenDuration::Infinite,
            });
        }
    }

    /// 当前车道以基础时长重新计时
    ///
    /// 尚未开始调度时按首次启动处理 (车道0, 按车辆数选择时长)。
    pub fn restart_base(&mut self, now: Instant, counts: &[usize]) {
        let Some(state) = self.state else {
            self.rotate(now, counts);
            return;
        };
        self.state = Some(ScheduleState {
            current_lane: state.current_lane,
            green_start: now,
            green_duration: GreenDuration::Finite(self.policy.base),
        });
    }

    /// 正常轮转: 到时后切换到下一车道, 并按新车道当前车辆数选择时长
    pub fn rotate(&mut self, now: Instant, counts: &[usize]) {
        let count_of = |lane: usize| counts.get(lane).copied().unwrap_or(0);

        let Some(state) = self.state else {
            // 首次启动: 车道0
            self.state = Some(ScheduleState {
                current_lane: 0,
                green_start: now,
                green_duration: GreenDuration::Finite(self.policy.select(count_of(0))),
            });
            return;
        };

        match state.green_duration {
            GreenDuration::Infinite => {
                warn!("⚠️  正常模式下出现无限绿灯, 以基础时长重新计时");
                self.restart_base(now, counts);
            }
            GreenDuration::Finite(duration) => {
                if now.saturating_duration_since(state.green_start) >= duration {
                    let next = (state.current_lane + 1) % self.lane_count;
                    let count = count_of(next);
                    let selected = self.policy.select(count);
                    info!(
                        "🚦 绿灯切换: 车道{} → 车道{} ({}辆, {}s)",
                        state.current_lane,
                        next,
                        count,
                        selected.as_secs()
                    );
                    self.state = Some(ScheduleState {
                        current_lane: next,
                        green_start: now,
                        green_duration: GreenDuration::Finite(selected),
                    });
                }
            }
        }
    }

    /// 剩余时间: ceil(时长 − 已用), 不小于0
    pub fn remaining(&self, now: Instant) -> Remaining {
        let Some(state) = self.state else {
            return Remaining::Seconds(self.policy.base.as_secs());
        };
        match state.green_duration {
            GreenDuration::Infinite => Remaining::Infinite,
            GreenDuration::Finite(duration) => {
                let elapsed = now.saturating_duration_since(state.green_start);
                let left = duration.saturating_sub(elapsed);
                let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
                Remaining::Seconds(secs)
            }
        }
    }

    /// 各车道灯色与注解
    pub fn signals(&self, mode: Mode) -> Vec<(SignalLabel, SignalAnnotation)> {
        let current = self.current_lane();
        (0..self.lane_count)
            .map(|lane| {
                if lane == current {
                    let annotation = match mode {
                        Mode::AccidentLocked => SignalAnnotation::AccidentClearance,
                        Mode::EmergencyLocked => SignalAnnotation::EmergencyGreen,
                        Mode::Normal => SignalAnnotation::Green,
                    };
                    (SignalLabel::Green, annotation)
                } else {
                    (SignalLabel::Red, SignalAnnotation::Red)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::arbiter::HoldReason;

    fn policy() -> DurationPolicy {
        DurationPolicy {
            base: Duration::from_secs(20),
            bonus: Duration::from_secs(20),
            heavy_threshold: 15,
        }
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn test_duration_selection() {
        let p = policy();
        assert_eq!(p.select(0), Duration::from_secs(20));
        assert_eq!(p.select(15), Duration::from_secs(20));
        assert_eq!(p.select(16), Duration::from_secs(40));
    }

    #[test]
    fn test_initial_start_selects_duration() {
        let t0 = Instant::now();
        let mut s = SignalScheduler::new(4, policy());
        s.rotate(t0, &[20, 0, 0, 0]);
        assert_eq!(s.current_lane(), 0);
        assert_eq!(s.remaining(t0), Remaining::Seconds(40));
    }

    #[test]
    fn test_rotation_advances_exactly_at_duration() {
        let t0 = Instant::now();
        let mut s = SignalScheduler::new(4, policy());
        s.rotate(t0, &[0; 4]);

        s.rotate(at(t0, 19_999), &[0; 4]);
        assert_eq!(s.current_lane(), 0);
        assert_eq!(s.remaining(at(t0, 19_999)), Remaining::Seconds(1));

        s.rotate(at(t0, 20_000), &[0, 16, 0, 0]);
        assert_eq!(s.current_lane(), 1);
        assert_eq!(s.remaining(at(t0, 20_000)), Remaining::Seconds(40));
    }

    #[test]
    fn test_rotation_visits_every_lane_in_order() {
        let t0 = Instant::now();
        let mut s = SignalScheduler::new(4, policy());
        s.rotate(t0, &[0; 4]);
        let mut order = vec![s.current_lane()];
        for k in 1..=8u64 {
            s.rotate(at(t0, k * 20_000), &[0; 4]);
            order.push(s.current_lane());
        }
        assert_eq!(order, vec![0, 1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_duration_fixed_during_hold() {
        let t0 = Instant::now();
        let mut s = SignalScheduler::new(4, policy());
        s.rotate(t0, &[16, 0, 0, 0]);
        // 车辆数变化不影响已选时长
        s.rotate(at(t0, 25_000), &[0, 0, 0, 0]);
        assert_eq!(s.current_lane(), 0);
        s.rotate(at(t0, 40_000), &[0, 0, 0, 0]);
        assert_eq!(s.current_lane(), 1);
    }

    #[test]
    fn test_hold_and_restart() {
        let t0 = Instant::now();
        let mut s = SignalScheduler::new(4, policy());
        s.rotate(t0, &[0; 4]);
        s.apply(
            Directive::Hold {
                lane: 2,
                reason: HoldReason::Accident,
            },
            at(t0, 5_000),
            &[0; 4],
        );
        assert_eq!(s.current_lane(), 2);
        assert_eq!(s.remaining(at(t0, 500_000)), Remaining::Infinite);

        s.apply(Directive::RestartBase, at(t0, 600_000), &[0; 4]);
        assert_eq!(s.current_lane(), 2);
        assert_eq!(s.remaining(at(t0, 600_000)), Remaining::Seconds(20));
        assert_eq!(s.remaining(at(t0, 610_500)), Remaining::Seconds(10));
        assert_eq!(s.remaining(at(t0, 700_000)), Remaining::Seconds(0));
    }

    #[test]
    fn test_restart_before_first_start_selects_duration() {
        let t0 = Instant::now();
        let mut s = SignalScheduler::new(4, policy());
        s.apply(Directive::RestartBase, t0, &[16, 0, 0, 0]);
        assert_eq!(s.current_lane(), 0);
        assert_eq!(s.remaining(t0), Remaining::Seconds(40));
    }

    #[test]
    fn test_exactly_one_green() {
        let t0 = Instant::now();
        let mut s = SignalScheduler::new(4, policy());
        s.rotate(t0, &[0; 4]);
        for mode in [Mode::Normal, Mode::EmergencyLocked, Mode::AccidentLocked] {
            let signals = s.signals(mode);
            assert_eq!(signals.len(), 4);
            assert_eq!(
                signals
                    .iter()
                    .filter(|(l, _)| *l == SignalLabel::Green)
                    .count(),
                1
            );
        }
        let signals = s.signals(Mode::AccidentLocked);
        assert_eq!(signals[0].1, SignalAnnotation::AccidentClearance);
        assert_eq!(signals[1], (SignalLabel::Red, SignalAnnotation::Red));
    }

    #[test]
    fn test_remaining_serializes() {
        assert_eq!(serde_json::to_string(&Remaining::Seconds(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&Remaining::Infinite).unwrap(), "\"∞\"");
        assert_eq!(Remaining::Infinite.to_string(), "∞");
        assert_eq!(Remaining::Seconds(12).to_string(), "12s");
    }
}
