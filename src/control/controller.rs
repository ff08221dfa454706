// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 控制器 (Controller)
//!
//! 单个tick的编排:
//! 1. 各车道独立跟踪 + 隐患汇总 (rayon 并行, 每条车道只改自己的状态)
//! 2. 汇合后统一应用外部命令
//! 3. 模式仲裁 → 信号调度
//! 4. 生成输出状态

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use super::arbiter::{ArbiterInput, Mode, ModeArbiter, ModeContext};
use super::command::Command;
use super::scheduler::{DurationPolicy, Remaining, SignalAnnotation, SignalLabel, SignalScheduler};
use crate::config::ControllerConfig;
use crate::detection::{
    any_hazard, Density, Detection, HazardAggregator, HazardReport, LaneReport, LaneTracker,
    TrackerParams,
};

// ========== 输入 ==========

/// 单条车道本tick的输入
#[derive(Clone, Debug)]
pub enum LaneInput {
    /// 新帧的检测结果
    Observed {
        vehicles: Vec<Detection>,
        hazards: Vec<Detection>,
    },
    /// 上一tick之后没有新帧, 沿用上次车辆数 (事故触发与隐患标记不沿用)
    Stale,
    /// 检测超时, 按空检测处理
    TimedOut,
    /// 帧源不可用, 空检测且跟踪重置
    Unavailable,
}

impl LaneInput {
    pub fn empty() -> Self {
        LaneInput::Observed {
            vehicles: Vec::new(),
            hazards: Vec::new(),
        }
    }
}

// ========== 输出 ==========

/// 单条车道显示状态
#[derive(Clone, Debug, Serialize)]
pub struct LaneView {
    pub name: String,
    pub vehicle_count: usize,
    pub density: Density,
    pub signal: SignalLabel,
    pub annotation: SignalAnnotation,
    /// 仅绿灯车道有剩余时间
    pub remaining: Option<Remaining>,
    pub hazard: bool,
    /// 本tick超过阈值的隐患数 (扫描关闭时为0)
    pub hazard_hits: usize,
    pub emergency: bool,
}

/// 全局横幅
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Banners {
    pub emergency_active: bool,
    pub accident_pending: bool,
    pub accident_confirmed: bool,
    pub hazard_alert: bool,
}

/// 每tick输出 (→ 渲染)
#[derive(Clone, Debug, Serialize)]
pub struct TickOutput {
    pub tick: u64,
    pub mode: Mode,
    pub active_lane: usize,
    pub remaining: Remaining,
    pub lanes: Vec<LaneView>,
    pub banners: Banners,
    pub hazard_scan: bool,
    pub quit: bool,
}

// ========== 控制器 ==========

struct LaneSlot {
    name: String,
    tracker: LaneTracker,
    report: LaneReport,
    hazard: HazardReport,
}

pub struct Controller {
    config: ControllerConfig,
    lanes: Vec<LaneSlot>,
    arbiter: ModeArbiter,
    scheduler: SignalScheduler,
    hazard: HazardAggregator,
    hazard_scan: bool,
    tick: u64,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        let params = TrackerParams::from(&config);
        let lanes = (0..config.lane_count)
            .map(|lane| LaneSlot {
                name: config
                    .lane_names
                    .get(lane)
                    .cloned()
                    .unwrap_or_else(|| format!("Lane {}", lane + 1)),
                tracker: LaneTracker::new(lane, params.clone()),
                report: LaneReport::default(),
                hazard: HazardReport::default(),
            })
            .collect();
        let policy = DurationPolicy {
            base: config.base_green(),
            bonus: config.heavy_bonus(),
            heavy_threshold: config.heavy_threshold,
        };

        Self {
            scheduler: SignalScheduler::new(config.lane_count, policy),
            hazard: HazardAggregator::from_config(&config),
            arbiter: ModeArbiter::new(),
            hazard_scan: false,
            tick: 0,
            lanes,
            config,
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn mode_context(&self) -> &ModeContext {
        self.arbiter.context()
    }

    pub fn hazard_scan(&self) -> bool {
        self.hazard_scan
    }

    pub fn tracker(&self, lane: usize) -> Option<&LaneTracker> {
        self.lanes.get(lane).map(|l| &l.tracker)
    }

    /// 执行一个tick
    ///
    /// `inputs` 按车道顺序; 缺失的车道按超时处理, 多余的忽略。
    pub fn tick(&mut self, now: Instant, inputs: Vec<LaneInput>, commands: &[Command]) -> TickOutput {
        self.tick += 1;

        let lane_count = self.lanes.len();
        if inputs.len() != lane_count {
            warn!(
                "⚠️  车道输入数量 {} 与车道数 {} 不一致",
                inputs.len(),
                lane_count
            );
        }
        let mut inputs = inputs;
        inputs.resize(lane_count, LaneInput::TimedOut);

        // 1. 各车道独立处理 (本tick开始时的锁存状态快照)
        let latched = self.arbiter.context().accident_mode;
        let hazard = &self.hazard;
        self.lanes
            .par_iter_mut()
            .zip(inputs.into_par_iter())
            .for_each(|(slot, input)| match input {
                LaneInput::Observed { vehicles, hazards } => {
                    slot.report = slot.tracker.step(now, &vehicles, latched);
                    slot.hazard = hazard.evaluate(&hazards);
                }
                LaneInput::Stale => {
                    slot.report.trigger = None;
                    slot.hazard = HazardReport::default();
                }
                LaneInput::TimedOut => {
                    slot.report = slot.tracker.step(now, &[], latched);
                    slot.hazard = HazardReport::default();
                }
                LaneInput::Unavailable => {
                    slot.tracker.reset();
                    slot.report = LaneReport::default();
                    slot.hazard = HazardReport::default();
                }
            });

        let counts: Vec<usize> = self.lanes.iter().map(|l| l.report.vehicle_count).collect();

        // 2. 汇合后统一应用命令
        let mut quit = false;
        let mut restart = None;
        for &command in commands {
            match command {
                Command::HazardScanOn => {
                    if !self.hazard_scan {
                        debug!("🕳️ 路面隐患扫描开启");
                    }
                    self.hazard_scan = true;
                }
                Command::HazardScanOff => {
                    if self.hazard_scan {
                        debug!("🕳️ 路面隐患扫描关闭");
                    }
                    self.hazard_scan = false;
                }
                Command::Quit => quit = true,
                _ => {
                    if let Some(d) = self.arbiter.apply(command) {
                        restart = Some(d);
                    }
                }
            }
        }
        if let Some(directive) = restart {
            self.scheduler.apply(directive, now, &counts);
        }

        // 3. 仲裁
        let trigger = self.lanes.iter().find_map(|l| l.report.trigger);
        let emergency_flags: Vec<bool> = self
            .lanes
            .iter()
            .map(|l| l.report.emergency_present)
            .collect();
        let transition = self.arbiter.step(&ArbiterInput {
            trigger,
            emergency_flags: &emergency_flags,
        });

        if let Some(accepted) = transition.accepted {
            self.lanes[accepted.lane].tracker.acknowledge(accepted.track);
        }
        for dropped in self
            .lanes
            .iter()
            .filter_map(|l| l.report.trigger)
            .filter(|t| Some(*t) != transition.accepted)
        {
            warn!(
                "⚠️  车道{} 事故触发被忽略 (已有事故锁定)",
                dropped.lane
            );
        }

        // 4. 调度
        self.scheduler.apply(transition.directive, now, &counts);

        self.build_output(now, quit)
    }

    fn build_output(&self, now: Instant, quit: bool) -> TickOutput {
        let ctx = self.arbiter.context();
        let mode = ctx.mode();
        let remaining = self.scheduler.remaining(now);
        let signals = self.scheduler.signals(mode);

        let lanes: Vec<LaneView> = self
            .lanes
            .iter()
            .zip(signals)
            .map(|(slot, (signal, annotation))| {
                let hazard = if self.hazard_scan {
                    slot.hazard
                } else {
                    HazardReport::default()
                };
                LaneView {
                    name: slot.name.clone(),
                    vehicle_count: slot.report.vehicle_count,
                    density: Density::classify(
                        slot.report.vehicle_count,
                        self.config.low_density_threshold,
                        self.config.heavy_threshold,
                    ),
                    signal,
                    annotation,
                    remaining: (signal == SignalLabel::Green).then_some(remaining),
                    hazard: hazard.flagged,
                    hazard_hits: hazard.hits,
                    emergency: slot.report.emergency_present,
                }
            })
            .collect();

        let banners = Banners {
            emergency_active: ctx.emergency_active(),
            accident_pending: ctx.accident_pending(),
            accident_confirmed: ctx.accident_confirmed,
            hazard_alert: any_hazard(lanes.iter().map(|l| l.hazard), self.hazard_scan),
        };

        TickOutput {
            tick: self.tick,
            mode,
            active_lane: self.scheduler.current_lane(),
            remaining,
            lanes,
            banners,
            hazard_scan: self.hazard_scan,
            quit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;
    use std::time::Duration;

    fn car(x: f32, y: f32) -> Detection {
        BBox::from_center(x, y, 40.0, 30.0, 0.9, 2)
    }

    fn ambulance(x: f32, y: f32) -> Detection {
        BBox::from_center(x, y, 60.0, 40.0, 0.9, 80)
    }

    fn pothole(conf: f32) -> Detection {
        BBox::new(10.0, 10.0, 60.0, 40.0, conf, 0)
    }

    fn observed(vehicles: Vec<Detection>) -> LaneInput {
        LaneInput::Observed {
            vehicles,
            hazards: Vec::new(),
        }
    }

    fn empty_lanes() -> Vec<LaneInput> {
        (0..4).map(|_| LaneInput::empty()).collect()
    }

    fn at(t0: Instant, secs: u64) -> Instant {
        t0 + Duration::from_secs(secs)
    }

    fn assert_one_green(out: &TickOutput) {
        let greens: Vec<usize> = out
            .lanes
            .iter()
            .enumerate()
            .filter(|(_, l)| l.signal == SignalLabel::Green)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(greens, vec![out.active_lane]);
    }

    /// 车道2: 3辆车, 其中一辆固定不动
    fn lane2_scene(s: u64) -> Vec<LaneInput> {
        let mut inputs = empty_lanes();
        let step = 20.0 * s as f32;
        inputs[2] = observed(vec![
            car(100.0, 100.0),
            car(300.0 + step, 100.0),
            car(600.0, 200.0 + step),
        ]);
        inputs
    }

    /// 运行场景A直到事故锁存, 返回锁存时刻
    fn run_accident(c: &mut Controller, t0: Instant) -> u64 {
        for s in 0..=17 {
            let out = c.tick(at(t0, s), lane2_scene(s), &[]);
            assert_one_green(&out);
            if out.mode == Mode::AccidentLocked {
                return s;
            }
        }
        panic!("事故未触发");
    }

    #[test]
    fn test_scenario_a_stalled_vehicle_latches_accident() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());

        let latched_at = run_accident(&mut c, t0);
        assert_eq!(latched_at, 17);

        let ctx = c.mode_context();
        assert!(ctx.accident_mode);
        assert_eq!(ctx.accident_lane, Some(2));

        let out = c.tick(at(t0, 18), lane2_scene(18), &[]);
        assert_eq!(out.active_lane, 2);
        assert_eq!(out.remaining, Remaining::Infinite);
        assert_eq!(out.lanes[2].annotation, SignalAnnotation::AccidentClearance);
        assert!(out.banners.accident_pending);
        assert!(!out.banners.accident_confirmed);
    }

    #[test]
    fn test_accident_holds_against_rotation_and_emergency() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let latched_at = run_accident(&mut c, t0);

        let mut inputs = lane2_scene(latched_at + 1);
        inputs[0] = observed(vec![ambulance(50.0, 50.0)]);
        let out = c.tick(at(t0, latched_at + 1), inputs, &[Command::EmergencyOn]);
        assert_eq!(out.active_lane, 2);
        assert!(!out.banners.emergency_active);

        // 远超轮转时长仍保持
        for s in (latched_at + 2)..(latched_at + 120) {
            let out = c.tick(at(t0, s), lane2_scene(s), &[]);
            assert_eq!(out.active_lane, 2);
            assert_eq!(out.mode, Mode::AccidentLocked);
            assert_one_green(&out);
        }
    }

    #[test]
    fn test_accident_trigger_fires_once() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let latched_at = run_accident(&mut c, t0);

        // 复位后同一停滞车辆不再重复触发
        let out = c.tick(
            at(t0, latched_at + 1),
            lane2_scene(latched_at + 1),
            &[Command::ResetAccident],
        );
        assert_eq!(out.mode, Mode::Normal);
        for s in (latched_at + 2)..(latched_at + 10) {
            let out = c.tick(at(t0, s), lane2_scene(s), &[]);
            assert_eq!(out.mode, Mode::Normal);
        }
    }

    #[test]
    fn test_scenario_b_emergency_lock_and_release() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        c.tick(t0, empty_lanes(), &[]);

        let mut inputs = empty_lanes();
        inputs[1] = observed(vec![ambulance(200.0, 200.0)]);
        let out = c.tick(at(t0, 3), inputs, &[Command::EmergencyOn]);
        assert_eq!(out.active_lane, 1);
        assert_eq!(out.mode, Mode::EmergencyLocked);
        assert_eq!(out.remaining, Remaining::Infinite);
        assert_eq!(out.lanes[1].annotation, SignalAnnotation::EmergencyGreen);
        assert!(out.banners.emergency_active);
        assert_one_green(&out);

        let out = c.tick(at(t0, 4), empty_lanes(), &[]);
        assert_eq!(out.mode, Mode::Normal);
        assert_eq!(out.active_lane, 1);
        assert_eq!(out.remaining, Remaining::Seconds(20));
        assert!(!out.banners.emergency_active);

        // 基础时长从释放时刻起算
        let out = c.tick(at(t0, 23), empty_lanes(), &[]);
        assert_eq!(out.active_lane, 1);
        assert_eq!(out.remaining, Remaining::Seconds(1));
        let out = c.tick(at(t0, 24), empty_lanes(), &[]);
        assert_eq!(out.active_lane, 2);
    }

    #[test]
    fn test_emergency_without_candidate_reverts_same_tick() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        c.tick(t0, empty_lanes(), &[]);
        let out = c.tick(at(t0, 5), empty_lanes(), &[Command::EmergencyOn]);
        assert_eq!(out.mode, Mode::Normal);
        assert!(!c.mode_context().emergency_mode);
        assert_eq!(out.remaining, Remaining::Seconds(20));
    }

    #[test]
    fn test_emergency_off_command() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let mut inputs = empty_lanes();
        inputs[3] = observed(vec![ambulance(200.0, 200.0)]);
        let out = c.tick(t0, inputs.clone(), &[Command::EmergencyOn]);
        assert_eq!(out.active_lane, 3);

        let out = c.tick(at(t0, 2), inputs, &[Command::EmergencyOff]);
        assert_eq!(out.mode, Mode::Normal);
        assert_eq!(out.active_lane, 3);
        assert_eq!(out.remaining, Remaining::Seconds(20));
    }

    #[test]
    fn test_emergency_off_restarts_base_timer_mid_rotation() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        c.tick(t0, empty_lanes(), &[]);

        let out = c.tick(at(t0, 10), empty_lanes(), &[Command::EmergencyOff]);
        assert_eq!(out.mode, Mode::Normal);
        assert_eq!(out.active_lane, 0);
        assert_eq!(out.remaining, Remaining::Seconds(20));

        let out = c.tick(at(t0, 29), empty_lanes(), &[]);
        assert_eq!(out.active_lane, 0);
        let out = c.tick(at(t0, 30), empty_lanes(), &[]);
        assert_eq!(out.active_lane, 1);
    }

    #[test]
    fn test_first_tick_restart_selects_heavy_duration() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let heavy: Vec<Detection> = (0..16)
            .map(|k| car(60.0 * k as f32 + 30.0, 300.0))
            .collect();
        let mut inputs = empty_lanes();
        inputs[0] = observed(heavy);

        // 紧急模式无候选车道 → 同tick恢复, 仍按首次启动选择时长
        let out = c.tick(t0, inputs, &[Command::EmergencyOn]);
        assert_eq!(out.mode, Mode::Normal);
        assert_eq!(out.active_lane, 0);
        assert_eq!(out.remaining, Remaining::Seconds(40));
    }

    #[test]
    fn test_scenario_c_rotation_same_tick_with_new_count() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let out = c.tick(t0, empty_lanes(), &[]);
        assert_eq!(out.active_lane, 0);
        assert_eq!(out.remaining, Remaining::Seconds(20));

        let heavy: Vec<Detection> = (0..16)
            .map(|k| car(60.0 * k as f32 + 30.0, 300.0))
            .collect();
        let mut inputs = empty_lanes();
        inputs[1] = observed(heavy);
        let out = c.tick(at(t0, 20), inputs, &[]);
        assert_eq!(out.active_lane, 1);
        assert_eq!(out.remaining, Remaining::Seconds(40));
        assert_eq!(out.lanes[1].density, Density::High);
        assert_one_green(&out);

        // 车辆数变化不影响本次时长
        let out = c.tick(at(t0, 59), empty_lanes(), &[]);
        assert_eq!(out.active_lane, 1);
        let out = c.tick(at(t0, 60), empty_lanes(), &[]);
        assert_eq!(out.active_lane, 2);
        assert_eq!(out.remaining, Remaining::Seconds(20));
    }

    #[test]
    fn test_scenario_d_low_confidence_hazard() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let mut inputs = empty_lanes();
        inputs[3] = LaneInput::Observed {
            vehicles: Vec::new(),
            hazards: vec![pothole(0.42)],
        };
        let out = c.tick(t0, inputs, &[Command::HazardScanOn]);
        assert!(out.hazard_scan);
        assert!(!out.lanes[3].hazard);
        assert!(!out.banners.hazard_alert);
    }

    #[test]
    fn test_hazard_flag_not_latched_and_gated_by_scan() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let hazard_lane = |conf: f32| {
            let mut inputs = empty_lanes();
            inputs[3] = LaneInput::Observed {
                vehicles: Vec::new(),
                hazards: vec![pothole(conf)],
            };
            inputs
        };

        let out = c.tick(t0, hazard_lane(0.8), &[Command::HazardScanOn]);
        assert!(out.lanes[3].hazard);
        assert!(out.banners.hazard_alert);

        // 下一tick没有隐患 → 立即清除
        let out = c.tick(at(t0, 1), empty_lanes(), &[]);
        assert!(!out.lanes[3].hazard);
        assert!(!out.banners.hazard_alert);

        // 扫描关闭当tick生效
        let out = c.tick(at(t0, 2), hazard_lane(0.8), &[Command::HazardScanOff]);
        assert!(!out.lanes[3].hazard);
        assert!(!out.banners.hazard_alert);
    }

    #[test]
    fn test_scenario_e_reset_resumes_on_accident_lane() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let latched_at = run_accident(&mut c, t0);

        let out = c.tick(
            at(t0, latched_at + 1),
            lane2_scene(latched_at + 1),
            &[Command::ConfirmAccident],
        );
        assert!(out.banners.accident_confirmed);
        assert!(!out.banners.accident_pending);

        let reset_at = latched_at + 30;
        let out = c.tick(at(t0, reset_at), lane2_scene(reset_at), &[Command::ResetAccident]);
        let ctx = c.mode_context();
        assert!(!ctx.accident_mode);
        assert!(!ctx.accident_confirmed);
        assert_eq!(ctx.accident_lane, None);
        assert_eq!(out.mode, Mode::Normal);
        assert_eq!(out.active_lane, 2);
        assert_eq!(out.remaining, Remaining::Seconds(20));
        assert!(!out.banners.accident_pending);

        let out = c.tick(at(t0, reset_at + 20), lane2_scene(reset_at + 20), &[]);
        assert_eq!(out.active_lane, 3);
    }

    #[test]
    fn test_first_lane_wins_simultaneous_triggers() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        for s in 0..=17 {
            let mut inputs = empty_lanes();
            inputs[1] = observed(vec![car(100.0, 100.0)]);
            inputs[3] = observed(vec![car(100.0, 100.0)]);
            c.tick(at(t0, s), inputs, &[]);
        }
        assert_eq!(c.mode_context().accident_lane, Some(1));
    }

    #[test]
    fn test_unavailable_lane_resets_tracking() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        for s in 0..10 {
            let mut inputs = empty_lanes();
            inputs[0] = observed(vec![car(100.0, 100.0), car(400.0, 100.0)]);
            c.tick(at(t0, s), inputs, &[]);
        }
        assert_eq!(c.tracker(0).map(|t| t.tracks().len()), Some(2));

        let mut inputs = empty_lanes();
        inputs[0] = LaneInput::Unavailable;
        let out = c.tick(at(t0, 10), inputs, &[]);
        assert_eq!(out.lanes[0].vehicle_count, 0);
        assert!(!out.lanes[0].hazard);
        assert_eq!(c.tracker(0).map(|t| t.tracks().len()), Some(0));
    }

    #[test]
    fn test_stale_lane_reuses_previous_results() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let mut inputs = empty_lanes();
        inputs[2] = observed(vec![car(100.0, 100.0), car(300.0, 100.0), car(500.0, 100.0)]);
        c.tick(t0, inputs, &[]);

        let mut inputs = empty_lanes();
        inputs[2] = LaneInput::Stale;
        let out = c.tick(at(t0, 1), inputs, &[]);
        assert_eq!(out.lanes[2].vehicle_count, 3);
        assert_eq!(out.lanes[2].density, Density::Low);
    }

    #[test]
    fn test_stale_lane_clears_hazard_flag() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let mut inputs = empty_lanes();
        inputs[3] = LaneInput::Observed {
            vehicles: vec![car(100.0, 100.0)],
            hazards: vec![pothole(0.8), pothole(0.9)],
        };
        let out = c.tick(t0, inputs, &[Command::HazardScanOn]);
        assert!(out.lanes[3].hazard);
        assert_eq!(out.lanes[3].hazard_hits, 2);

        let mut inputs = empty_lanes();
        inputs[3] = LaneInput::Stale;
        let out = c.tick(at(t0, 1), inputs, &[]);
        assert_eq!(out.lanes[3].vehicle_count, 1);
        assert!(!out.lanes[3].hazard);
        assert_eq!(out.lanes[3].hazard_hits, 0);
        assert!(!out.banners.hazard_alert);
    }

    #[test]
    fn test_timed_out_lane_ages_tracks_and_releases_emergency() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let mut inputs = empty_lanes();
        inputs[1] = observed(vec![ambulance(200.0, 200.0), car(500.0, 300.0)]);
        let out = c.tick(t0, inputs, &[Command::EmergencyOn]);
        assert_eq!(out.mode, Mode::EmergencyLocked);
        assert_eq!(out.active_lane, 1);
        assert_eq!(out.lanes[1].vehicle_count, 2);

        let timed_out = || {
            let mut inputs = empty_lanes();
            inputs[1] = LaneInput::TimedOut;
            inputs
        };

        // 超时按空检测处理: 车辆数归零, 紧急锁定释放
        let out = c.tick(at(t0, 1), timed_out(), &[]);
        assert_eq!(out.lanes[1].vehicle_count, 0);
        assert!(!out.lanes[1].emergency);
        assert_eq!(out.mode, Mode::Normal);
        assert!(!c.mode_context().emergency_active());
        assert_eq!(out.active_lane, 1);
        assert_eq!(out.remaining, Remaining::Seconds(20));

        // 连续漏检 max_missed_ticks 次内轨迹保留, 之后过期
        for s in 2..=5 {
            c.tick(at(t0, s), timed_out(), &[]);
        }
        assert_eq!(c.tracker(1).map(|t| t.tracks().len()), Some(2));
        c.tick(at(t0, 6), timed_out(), &[]);
        assert_eq!(c.tracker(1).map(|t| t.tracks().len()), Some(0));
    }

    #[test]
    fn test_missing_inputs_and_quit() {
        let t0 = Instant::now();
        let mut c = Controller::new(ControllerConfig::default());
        let out = c.tick(t0, vec![LaneInput::empty()], &[Command::Quit]);
        assert!(out.quit);
        assert_eq!(out.lanes.len(), 4);
        assert_eq!(out.tick, 1);
        assert_one_green(&out);
    }

    #[test]
    fn test_output_serializes() {
        let mut c = Controller::new(ControllerConfig::default());
        let out = c.tick(Instant::now(), empty_lanes(), &[]);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["mode"], "NORMAL");
        assert_eq!(json["remaining"], 20);
        assert_eq!(json["lanes"][0]["signal"], "GREEN");
        assert_eq!(json["lanes"][1]["annotation"], "RED");
        assert_eq!(json["lanes"][0]["density"], "LOW");
    }
}
