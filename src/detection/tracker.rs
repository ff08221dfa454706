// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 车道跟踪器 (车辆计数 + 停滞判定)
//! Lane tracker: vehicle counting and stalled-vehicle detection
//!
//! 核心思想:
//! 1. 显式轨迹记录 (id, 位置, 最近出现tick, 停滞起点)
//! 2. 贪心最近邻匹配 (距离上限内, 代价最小优先)
//! 3. 未匹配检测 → 新轨迹; 超过 N 个tick未出现的轨迹 → 删除
//! 4. 位移 < 阈值持续 ≥ 停滞时长, 且车道低密度 → 事故触发

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::types::{Detection, Point, TrackId};
use crate::config::ControllerConfig;

// ========== 公共数据结构 ==========

/// 跟踪参数
#[derive(Clone, Debug)]
pub struct TrackerParams {
    /// 位移噪声下限 (像素)
    pub stall_distance_px: f32,
    /// 最小停滞时长
    pub stall_time: Duration,
    /// 低密度门限 (车辆数 ≤ 门限才允许触发)
    pub low_density_threshold: usize,
    /// 最近邻匹配半径 (像素)
    pub match_distance_px: f32,
    /// 轨迹最大丢失tick数
    pub max_missed_ticks: u64,
    /// 计入车辆数的类别
    pub vehicle_class_ids: Vec<u32>,
    /// 紧急车辆类别
    pub emergency_class_ids: Vec<u32>,
}

impl From<&ControllerConfig> for TrackerParams {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            stall_distance_px: config.stall_distance_px,
            stall_time: config.stall_time(),
            low_density_threshold: config.low_density_threshold,
            match_distance_px: config.match_distance_px,
            max_missed_ticks: config.max_missed_ticks,
            vehicle_class_ids: config.vehicle_class_ids.clone(),
            emergency_class_ids: config.emergency_class_ids.clone(),
        }
    }
}

/// 轨迹记录
#[derive(Clone, Debug)]
pub struct TrackRecord {
    /// 车道内唯一ID
    pub id: TrackId,
    /// 最近一次观测到的中心点
    pub position: Point,
    /// 最近一次匹配成功的tick
    pub last_seen_tick: u64,
    /// 开始停滞的时间
    pub stall_since: Option<Instant>,
    /// 已上报且被采纳, 恢复移动前不再触发
    reported: bool,
}

impl TrackRecord {
    fn new(id: TrackId, position: Point, tick: u64) -> Self {
        Self {
            id,
            position,
            last_seen_tick: tick,
            stall_since: None,
            reported: false,
        }
    }

    pub fn is_reported(&self) -> bool {
        self.reported
    }
}

/// 事故触发事件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccidentTrigger {
    pub lane: usize,
    pub track: TrackId,
    pub stalled_for: Duration,
}

/// 单条车道本tick的跟踪结果
#[derive(Clone, Debug, Default)]
pub struct LaneReport {
    pub vehicle_count: usize,
    pub emergency_present: bool,
    pub trigger: Option<AccidentTrigger>,
    pub positions: Vec<(TrackId, Point)>,
}

// ========== 车道跟踪器 ==========

pub struct LaneTracker {
    lane: usize,
    params: TrackerParams,
    tracks: Vec<TrackRecord>,
    next_id: u32,
    tick: u64,
}

impl LaneTracker {
    pub fn new(lane: usize, params: TrackerParams) -> Self {
        Self {
            lane,
            params,
            tracks: Vec::new(),
            next_id: 1,
            tick: 0,
        }
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn tracks(&self) -> &[TrackRecord] {
        &self.tracks
    }

    /// 清除所有轨迹 (帧源不可用, 上一帧关联丢失)
    pub fn reset(&mut self) {
        if !self.tracks.is_empty() {
            debug!("🔄 车道{} 跟踪重置, 丢弃 {} 条轨迹", self.lane, self.tracks.len());
        }
        self.tracks.clear();
    }

    /// 事故触发已被采纳: 该轨迹在恢复移动前不再触发
    pub fn acknowledge(&mut self, track: TrackId) {
        if let Some(t) = self.tracks.iter_mut().find(|t| t.id == track) {
            t.reported = true;
        }
    }

    /// 更新跟踪
    ///
    /// # 参数
    /// - `now`: 本tick时间
    /// - `detections`: 车辆检测器本tick的原始输出 (所有类别)
    /// - `accident_latched`: 本tick开始时是否已锁存事故
    pub fn step(
        &mut self,
        now: Instant,
        detections: &[Detection],
        accident_latched: bool,
    ) -> LaneReport {
        self.tick += 1;

        // 1. 类别过滤
        let emergency_present = detections
            .iter()
            .any(|d| self.params.emergency_class_ids.contains(&d.class_id));
        let centers: Vec<Point> = detections
            .iter()
            .filter(|d| self.params.vehicle_class_ids.contains(&d.class_id))
            .map(|d| d.center())
            .collect();
        let vehicle_count = centers.len();

        // 2. 最近邻匹配
        let assignments = self.match_centers(&centers);
        let mut matched_det = vec![false; centers.len()];

        // 3. 已匹配轨迹: 停滞判定
        let low_density = vehicle_count <= self.params.low_density_threshold;
        let mut trigger = None;
        for (det_idx, track_idx) in assignments {
            matched_det[det_idx] = true;
            let current = centers[det_idx];
            let track = &mut self.tracks[track_idx];
            let displacement = track.position.distance(&current);

            if displacement < self.params.stall_distance_px {
                match track.stall_since {
                    None => track.stall_since = Some(now),
                    Some(since) => {
                        let stalled_for = now.saturating_duration_since(since);
                        if stalled_for >= self.params.stall_time
                            && low_density
                            && !accident_latched
                            && !track.reported
                            && trigger.is_none()
                        {
                            trigger = Some(AccidentTrigger {
                                lane: self.lane,
                                track: track.id,
                                stalled_for,
                            });
                        }
                    }
                }
            } else {
                // 恢复移动
                track.stall_since = None;
                track.reported = false;
            }

            track.position = current;
            track.last_seen_tick = self.tick;
        }

        // 4. 未匹配检测 → 新建轨迹 (无停滞计时)
        for (det_idx, &matched) in matched_det.iter().enumerate() {
            if !matched {
                let id = TrackId(self.next_id);
                self.next_id += 1;
                self.tracks
                    .push(TrackRecord::new(id, centers[det_idx], self.tick));
            }
        }

        // 5. 删除丢失太久的轨迹
        let tick = self.tick;
        let max_missed = self.params.max_missed_ticks;
        self.tracks
            .retain(|t| tick - t.last_seen_tick <= max_missed);

        if let Some(t) = &trigger {
            info!(
                "🚨 车道{} 轨迹{} 停滞 {:.1}s (车辆 {}), 触发事故判定",
                self.lane,
                t.track,
                t.stalled_for.as_secs_f64(),
                vehicle_count
            );
        }

        LaneReport {
            vehicle_count,
            emergency_present,
            trigger,
            positions: self
                .tracks
                .iter()
                .filter(|t| t.last_seen_tick == tick)
                .map(|t| (t.id, t.position))
                .collect(),
        }
    }

    /// 贪心最近邻匹配: 按距离排序, 距离上限内一对一分配
    fn match_centers(&self, centers: &[Point]) -> Vec<(usize, usize)> {
        if centers.is_empty() || self.tracks.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for (det_idx, center) in centers.iter().enumerate() {
            for (track_idx, track) in self.tracks.iter().enumerate() {
                let dist = track.position.distance(center);
                if dist <= self.params.match_distance_px {
                    candidates.push((dist, det_idx, track_idx));
                }
            }
        }

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut assignments = Vec::new();
        let mut used_det = vec![false; centers.len()];
        let mut used_track = vec![false; self.tracks.len()];

        for (_, det_idx, track_idx) in candidates {
            if !used_det[det_idx] && !used_track[track_idx] {
                assignments.push((det_idx, track_idx));
                used_det[det_idx] = true;
                used_track[track_idx] = true;
            }
        }

        assignments
    }
}
