// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 模拟交通场景 (演示/测试用, 无需外部检测器)

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Detector, Frame};
use crate::detection::{BBox, Detection};

const CAR: u32 = 2;
const BUS: u32 = 5;
const AMBULANCE: u32 = 80;

/// 车道交通类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrafficProfile {
    /// 少量车辆正常通行
    Light,
    /// 拥堵 (车辆数 > 15)
    Heavy,
    /// 低密度 + 一辆停滞车辆 (→ 事故判定)
    Stalled,
    /// 周期性出现救护车, 伴随路面坑洼
    Emergency,
}

impl TrafficProfile {
    pub fn for_lane(lane: usize) -> Self {
        match lane % 4 {
            0 => TrafficProfile::Light,
            1 => TrafficProfile::Heavy,
            2 => TrafficProfile::Stalled,
            _ => TrafficProfile::Emergency,
        }
    }

    /// 行驶车辆数范围
    fn moving_range(&self) -> (usize, usize) {
        match self {
            TrafficProfile::Light => (2, 5),
            TrafficProfile::Heavy => (16, 22),
            TrafficProfile::Stalled => (1, 3),
            TrafficProfile::Emergency => (3, 6),
        }
    }

    /// 每帧出现坑洼的概率
    pub fn hazard_rate(&self) -> f64 {
        match self {
            TrafficProfile::Emergency => 0.3,
            TrafficProfile::Light => 0.05,
            _ => 0.0,
        }
    }
}

#[derive(Clone, Debug)]
struct SimVehicle {
    x: f32,
    y: f32,
    speed: f32,
    class_id: u32,
}

/// 模拟车辆检测器
pub struct SimulatedTraffic {
    profile: TrafficProfile,
    rng: StdRng,
    vehicles: Vec<SimVehicle>,
    target: usize,
    /// 救护车出现周期 (帧)
    ambulance_period: u64,
    /// 救护车停留时长 (帧)
    ambulance_frames: u64,
}

impl SimulatedTraffic {
    pub const STALLED_AT: (f32, f32) = (640.0, 420.0);

    pub fn new(profile: TrafficProfile, seed: u64, fps: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let (lo, hi) = profile.moving_range();
        let target = rng.gen_range(lo..=hi);
        let fps = fps.max(1.0);
        Self {
            profile,
            rng,
            vehicles: Vec::new(),
            target,
            ambulance_period: (45.0 * fps) as u64,
            ambulance_frames: (8.0 * fps) as u64,
        }
    }

    fn spawn(&mut self, width: f32, y: f32) {
        let class_id = if self.rng.gen_bool(0.15) { BUS } else { CAR };
        let vehicle = SimVehicle {
            x: self.rng.gen_range(80.0..(width - 80.0).max(81.0)),
            y,
            speed: self.rng.gen_range(8.0..20.0),
            class_id,
        };
        self.vehicles.push(vehicle);
    }

    fn ambulance_visible(&self, seq: u64) -> Option<u64> {
        if self.profile != TrafficProfile::Emergency || self.ambulance_period == 0 {
            return None;
        }
        // 第一次在一个周期的1/4处出现
        let phase = (seq + self.ambulance_period * 3 / 4) % self.ambulance_period;
        (phase < self.ambulance_frames).then_some(phase)
    }
}

impl Detector for SimulatedTraffic {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let width = frame.width as f32;
        let height = frame.height as f32;

        // 初始铺满
        if self.vehicles.is_empty() && frame.seq == 0 {
            for k in 0..self.target {
                let y = height * (k as f32 + 0.5) / self.target.max(1) as f32;
                self.spawn(width, y);
            }
        }

        for v in &mut self.vehicles {
            v.y += v.speed;
        }
        self.vehicles.retain(|v| v.y < height);
        while self.vehicles.len() < self.target {
            self.spawn(width, 0.0);
        }
        if self.rng.gen_bool(0.02) {
            let (lo, hi) = self.profile.moving_range();
            self.target = self.rng.gen_range(lo..=hi);
        }

        let mut boxes: Vec<Detection> = self
            .vehicles
            .iter()
            .map(|v| {
                let conf = self.rng.gen_range(0.6..0.95);
                BBox::from_center(v.x, v.y, 60.0, 40.0, conf, v.class_id)
            })
            .collect();

        if self.profile == TrafficProfile::Stalled {
            let (x, y) = Self::STALLED_AT;
            let jitter_x = self.rng.gen_range(-0.5..0.5);
            let jitter_y = self.rng.gen_range(-0.5..0.5);
            boxes.push(BBox::from_center(x + jitter_x, y + jitter_y, 64.0, 42.0, 0.88, CAR));
        }

        if let Some(phase) = self.ambulance_visible(frame.seq) {
            let y = (phase as f32 * 15.0) % height;
            boxes.push(BBox::from_center(width * 0.3, y, 70.0, 48.0, 0.9, AMBULANCE));
        }

        Ok(boxes)
    }
}

/// 模拟路面隐患检测器
pub struct SimulatedHazards {
    rng: StdRng,
    rate: f64,
    class_id: u32,
}

impl SimulatedHazards {
    pub fn new(seed: u64, rate: f64, class_id: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            rate: rate.clamp(0.0, 1.0),
            class_id,
        }
    }
}

impl Detector for SimulatedHazards {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        if !self.rng.gen_bool(self.rate) {
            return Ok(Vec::new());
        }
        let x = self.rng.gen_range(0.0..frame.width.max(1) as f32);
        let y = self.rng.gen_range(0.0..frame.height.max(1) as f32);
        let conf = self.rng.gen_range(0.3..0.95);
        Ok(vec![BBox::from_center(x, y, 50.0, 30.0, conf, self.class_id)])
    }
}

/// 空检测器 (未配置的检测通道)
pub struct NullDetector;

impl Detector for NullDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}
