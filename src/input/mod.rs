// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 车道输入系统 (Lane Input System)
///
/// 每条车道由一个帧源和两个检测器组成, 由车道工作线程独占:
/// - FrameSource: 图片目录 / 空白帧
/// - Detector:    外部推理结果回放 / 模拟交通 / 空检测
pub mod replay;
pub mod simulated;
pub mod source;

pub use replay::ReplayDetector;
pub use simulated::{NullDetector, SimulatedHazards, SimulatedTraffic, TrafficProfile};
pub use source::{BlankSource, ImageDirSource};

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

use crate::config::ControllerConfig;
use crate::detection::{ClassTable, Detection};

// ========== 帧 ==========

/// 单帧 (只携带序号与尺寸, 检测结果由检测器按序号给出)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    /// 车道内帧序号 (从0开始)
    pub seq: u64,
    pub width: u32,
    pub height: u32,
}

/// 帧源: 返回 None 表示帧源不可用 (结束/出错)
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// 检测器: 对单帧输出检测框 (类别ID + 置信度)
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

// ========== 车道装配 ==========

/// 车道工作线程所需的全部输入
pub struct LaneRig {
    pub lane: usize,
    pub name: String,
    pub fps: f64,
    pub source: Box<dyn FrameSource>,
    pub vehicles: Box<dyn Detector>,
    pub hazards: Box<dyn Detector>,
}

impl LaneRig {
    /// 模拟场景: 车道0轻度, 车道1拥堵, 车道2有停滞车辆, 车道3周期性救护车 + 坑洼
    pub fn simulated(lane: usize, config: &ControllerConfig, seed: u64) -> Self {
        let profile = TrafficProfile::for_lane(lane);
        let lane_seed = seed.wrapping_add(lane as u64 * 7919);
        let fps = 10.0;
        Self {
            lane,
            name: lane_name(config, lane),
            fps,
            source: Box::new(BlankSource::new(1280, 720)),
            vehicles: Box::new(SimulatedTraffic::new(profile, lane_seed, fps)),
            hazards: Box::new(SimulatedHazards::new(
                lane_seed ^ 0x5eed,
                profile.hazard_rate(),
                config.hazard_class_id,
            )),
        }
    }
}

fn lane_name(config: &ControllerConfig, lane: usize) -> String {
    config
        .lane_names
        .get(lane)
        .cloned()
        .unwrap_or_else(|| format!("Lane {}", lane + 1))
}

/// 命令行车道描述
///
/// `frames=<目录>,vehicles=<文件>,hazards=<文件>,fps=25,loop`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaneSpec {
    pub frames: Option<String>,
    pub vehicles: Option<String>,
    pub hazards: Option<String>,
    pub fps: Option<f64>,
    pub looping: bool,
}

impl FromStr for LaneSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut spec = LaneSpec::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = match part.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (part, None),
            };
            match (key, value) {
                ("frames", Some(v)) => spec.frames = Some(v.to_string()),
                ("vehicles", Some(v)) => spec.vehicles = Some(v.to_string()),
                ("hazards", Some(v)) => spec.hazards = Some(v.to_string()),
                ("fps", Some(v)) => {
                    let fps: f64 = v.parse().with_context(|| format!("无效的 fps: {}", v))?;
                    if !(fps > 0.0) {
                        bail!("fps 必须为正数: {}", v);
                    }
                    spec.fps = Some(fps);
                }
                ("loop", None) => spec.looping = true,
                _ => return Err(anyhow!("无法识别的车道参数: {}", part)),
            }
        }
        if spec.frames.is_none() && spec.vehicles.is_none() {
            bail!("车道至少需要 frames 或 vehicles: {}", s);
        }
        Ok(spec)
    }
}

impl LaneSpec {
    pub const DEFAULT_FPS: f64 = 25.0;

    /// 打开帧源与检测器
    pub fn build(&self, lane: usize, config: &ControllerConfig) -> Result<LaneRig> {
        let source: Box<dyn FrameSource> = match &self.frames {
            Some(dir) => Box::new(
                ImageDirSource::open(dir, self.looping)
                    .with_context(|| format!("车道{} 帧源打开失败", lane))?,
            ),
            None => Box::new(BlankSource::new(1280, 720)),
        };
        let vehicles: Box<dyn Detector> = match &self.vehicles {
            Some(path) => Box::new(
                ReplayDetector::open(path, ClassTable::Vehicle, self.looping)
                    .with_context(|| format!("车道{} 车辆检测回放加载失败", lane))?,
            ),
            None => Box::new(NullDetector),
        };
        let hazards: Box<dyn Detector> = match &self.hazards {
            Some(path) => Box::new(
                ReplayDetector::open(path, ClassTable::Hazard, self.looping)
                    .with_context(|| format!("车道{} 隐患检测回放加载失败", lane))?,
            ),
            None => Box::new(NullDetector),
        };

        Ok(LaneRig {
            lane,
            name: lane_name(config, lane),
            fps: self.fps.unwrap_or(Self::DEFAULT_FPS),
            source,
            vehicles,
            hazards,
        })
    }
}
