// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 车道工作线程 (Lane Worker)
/// 职责: 取帧 → 车辆检测 (+ 隐患检测) → 发送 LaneObservation
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, info, warn};

use super::LaneObservation;
use crate::detection::Detection;
use crate::input::{Detector, Frame, LaneRig};

pub struct LaneWorker {
    rig: LaneRig,
    tx: Sender<LaneObservation>,
    hazard_scan: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,

    // 统计
    frames: u64,
    dropped: u64,
}

impl LaneWorker {
    pub fn new(
        rig: LaneRig,
        tx: Sender<LaneObservation>,
        hazard_scan: Arc<AtomicBool>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            rig,
            tx,
            hazard_scan,
            stop,
            frames: 0,
            dropped: 0,
        }
    }

    /// 启动线程
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let name = format!("lane-{}", self.rig.lane);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())
            .with_context(|| format!("无法启动线程 {}", name))
    }

    pub fn run(mut self) {
        let lane = self.rig.lane;
        info!("🎬 车道{} ({}) 工作线程启动, {:.1}fps", lane, self.rig.name, self.rig.fps);

        let frame_interval = Duration::from_secs_f64(1.0 / self.rig.fps.max(0.1));
        let mut source_lost = false;
        let mut seq = 0;

        while !self.stop.load(Ordering::Relaxed) {
            let started = Instant::now();

            let observation = match self.rig.source.next_frame() {
                Some(frame) => {
                    if source_lost {
                        info!("✅ 车道{} 帧源恢复", lane);
                        source_lost = false;
                    }
                    seq = frame.seq;
                    self.observe(&frame)
                }
                None => {
                    if !source_lost {
                        warn!("❌ 车道{} 帧源不可用", lane);
                        source_lost = true;
                    }
                    LaneObservation::unavailable(lane, seq)
                }
            };

            match self.tx.try_send(observation) {
                Ok(()) => self.frames += 1,
                // tick 循环跟不上时丢弃新结果
                Err(TrySendError::Full(_)) => self.dropped += 1,
                Err(TrySendError::Disconnected(_)) => break,
            }

            thread::sleep(frame_interval.saturating_sub(started.elapsed()));
        }

        info!(
            "✅ 车道{} 工作线程退出 (发送 {} 帧, 丢弃 {} 帧)",
            lane, self.frames, self.dropped
        );
    }

    fn observe(&mut self, frame: &Frame) -> LaneObservation {
        let lane = self.rig.lane;
        let vehicles = detect_or_empty(self.rig.vehicles.as_mut(), frame, lane, "车辆");
        let hazards = if self.hazard_scan.load(Ordering::Relaxed) {
            detect_or_empty(self.rig.hazards.as_mut(), frame, lane, "隐患")
        } else {
            Vec::new()
        };

        LaneObservation {
            lane,
            frame_seq: frame.seq,
            captured_at: Instant::now(),
            frame_available: true,
            vehicles,
            hazards,
        }
    }
}

fn detect_or_empty(
    detector: &mut dyn Detector,
    frame: &Frame,
    lane: usize,
    kind: &str,
) -> Vec<Detection> {
    match detector.detect(frame) {
        Ok(boxes) => boxes,
        Err(e) => {
            debug!("❌ 车道{} {}检测失败 (帧 {}): {:#}", lane, kind, frame.seq, e);
            Vec::new()
        }
    }
}
