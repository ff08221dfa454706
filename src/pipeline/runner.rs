// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! tick 循环 (主线程)
//!
//! 每个tick: 汇总各车道最新观测 → 收集命令 → Controller::tick → 渲染。
//! tick 间隔固定, 与检测耗时无关。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use tracing::{debug, info, warn};

use super::{classify_lane, LaneObservation, LaneWorker};
use crate::control::{Command, Controller, LaneInput, Mode};
use crate::input::LaneRig;
use crate::renderer::Renderer;

/// 每条车道的观测缓冲
const LANE_CHANNEL_CAPACITY: usize = 4;

#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
    pub tick_interval: Duration,
    pub lane_timeout: Duration,
    /// 0 = 直到收到退出命令
    pub max_ticks: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub final_mode: Mode,
    pub quit_requested: bool,
}

struct LaneLink {
    lane: usize,
    rx: Receiver<LaneObservation>,
    handle: Option<JoinHandle<()>>,
    last_seen: Instant,
    disconnected: bool,
    timed_out: bool,
}

impl LaneLink {
    /// 取出最新观测并分类
    fn poll(&mut self, now: Instant, timeout: Duration) -> LaneInput {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(obs) => latest = Some(obs),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        warn!("❌ 车道{} 工作线程已退出", self.lane);
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }

        if latest.is_none() && self.disconnected {
            return LaneInput::Unavailable;
        }
        if let Some(obs) = &latest {
            let age = now.saturating_duration_since(obs.captured_at);
            if age > timeout {
                debug!(
                    "⏱ 车道{} 帧 {} 检测结果延迟 {}ms",
                    self.lane,
                    obs.frame_seq,
                    age.as_millis()
                );
            }
        }
        let input = classify_lane(latest, self.last_seen, now, timeout);
        match input {
            LaneInput::TimedOut => {
                if !self.timed_out {
                    warn!("⏱ 车道{} 检测超时 (> {}ms)", self.lane, timeout.as_millis());
                    self.timed_out = true;
                }
            }
            LaneInput::Stale => {}
            _ => {
                if self.timed_out {
                    debug!("✅ 车道{} 检测恢复", self.lane);
                    self.timed_out = false;
                }
                self.last_seen = now;
            }
        }
        input
    }
}

/// 运行控制循环直到退出命令或达到最大tick数
///
/// 返回前停止并回收所有车道线程。
pub fn run(
    mut controller: Controller,
    rigs: Vec<LaneRig>,
    commands: Receiver<Command>,
    renderers: &mut [Box<dyn Renderer>],
    options: RunOptions,
) -> Result<RunSummary> {
    let stop = Arc::new(AtomicBool::new(false));
    let hazard_scan = Arc::new(AtomicBool::new(controller.hazard_scan()));

    // ========== 启动车道线程 ==========
    let started = Instant::now();
    let mut links = Vec::with_capacity(rigs.len());
    for rig in rigs {
        let lane = rig.lane;
        let (tx, rx) = bounded::<LaneObservation>(LANE_CHANNEL_CAPACITY);
        let worker = LaneWorker::new(rig, tx, hazard_scan.clone(), stop.clone());
        let handle = match worker.spawn() {
            Ok(h) => h,
            Err(e) => {
                shutdown(&stop, links);
                return Err(e);
            }
        };
        links.push(LaneLink {
            lane,
            rx,
            handle: Some(handle),
            last_seen: started,
            disconnected: false,
            timed_out: false,
        });
    }
    links.sort_by_key(|l| l.lane);

    info!(
        "🚦 控制循环启动: {} 条车道, tick {}ms",
        links.len(),
        options.tick_interval.as_millis()
    );

    // ========== tick 循环 ==========
    let result = tick_loop(
        &mut controller,
        &mut links,
        &commands,
        renderers,
        &hazard_scan,
        options,
    );

    // ========== 停止 ==========
    shutdown(&stop, links);
    for renderer in renderers.iter_mut() {
        renderer.finish()?;
    }
    let summary = result?;

    info!("✅ 控制循环退出 ({} ticks, 模式 {:?})", summary.ticks, summary.final_mode);
    Ok(summary)
}

fn tick_loop(
    controller: &mut Controller,
    links: &mut [LaneLink],
    commands: &Receiver<Command>,
    renderers: &mut [Box<dyn Renderer>],
    hazard_scan: &AtomicBool,
    options: RunOptions,
) -> Result<RunSummary> {
    let ticker = crossbeam_channel::tick(options.tick_interval);
    let lane_count = controller.lane_count();
    let mut summary = RunSummary {
        ticks: 0,
        final_mode: controller.mode_context().mode(),
        quit_requested: false,
    };

    loop {
        ticker.recv().context("tick 时钟中断")?;
        let now = Instant::now();

        let mut inputs: Vec<LaneInput> = (0..lane_count).map(|_| LaneInput::TimedOut).collect();
        for link in links.iter_mut() {
            let input = link.poll(now, options.lane_timeout);
            if let Some(slot) = inputs.get_mut(link.lane) {
                *slot = input;
            }
        }
        let pending: Vec<Command> = commands.try_iter().collect();

        let out = controller.tick(now, inputs, &pending);
        hazard_scan.store(controller.hazard_scan(), Ordering::Relaxed);

        for renderer in renderers.iter_mut() {
            renderer.render(&out)?;
        }

        summary.ticks = out.tick;
        summary.final_mode = out.mode;
        if out.quit {
            info!("👋 收到退出命令");
            summary.quit_requested = true;
            return Ok(summary);
        }
        if options.max_ticks > 0 && out.tick >= options.max_ticks {
            info!("⏹ 达到最大tick数 {}", options.max_ticks);
            return Ok(summary);
        }
    }
}

fn shutdown(stop: &AtomicBool, links: Vec<LaneLink>) {
    stop.store(true, Ordering::Relaxed);
    let mut handles = Vec::with_capacity(links.len());
    for mut link in links {
        if let Some(h) = link.handle.take() {
            handles.push((link.lane, h));
        }
        drop(link);
    }
    for (lane, handle) in handles {
        if handle.join().is_err() {
            warn!("❌ 车道{} 工作线程异常退出", lane);
        }
    }
}
