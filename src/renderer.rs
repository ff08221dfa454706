// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 输出渲染: 控制台仪表盘 / JSON Lines

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::control::{LaneView, SignalLabel, TickOutput, KEY_HELP};
use crate::gen_time_string;

pub const TITLE: &str = "SMART TRAFFIC MANAGEMENT SYSTEM";

pub const BANNER_EMERGENCY: &str = "🚑 EMERGENCY VEHICLE DETECTED - GREEN CORRIDOR ACTIVE";
pub const BANNER_ACCIDENT_PENDING: &str = "⚠ AI DETECTED ACCIDENT - PRESS C TO CONFIRM";
pub const BANNER_ACCIDENT_CONFIRMED: &str = "🛠 ACCIDENT CONFIRMED - CLEARANCE IN PROGRESS";
pub const BANNER_HAZARD: &str = "🕳️ POTHOLE MODE ACTIVE - ROAD DAMAGE DETECTED";

/// tick 输出的消费者 (主线程调用)
pub trait Renderer {
    fn render(&mut self, out: &TickOutput) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

// ========== 控制台仪表盘 ==========

/// 文本仪表盘, 内容变化时才重绘
pub struct ConsoleRenderer<W: Write> {
    out: W,
    last: Option<String>,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn lane_line(lane: &LaneView) -> String {
    let timer = match (lane.signal, lane.remaining) {
        (SignalLabel::Green, Some(r)) => r.to_string(),
        _ => String::new(),
    };
    let signal = format!("{} {}", lane.annotation.label(), timer);
    let mut line = format!(
        "{:<10} Vehicles: {:<3} Density: {:<6} {:<24}",
        lane.name,
        lane.vehicle_count,
        lane.density.label(),
        signal.trim_end()
    );
    if lane.hazard {
        line.push_str(&format!(" POTHOLE ALERT x{}", lane.hazard_hits));
    }
    line.trim_end().to_string()
}

/// 仪表盘文本 (不含时间, 用于变化检测)
pub fn dashboard(out: &TickOutput) -> String {
    let mut lines = vec![format!("===== {} =====", TITLE)];
    lines.extend(out.lanes.iter().map(lane_line));

    let banners = &out.banners;
    if banners.emergency_active {
        lines.push(BANNER_EMERGENCY.to_string());
    }
    if banners.accident_pending {
        lines.push(BANNER_ACCIDENT_PENDING.to_string());
    }
    if banners.accident_confirmed {
        lines.push(BANNER_ACCIDENT_CONFIRMED.to_string());
    }
    if banners.hazard_alert {
        lines.push(BANNER_HAZARD.to_string());
    }
    lines.push(KEY_HELP.to_string());
    lines.join("\n")
}

impl<W: Write> Renderer for ConsoleRenderer<W> {
    fn render(&mut self, out: &TickOutput) -> Result<()> {
        let text = dashboard(out);
        if self.last.as_deref() == Some(text.as_str()) {
            return Ok(());
        }
        writeln!(self.out, "{}\n", text).context("仪表盘输出失败")?;
        self.out.flush()?;
        self.last = Some(text);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

// ========== JSON Lines ==========

#[derive(Serialize)]
struct Record<'a> {
    timestamp: String,
    #[serde(flatten)]
    output: &'a TickOutput,
}

/// 每tick一行 JSON
pub struct JsonLinesRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for JsonLinesRenderer<W> {
    fn render(&mut self, out: &TickOutput) -> Result<()> {
        let record = Record {
            timestamp: gen_time_string("-"),
            output: out,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().context("JSON 输出刷新失败")
    }
}
