// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
#![allow(clippy::type_complexity)]
pub mod config; // 控制器配置参数
pub mod control; // 信号控制核心 (仲裁 + 调度)
pub mod detection; // 车道跟踪与路面隐患
pub mod input; // 帧源与检测器适配
pub mod pipeline; // 车道工作线程 + tick 循环
pub mod renderer; // 输出 (控制台 / JSON Lines)

pub use crate::config::{Args, ControllerConfig};
pub use crate::control::{
    Command, Controller, Directive, LaneInput, Mode, ModeArbiter, ModeContext, Remaining,
    SignalScheduler, TickOutput,
};
pub use crate::detection::{
    AccidentTrigger, BBox, Density, Detection, HazardAggregator, LaneReport, LaneTracker, Point,
    TrackId,
};

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%3f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
