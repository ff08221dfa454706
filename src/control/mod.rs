// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 信号控制核心
//!
//! 数据流: 车道结果 + 命令 → ModeArbiter (模式) → SignalScheduler (灯色/时长) → TickOutput
pub mod arbiter;
pub mod command;
pub mod controller;
pub mod scheduler;

pub use arbiter::{
    apply_command, transition, ArbiterInput, Directive, HoldReason, Mode, ModeArbiter,
    ModeContext, Transition,
};
pub use command::{Command, KEY_HELP};
pub use controller::{Banners, Controller, LaneInput, LaneView, TickOutput};
pub use scheduler::{
    DurationPolicy, GreenDuration, Remaining, ScheduleState, SignalAnnotation, SignalLabel,
    SignalScheduler,
};
