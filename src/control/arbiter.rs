// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 模式仲裁 (Mode Arbiter)
//!
//! 优先级: 事故锁定 > 紧急车辆锁定 > 正常轮转
//!
//! 状态转移为纯函数: 输入当前 `ModeContext` 与本tick输入, 返回下一状态与调度指令。
//! `ModeArbiter` 只负责持有状态并记录日志。

use serde::Serialize;
use tracing::{debug, info, warn};

use super::command::Command;
use crate::detection::AccidentTrigger;

// ========== 状态 ==========

/// 全局模式上下文
///
/// 不变式: `accident_lane.is_some() == accident_mode`;
/// `active_emergency_lane` 仅在 `emergency_mode` 且已锁定车道时存在。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModeContext {
    pub accident_mode: bool,
    pub accident_confirmed: bool,
    pub accident_lane: Option<usize>,
    pub emergency_mode: bool,
    pub active_emergency_lane: Option<usize>,
}

/// 当前生效的模式 (由上下文推导)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Normal,
    EmergencyLocked,
    AccidentLocked,
}

impl ModeContext {
    pub fn mode(&self) -> Mode {
        if self.accident_mode {
            Mode::AccidentLocked
        } else if self.emergency_mode && self.active_emergency_lane.is_some() {
            Mode::EmergencyLocked
        } else {
            Mode::Normal
        }
    }

    /// 事故已识别, 等待人工确认
    pub fn accident_pending(&self) -> bool {
        self.accident_mode && !self.accident_confirmed
    }

    /// 绿色通道生效中
    pub fn emergency_active(&self) -> bool {
        self.emergency_mode && self.active_emergency_lane.is_some()
    }
}

// ========== 指令 ==========

/// 无限期绿灯的原因
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoldReason {
    Accident,
    Emergency,
}

/// 仲裁结果 → 信号调度
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    /// 固定车道, 无限时长
    Hold { lane: usize, reason: HoldReason },
    /// 正常轮转
    Rotate,
    /// 回到正常模式, 当前车道以基础时长重新计时
    RestartBase,
}

/// 仲裁输入 (汇合后的全车道结果)
#[derive(Clone, Debug)]
pub struct ArbiterInput<'a> {
    /// 按车道顺序的第一个事故触发
    pub trigger: Option<AccidentTrigger>,
    /// 各车道本tick是否检测到紧急车辆
    pub emergency_flags: &'a [bool],
}

/// 一次状态转移
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: ModeContext,
    pub directive: Directive,
    /// 被采纳的事故触发
    pub accepted: Option<AccidentTrigger>,
}

// ========== 纯转移函数 ==========

/// 每tick仲裁
pub fn transition(ctx: &ModeContext, input: &ArbiterInput<'_>) -> Transition {
    let mut next = ctx.clone();

    // 1. 事故 (最高优先级)
    let mut accepted = None;
    if !next.accident_mode {
        if let Some(trigger) = input.trigger {
            next.accident_mode = true;
            next.accident_confirmed = false;
            next.accident_lane = Some(trigger.lane);
            // 事故抢占紧急通道
            next.emergency_mode = false;
            next.active_emergency_lane = None;
            accepted = Some(trigger);
        }
    }
    if let Some(lane) = next.accident_lane {
        return Transition {
            next,
            directive: Directive::Hold {
                lane,
                reason: HoldReason::Accident,
            },
            accepted,
        };
    }

    // 2. 紧急车辆
    if next.emergency_mode {
        let flagged = |lane: usize| input.emergency_flags.get(lane).copied().unwrap_or(false);

        if next.active_emergency_lane.is_none() {
            next.active_emergency_lane = (0..input.emergency_flags.len()).find(|&l| flagged(l));
        }

        let directive = match next.active_emergency_lane {
            Some(lane) if flagged(lane) => Directive::Hold {
                lane,
                reason: HoldReason::Emergency,
            },
            // 锁定车道不再检测到紧急车辆, 或始终没有可锁定车道
            _ => {
                next.emergency_mode = false;
                next.active_emergency_lane = None;
                Directive::RestartBase
            }
        };
        return Transition {
            next,
            directive,
            accepted,
        };
    }

    // 3. 正常轮转
    Transition {
        next,
        directive: Directive::Rotate,
        accepted,
    }
}

/// 应用外部命令; 需要重新计时时返回 `RestartBase`
///
/// 隐患扫描与退出命令不影响模式, 原样返回。
pub fn apply_command(ctx: &ModeContext, command: Command) -> (ModeContext, Option<Directive>) {
    let mut next = ctx.clone();
    let directive = match command {
        Command::EmergencyOn => {
            if !next.accident_mode {
                next.emergency_mode = true;
                next.active_emergency_lane = None;
            }
            None
        }
        Command::EmergencyOff => {
            next.emergency_mode = false;
            next.active_emergency_lane = None;
            (!next.accident_mode).then_some(Directive::RestartBase)
        }
        Command::ConfirmAccident => {
            if next.accident_mode {
                next.accident_confirmed = true;
            }
            None
        }
        Command::ResetAccident => {
            if next.accident_mode {
                next.accident_mode = false;
                next.accident_confirmed = false;
                next.accident_lane = None;
                Some(Directive::RestartBase)
            } else {
                None
            }
        }
        Command::HazardScanOn | Command::HazardScanOff | Command::Quit => None,
    };
    (next, directive)
}

// ========== 仲裁器 ==========

/// 持有模式上下文的仲裁器 (由 Controller 独占)
#[derive(Debug, Default)]
pub struct ModeArbiter {
    ctx: ModeContext,
}

impl ModeArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &ModeContext {
        &self.ctx
    }

    pub fn mode(&self) -> Mode {
        self.ctx.mode()
    }

    /// 应用一条命令
    pub fn apply(&mut self, command: Command) -> Option<Directive> {
        let (next, directive) = apply_command(&self.ctx, command);
        if next == self.ctx && directive.is_none() {
            debug!("⌨️  命令 {:?} 无效果, 忽略", command);
        } else {
            match command {
                Command::EmergencyOn => info!("🚑 紧急模式开启, 搜索紧急车辆"),
                Command::EmergencyOff => info!("🟢 紧急模式关闭, 恢复正常轮转"),
                Command::ConfirmAccident => info!("🛠 事故已确认, 清障进行中"),
                Command::ResetAccident => info!("✅ 事故解除, 恢复正常轮转"),
                _ => {}
            }
        }
        self.ctx = next;
        directive
    }

    /// 每tick仲裁
    pub fn step(&mut self, input: &ArbiterInput<'_>) -> Transition {
        let t = transition(&self.ctx, input);

        if let Some(trigger) = t.accepted {
            warn!(
                "⚠️  AI检测到事故: 车道{} (轨迹{}), 锁定绿灯等待确认",
                trigger.lane, trigger.track
            );
        }
        if t.next.active_emergency_lane != self.ctx.active_emergency_lane {
            match t.next.active_emergency_lane {
                Some(lane) => info!("🚑 紧急车辆: 车道{} 绿色通道开启", lane),
                None if self.ctx.active_emergency_lane.is_some() => {
                    info!("🟢 紧急车辆已通过, 恢复正常轮转")
                }
                None => {}
            }
        } else if self.ctx.emergency_mode
            && !t.next.emergency_mode
            && !t.next.accident_mode
        {
            info!("🟢 未发现紧急车辆, 恢复正常轮转");
        }

        self.ctx = t.next.clone();
        t
    }
}
