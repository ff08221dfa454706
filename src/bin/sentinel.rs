// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 交通卫兵 (Traffic Sentinel)
///
/// 智能交通信号控制
///
/// 系统架构:
/// 1. 车道线程: 取帧 + 检测 (每条车道一个工作线程)
/// 2. 按键线程: 标准输入命令 (E/N/P/K/C/R/Q)
/// 3. 主线程:   固定间隔 tick 循环 (仲裁 + 配时 + 渲染)
use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use traffic_signal_rs::input::{LaneRig, LaneSpec};
use traffic_signal_rs::pipeline::{self, RunOptions};
use traffic_signal_rs::renderer::{ConsoleRenderer, JsonLinesRenderer, Renderer};
use traffic_signal_rs::{Args, Controller, ControllerConfig};

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    info!("🚦 交通卫兵启动");

    // 加载配置
    let mut config = ControllerConfig::load(&args.config);
    if let Some(ms) = args.tick_ms {
        config.tick_interval_ms = ms;
    }
    config.validate().context("配置参数无效")?;
    config.print_summary();

    // 装配车道
    let rigs = build_lanes(&args, &config)?;

    // 输出
    let mut renderers: Vec<Box<dyn Renderer>> = Vec::new();
    if !args.quiet {
        renderers.push(Box::new(ConsoleRenderer::new(io::stdout())));
    }
    if let Some(path) = &args.json_out {
        let file = File::create(path).with_context(|| format!("无法创建输出文件 {}", path))?;
        info!("📝 JSON Lines 输出: {}", path);
        renderers.push(Box::new(JsonLinesRenderer::new(BufWriter::new(file))));
    }

    // 按键输入 (退出时不等待)
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    pipeline::spawn_stdin_reader(cmd_tx)?;

    let options = RunOptions {
        tick_interval: config.tick_interval(),
        lane_timeout: config.lane_timeout(),
        max_ticks: args.max_ticks,
    };
    let controller = Controller::new(config);
    let summary = pipeline::run(controller, rigs, cmd_rx, &mut renderers, options)?;

    info!(
        "👋 交通卫兵退出: {} ticks, 最终模式 {:?}",
        summary.ticks, summary.final_mode
    );
    Ok(())
}

fn build_lanes(args: &Args, config: &ControllerConfig) -> Result<Vec<LaneRig>> {
    if args.simulate {
        if !args.lanes.is_empty() {
            bail!("--simulate 与 --lane 不能同时使用");
        }
        let seed = args.seed.unwrap_or_else(rand::random);
        info!("🎲 模拟交通场景, 种子 {}", seed);
        return Ok((0..config.lane_count)
            .map(|lane| LaneRig::simulated(lane, config, seed))
            .collect());
    }

    if args.lanes.len() != config.lane_count {
        bail!(
            "需要 {} 条车道输入 (--lane), 实际 {} 条; 或使用 --simulate",
            config.lane_count,
            args.lanes.len()
        );
    }
    args.lanes
        .iter()
        .enumerate()
        .map(|(lane, raw)| {
            let spec: LaneSpec = raw
                .parse()
                .with_context(|| format!("车道{} 参数错误: {}", lane, raw))?;
            spec.build(lane, config)
        })
        .collect()
}
