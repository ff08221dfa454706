// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 控制器配置 - 命令行参数 + JSON 调参文件

use anyhow::{bail, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::{info, warn};

/// 智能交通信号控制参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "智能交通信号控制 - Smart Traffic Signal Controller", long_about = None)]
pub struct Args {
    /// 配置文件路径 (JSON, 不存在时自动生成默认配置)
    #[arg(short, long, default_value = "traffic_config.json")]
    pub config: String,

    /// 车道输入, 每条车道一个:
    /// frames=<图片目录>,vehicles=<车辆回放.jsonl>,hazards=<隐患回放.jsonl>,fps=25,loop
    #[arg(short, long = "lane")]
    pub lanes: Vec<String>,

    /// 使用模拟交通场景 (无需外部检测器)
    #[arg(long, default_value_t = false)]
    pub simulate: bool,

    /// 模拟场景随机种子
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON Lines 输出文件 (每个tick一行)
    #[arg(long)]
    pub json_out: Option<String>,

    /// 最大tick数 (0 = 直到收到退出命令)
    #[arg(long, default_value_t = 0)]
    pub max_ticks: u64,

    /// tick间隔(毫秒), 覆盖配置文件
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// 日志过滤 (tracing EnvFilter 语法)
    #[arg(long, default_value = "traffic_signal_rs=info,sentinel=info")]
    pub log: String,

    /// 关闭控制台仪表盘
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

/// 控制器参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // === 信号配时 ===
    pub base_green_secs: u64,  // 基础绿灯时长
    pub heavy_bonus_secs: u64, // 拥堵车道追加时长
    pub heavy_threshold: usize, // 拥堵阈值 (车辆数 > 阈值)
    pub low_density_threshold: usize, // 低密度阈值 (事故判定门限)

    // === 停滞/事故判定 ===
    pub stall_distance_px: f32, // 位移噪声下限(像素)
    pub stall_time_secs: u64,   // 最小停滞时长

    // === 路面隐患 ===
    pub hazard_conf_threshold: f32,
    pub hazard_class_id: u32,

    // === 车道 ===
    pub lane_count: usize,
    pub lane_names: Vec<String>,

    // === 类别表 ===
    pub vehicle_class_ids: Vec<u32>,
    pub emergency_class_ids: Vec<u32>,

    // === 跟踪 ===
    pub match_distance_px: f32, // 最近邻匹配半径
    pub max_missed_ticks: u64,  // 轨迹最大丢失tick数

    // === 流水线 ===
    pub tick_interval_ms: u64,
    pub lane_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_green_secs: 20,
            heavy_bonus_secs: 20,
            heavy_threshold: 15,
            low_density_threshold: 5,

            stall_distance_px: 5.0,
            stall_time_secs: 16,

            hazard_conf_threshold: 0.5,
            hazard_class_id: 0,

            lane_count: 4,
            lane_names: (1..=4).map(|i| format!("Lane {}", i)).collect(),

            // COCO: 1=bicycle 2=car 3=motorcycle 5=bus 7=truck, 80=ambulance (扩展类别)
            vehicle_class_ids: vec![1, 2, 3, 5, 7, 80],
            emergency_class_ids: vec![80],

            match_distance_px: 50.0,
            max_missed_ticks: 5,

            tick_interval_ms: 40,
            lane_timeout_ms: 500,
        }
    }
}

impl ControllerConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写入默认配置; 解析失败时告警并使用默认值。
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path);
        Ok(())
    }

    /// 检查参数合法性
    pub fn validate(&self) -> Result<()> {
        if self.base_green_secs == 0 {
            bail!("base_green_secs 必须大于 0");
        }
        if self.stall_time_secs == 0 {
            bail!("stall_time_secs 必须大于 0");
        }
        if !(self.stall_distance_px > 0.0) {
            bail!("stall_distance_px 必须为正数: {}", self.stall_distance_px);
        }
        if !(self.match_distance_px > 0.0) {
            bail!("match_distance_px 必须为正数: {}", self.match_distance_px);
        }
        if !(0.0..=1.0).contains(&self.hazard_conf_threshold) {
            bail!(
                "hazard_conf_threshold 超出范围 [0, 1]: {}",
                self.hazard_conf_threshold
            );
        }
        if self.lane_count == 0 {
            bail!("lane_count 必须大于 0");
        }
        if self.lane_names.len() != self.lane_count {
            bail!(
                "lane_names 数量 ({}) 与 lane_count ({}) 不一致",
                self.lane_names.len(),
                self.lane_count
            );
        }
        if self.vehicle_class_ids.is_empty() {
            bail!("vehicle_class_ids 不能为空");
        }
        if self.emergency_class_ids.is_empty() {
            bail!("emergency_class_ids 不能为空");
        }
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms 必须大于 0");
        }
        Ok(())
    }

    pub fn base_green(&self) -> Duration {
        Duration::from_secs(self.base_green_secs)
    }

    pub fn heavy_bonus(&self) -> Duration {
        Duration::from_secs(self.heavy_bonus_secs)
    }

    pub fn stall_time(&self) -> Duration {
        Duration::from_secs(self.stall_time_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn lane_timeout(&self) -> Duration {
        Duration::from_millis(self.lane_timeout_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前信号配置:");
        info!(
            "  绿灯: 基础 {}s, 拥堵追加 {}s (车辆 > {})",
            self.base_green_secs, self.heavy_bonus_secs, self.heavy_threshold
        );
        info!(
            "  事故判定: 停滞 < {:.1}px 持续 ≥ {}s, 车辆 ≤ {}",
            self.stall_distance_px, self.stall_time_secs, self.low_density_threshold
        );
        info!("  隐患置信度: > {:.2}", self.hazard_conf_threshold);
        info!("  车道: {}", self.lane_names.join(" | "));
    }
}
