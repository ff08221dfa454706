// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 外部命令 (按键 → 命令)

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// 外部命令事件, 每个tick在汇合点统一生效
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    EmergencyOn,
    EmergencyOff,
    HazardScanOn,
    HazardScanOff,
    ConfirmAccident,
    ResetAccident,
    Quit,
}

static KEY_BINDINGS: phf::Map<char, Command> = phf_map! {
    'e' => Command::EmergencyOn,
    'n' => Command::EmergencyOff,
    'p' => Command::HazardScanOn,
    'k' => Command::HazardScanOff,
    'c' => Command::ConfirmAccident,
    'r' => Command::ResetAccident,
    'q' => Command::Quit,
};

/// 操作提示 (仪表盘底栏)
pub const KEY_HELP: &str =
    "E-Emergency  N-Normal  P-Pothole ON  K-Pothole OFF  C-Confirm Accident  R-Reset Accident  Q-Quit";

impl Command {
    /// 按键映射, 未知按键返回 None
    pub fn from_key(key: char) -> Option<Self> {
        KEY_BINDINGS.get(&key.to_ascii_lowercase()).copied()
    }

    /// 解析一行输入中的所有按键, 忽略空白与未知字符
    pub fn parse_line(line: &str) -> Vec<Self> {
        line.chars()
            .filter(|c| !c.is_whitespace())
            .filter_map(Self::from_key)
            .collect()
    }
}
