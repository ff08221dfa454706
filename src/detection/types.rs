// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 交通检测数据结构定义
/// Data structures for traffic detection
use phf::phf_map;
use serde::{Deserialize, Serialize};

// ========== 类别表 ==========

/// 车辆检测模型类别 (COCO + 扩展类别)
pub static VEHICLE_CLASSES: phf::Map<&'static str, u32> = phf_map! {
    "person" => 0,
    "bicycle" => 1,
    "car" => 2,
    "motorcycle" => 3,
    "airplane" => 4,
    "bus" => 5,
    "train" => 6,
    "truck" => 7,
    "boat" => 8,
    "traffic light" => 9,
    "ambulance" => 80,
    "fire truck" => 81,
};

/// 路面隐患模型类别
pub static HAZARD_CLASSES: phf::Map<&'static str, u32> = phf_map! {
    "pothole" => 0,
    "crack" => 1,
};

/// 类别表选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassTable {
    Vehicle,
    Hazard,
}

impl ClassTable {
    fn map(&self) -> &'static phf::Map<&'static str, u32> {
        match self {
            ClassTable::Vehicle => &VEHICLE_CLASSES,
            ClassTable::Hazard => &HAZARD_CLASSES,
        }
    }

    /// 类别名 → 类别ID
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.map().get(name.trim().to_lowercase().as_str()).copied()
    }
}

// ========== 数据结构 ==========

/// 像素坐标点
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 欧氏距离(像素)
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// 检测框 (Detection bounding box)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    /// 以中心点构造
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32, confidence: f32, class_id: u32) -> Self {
        Self::new(
            cx - w / 2.0,
            cy - h / 2.0,
            cx + w / 2.0,
            cy + h / 2.0,
            confidence,
            class_id,
        )
    }

    /// 获取中心点
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// 外部检测器的单个输出
pub type Detection = BBox;

/// 轨迹ID (车道内唯一)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrackId(pub u32);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 车流密度等级 (仅用于显示)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Density {
    Low,
    Medium,
    High,
}

impl Density {
    /// LOW: ≤ low, HIGH: > heavy, 其余 MEDIUM
    pub fn classify(count: usize, low_threshold: usize, heavy_threshold: usize) -> Self {
        if count <= low_threshold {
            Density::Low
        } else if count <= heavy_threshold {
            Density::Medium
        } else {
            Density::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Density::Low => "LOW",
            Density::Medium => "MEDIUM",
            Density::High => "HIGH",
        }
    }
}
