// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 车道感知系统 (Lane Perception)
//!
//! 每条车道独立处理, 只消费外部检测器的结构化结果:
//! - Tracker: 车辆计数 + 停滞/事故判定
//! - Hazard:  路面隐患 (坑洼) 汇总
pub mod hazard;
pub mod tracker;
pub mod types;

pub use hazard::{any_hazard, HazardAggregator, HazardReport};
pub use tracker::{AccidentTrigger, LaneReport, LaneTracker, TrackRecord, TrackerParams};
pub use types::{BBox, ClassTable, Density, Detection, Point, TrackId};
