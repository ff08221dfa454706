// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 外部推理结果回放
//!
//! JSON Lines: 每行一帧, 内容为检测框数组:
//! `[{"class": "car", "confidence": 0.91, "bbox": [x1, y1, x2, y2]}, ...]`
//! `class` 可以是类别ID或类别名, `confidence` 可简写为 `conf`。

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use super::{Detector, Frame};
use crate::detection::{BBox, ClassTable, Detection};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassRef {
    Id(u32),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct RawBox {
    class: ClassRef,
    #[serde(alias = "conf")]
    confidence: f32,
    bbox: [f32; 4],
}

/// 回放检测器: 每次调用输出下一帧的检测结果
pub struct ReplayDetector {
    frames: Vec<Vec<Detection>>,
    cursor: usize,
    looping: bool,
}

impl ReplayDetector {
    pub fn open<P: AsRef<Path>>(path: P, table: ClassTable, looping: bool) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("无法读取回放文件 {}", path.display()))?;
        let detector = Self::parse(&text, table, looping)
            .with_context(|| format!("回放文件格式错误 {}", path.display()))?;
        info!(
            "📼 回放加载: {} ({} 帧, {:?})",
            path.display(),
            detector.frames.len(),
            table
        );
        Ok(detector)
    }

    pub fn parse(text: &str, table: ClassTable, looping: bool) -> Result<Self> {
        let mut frames = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let raw: Vec<RawBox> =
                serde_json::from_str(line).with_context(|| format!("第{}行", idx + 1))?;
            let boxes = raw
                .into_iter()
                .map(|b| resolve(b, table))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("第{}行", idx + 1))?;
            frames.push(boxes);
        }
        Ok(Self {
            frames,
            cursor: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn resolve(raw: RawBox, table: ClassTable) -> Result<Detection> {
    let class_id = match raw.class {
        ClassRef::Id(id) => id,
        ClassRef::Name(name) => table
            .id_of(&name)
            .ok_or_else(|| anyhow!("未知类别: {}", name))?,
    };
    let [x1, y1, x2, y2] = raw.bbox;
    Ok(BBox::new(x1, y1, x2, y2, raw.confidence, class_id))
}

impl Detector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        if self.cursor >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return Ok(Vec::new());
            }
            debug!("🔁 回放结束, 从头开始 (帧 {})", frame.seq);
            self.cursor = 0;
        }
        let boxes = self.frames[self.cursor].clone();
        self.cursor += 1;
        Ok(boxes)
    }
}
