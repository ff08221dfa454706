// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 帧源: 图片目录 / 空白帧

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use super::{Frame, FrameSource};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// 图片目录帧源 (按文件名排序, 逐帧读取图片头)
///
/// 无法识别的图片视为帧源不可用。
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    cursor: usize,
    seq: u64,
    looping: bool,
}

impl ImageDirSource {
    pub fn open<P: AsRef<Path>>(dir: P, looping: bool) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("无法读取目录 {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            bail!("目录中没有图片: {}", dir.display());
        }
        debug!("📂 {} 共 {} 帧", dir.display(), files.len());

        Ok(Self {
            files,
            cursor: 0,
            seq: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.cursor >= self.files.len() {
            if !self.looping {
                return None;
            }
            self.cursor = 0;
        }
        let path = &self.files[self.cursor];
        self.cursor += 1;

        let (width, height) = match image::image_dimensions(path) {
            Ok(dims) => dims,
            Err(e) => {
                warn!("❌ 图片读取失败 {}: {}", path.display(), e);
                return None;
            }
        };

        let frame = Frame {
            seq: self.seq,
            width,
            height,
        };
        self.seq += 1;
        Some(frame)
    }
}

/// 无图像的帧源 (回放/模拟车道)
pub struct BlankSource {
    width: u32,
    height: u32,
    seq: u64,
}

impl BlankSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            seq: 0,
        }
    }
}

impl FrameSource for BlankSource {
    fn next_frame(&mut self) -> Option<Frame> {
        let frame = Frame {
            seq: self.seq,
            width: self.width,
            height: self.height,
        };
        self.seq += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "traffic_signal_rs_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_blank_source_counts_frames() {
        let mut src = BlankSource::new(640, 480);
        let a = src.next_frame().unwrap();
        let b = src.next_frame().unwrap();
        assert_eq!((a.seq, b.seq), (0, 1));
        assert_eq!((b.width, b.height), (640, 480));
    }

    #[test]
    fn test_image_dir_sorted_and_looping() {
        let dir = temp_dir("frames");
        for (name, width) in [("b.png", 6u32), ("a.png", 4u32)] {
            RgbImage::from_pixel(width, 3, Rgb([128, 128, 128]))
                .save(dir.join(name))
                .unwrap();
        }
        fs::write(dir.join("notes.txt"), "skip").unwrap();

        let mut src = ImageDirSource::open(&dir, true).unwrap();
        assert_eq!(src.len(), 2);

        let first = src.next_frame().unwrap();
        assert_eq!((first.width, first.height), (4, 3));
        let second = src.next_frame().unwrap();
        assert_eq!((second.seq, second.width), (1, 6));

        let third = src.next_frame().unwrap();
        assert_eq!(third.seq, 2);

        let mut once = ImageDirSource::open(&dir, false).unwrap();
        assert!(once.next_frame().is_some());
        assert!(once.next_frame().is_some());
        assert!(once.next_frame().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unreadable_image_ends_frames() {
        let dir = temp_dir("broken");
        fs::write(dir.join("a.png"), "not an image").unwrap();
        let mut src = ImageDirSource::open(&dir, true).unwrap();
        assert!(src.next_frame().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_dir_is_error() {
        let dir = temp_dir("empty");
        assert!(ImageDirSource::open(&dir, false).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
