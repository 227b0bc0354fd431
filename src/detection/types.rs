/// 检测报警管线数据结构定义
/// Data structures for the detection-to-alert pipeline
use std::collections::BTreeSet;

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

// ========== 公共常量 ==========

/// 亮度下限 (0-255 均值), 低于此值视为照明异常
pub const BRIGHTNESS_FLOOR: f32 = 30.0;

/// 照明异常时写入 objects 集合的标记
pub const POOR_LIGHTING: &str = "poor_lighting";

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box), 帧像素坐标系
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// 中心点 (cx, cy)
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// 对角线长度
    pub fn diagonal(&self) -> f32 {
        (self.width().powi(2) + self.height().powi(2)).sqrt()
    }

    /// 两框中心点欧氏距离
    pub fn center_distance(&self, another: &BBox) -> f32 {
        let (cx1, cy1) = self.center();
        let (cx2, cy2) = another.center();
        ((cx2 - cx1).powi(2) + (cy2 - cy1).powi(2)).sqrt()
    }
}

/// 单个检测结果 (外部检测器每帧产出, 核心只读)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BBox,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

/// 帧级威胁状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatStatus {
    Normal,
    Caution,
    HighThreat,
    Warning,
}

impl ThreatStatus {
    /// 状态展示文案 (报警邮件与日志使用)
    pub fn label(&self) -> &'static str {
        match self {
            ThreatStatus::Normal => "Normal",
            ThreatStatus::Caution => "CAUTION: Weapon Detected",
            ThreatStatus::HighThreat => "HIGH THREAT: Person with Weapon!",
            ThreatStatus::Warning => "Warning: Poor lighting or camera blocked",
        }
    }
}

/// 单帧评估结果 (几何评估器每帧新建, 返回后不再修改)
#[derive(Clone, Debug, PartialEq)]
pub struct FrameAssessment {
    /// 本帧原始威胁判定 (仅由当前帧检测决定, 无记忆)
    pub raw_threat: bool,
    /// 威胁评分
    pub score: u32,
    /// 检出目标类别集合
    pub objects: BTreeSet<String>,
    pub status: ThreatStatus,
}

impl FrameAssessment {
    pub fn normal(objects: BTreeSet<String>) -> Self {
        Self {
            raw_threat: false,
            score: 0,
            objects,
            status: ThreatStatus::Normal,
        }
    }

    /// 照明异常评估, 与检测内容无关
    pub fn poor_lighting() -> Self {
        let mut objects = BTreeSet::new();
        objects.insert(POOR_LIGHTING.to_string());
        Self {
            raw_threat: false,
            score: 0,
            objects,
            status: ThreatStatus::Warning,
        }
    }
}

/// 采集帧: 主循环独占持有像素数据, 暴露宽高与亮度
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// 纯色帧 (场景回放与测试使用)
    pub fn solid(width: u32, height: u32, luma: u8) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, Rgb([luma, luma, luma])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// 平均亮度 (0-255), 隔点采样以控制每帧开销
    pub fn brightness(&self) -> f32 {
        let raw = self.image.as_raw();
        if raw.is_empty() {
            return 0.0;
        }
        let mut sum: u64 = 0;
        let mut count: u64 = 0;
        for byte in raw.iter().step_by(4) {
            sum += *byte as u64;
            count += 1;
        }
        sum as f32 / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_geometry() {
        let bbox = BBox::new(0.0, 0.0, 30.0, 40.0);
        assert_eq!(bbox.width(), 30.0);
        assert_eq!(bbox.height(), 40.0);
        assert_eq!(bbox.diagonal(), 50.0);
        assert_eq!(bbox.center(), (15.0, 20.0));

        let another = BBox::new(30.0, 40.0, 60.0, 80.0);
        assert_eq!(bbox.center_distance(&another), 50.0);
    }

    #[test]
    fn test_solid_frame_brightness() {
        let frame = Frame::solid(64, 48, 120);
        assert_eq!(frame.brightness(), 120.0);
        assert!(!frame.is_empty());
    }
}
