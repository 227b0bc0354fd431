//! 场景回放 (Scenario replay)
//!
//! 摄像头与检测模型是外部协作者, 不属于本核心; 回放器是它们的可运行替身:
//! 以 JSONL 检测轨迹逐帧驱动完整管线 (评估 → 平滑 → 调度), 每行一帧:
//!
//! ```text
//! {"width":640,"height":480,"brightness":128,"detections":[
//!   {"class_name":"person","confidence":0.91,"bbox":{"x1":100,"y1":80,"x2":220,"y2":400}}]}
//! ```
//!
//! 采集端与检测端从同一场景拆分, 一帧一检严格同步。

use std::collections::VecDeque;
use std::fs;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::detection::types::{Detection, Frame};
use crate::pipeline::{Capture, Detector};

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_brightness() -> u8 {
    128
}

/// 场景中的一帧: 帧元数据 + 该帧的检测结果
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioFrame {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// 帧平均亮度 (0-255), 回放时合成同亮度纯色帧
    #[serde(default = "default_brightness")]
    pub brightness: u8,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// 已加载的场景轨迹
#[derive(Debug)]
pub struct Scenario {
    frames: Vec<ScenarioFrame>,
}

impl Scenario {
    pub fn load(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("读取场景文件失败: {}", path))?;
        let scenario = Self::parse(&content)?;
        println!("✅ 场景已加载: {} ({} 帧)", path, scenario.frames.len());
        Ok(scenario)
    }

    /// 逐行解析 JSONL, 空行跳过
    pub fn parse(content: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let frame: ScenarioFrame = serde_json::from_str(line)
                .with_context(|| format!("场景第 {} 行解析失败", lineno + 1))?;
            frames.push(frame);
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 拆分为采集端与检测端; fps = 0 表示不限速
    pub fn split(self, fps: u32) -> (ScenarioCapture, ScenarioDetector) {
        let mut metas = VecDeque::with_capacity(self.frames.len());
        let mut detections = VecDeque::with_capacity(self.frames.len());
        for frame in self.frames {
            metas.push_back((frame.width, frame.height, frame.brightness));
            detections.push_back(frame.detections);
        }

        let interval = if fps > 0 {
            Some(Duration::from_millis(1000 / fps.max(1) as u64))
        } else {
            None
        };

        (
            ScenarioCapture {
                frames: metas,
                interval,
            },
            ScenarioDetector { detections },
        )
    }
}

/// 回放采集端: 按帧元数据合成纯色帧, 可按帧率限速
pub struct ScenarioCapture {
    frames: VecDeque<(u32, u32, u8)>,
    interval: Option<Duration>,
}

impl Capture for ScenarioCapture {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some((width, height, brightness)) = self.frames.pop_front() else {
            return Ok(None);
        };
        if let Some(interval) = self.interval {
            thread::sleep(interval);
        }
        Ok(Some(Frame::solid(width, height, brightness)))
    }
}

/// 回放检测端: 按置信度阈值过滤预录检测
pub struct ScenarioDetector {
    detections: VecDeque<Vec<Detection>>,
}

impl Detector for ScenarioDetector {
    fn detect(&mut self, _frame: &Frame, conf_threshold: f32) -> Result<Vec<Detection>> {
        let detections = self.detections.pop_front().unwrap_or_default();
        Ok(detections
            .into_iter()
            .filter(|d| d.confidence >= conf_threshold)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
{"width":64,"height":48,"brightness":128,"detections":[{"class_name":"person","confidence":0.9,"bbox":{"x1":0,"y1":0,"x2":30,"y2":40}}]}
{"brightness":10}
{"detections":[{"class_name":"knife","confidence":0.3,"bbox":{"x1":20,"y1":20,"x2":30,"y2":30}}]}
"#;

    #[test]
    fn test_parse_jsonl_with_defaults() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.len(), 3);
        assert_eq!(scenario.frames[0].width, 64);
        assert_eq!(scenario.frames[1].width, 640); // 缺省宽度
        assert_eq!(scenario.frames[1].brightness, 10);
        assert!(scenario.frames[1].detections.is_empty());
    }

    #[test]
    fn test_capture_and_detector_stay_in_lockstep() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let (mut capture, mut detector) = scenario.split(0);

        let frame1 = capture.read_frame().unwrap().unwrap();
        assert_eq!(frame1.width(), 64);
        let det1 = detector.detect(&frame1, 0.5).unwrap();
        assert_eq!(det1.len(), 1);
        assert_eq!(det1[0].class_name, "person");

        let frame2 = capture.read_frame().unwrap().unwrap();
        assert_eq!(frame2.brightness(), 10.0);
        assert!(detector.detect(&frame2, 0.5).unwrap().is_empty());

        // 第三帧: 置信度 0.3 < 阈值 0.5, 被过滤
        let frame3 = capture.read_frame().unwrap().unwrap();
        assert!(detector.detect(&frame3, 0.5).unwrap().is_empty());

        // 源耗尽
        assert!(capture.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_low_threshold_keeps_detection() {
        // 低阈值 0.15 时第三帧的 0.3 置信度检测得以保留
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let (_, mut detector) = scenario.split(0);
        let frame = Frame::solid(64, 48, 128);
        detector.detect(&frame, 0.15).unwrap();
        detector.detect(&frame, 0.15).unwrap();
        let det3 = detector.detect(&frame, 0.15).unwrap();
        assert_eq!(det3.len(), 1);
        assert_eq!(det3[0].class_name, "knife");
    }

    #[test]
    fn test_bad_line_reports_lineno() {
        let err = Scenario::parse("{\"width\":64}\nnot-json\n").unwrap_err();
        assert!(format!("{:#}", err).contains("第 2 行"));
    }
}
