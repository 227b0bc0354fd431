//! 主循环 (Orchestrating Loop)
//!
//! capture → evaluate → smooth → dispatch, 每帧一次。
//! 这是唯一允许阻塞在采集与推理上的路径; 帧内错误就地恢复并跳帧,
//! 只有采集源失败才终止循环。报警邮件发送在调度器内部走专职线程,
//! 主循环永不等待网络 I/O。

use std::time::Instant;

use anyhow::{Context, Result};

use crate::detection::policy::GeometryEvaluator;
use crate::detection::smoother::TemporalSmoother;
use crate::detection::types::{Detection, Frame, FrameAssessment};
use crate::notify::dispatcher::Dispatcher;

/// 采集接口 (外部协作者)
///
/// Ok(Some) = 一帧; Ok(None) = 源正常结束; Err = 采集失败 (致命)
pub trait Capture {
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}

/// 检测接口 (外部协作者, 推理)
///
/// 推理失败返回 Err, 调用方跳帧而非崩溃
pub trait Detector {
    fn detect(&mut self, frame: &Frame, conf_threshold: f32) -> Result<Vec<Detection>>;
}

/// 单帧处理结果: 交给展示层的唯一出口
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub assessment: FrameAssessment,
    /// 平滑后的稳定报警状态
    pub stabilized: bool,
}

pub struct Pipeline<C: Capture, D: Detector> {
    capture: C,
    detector: D,
    evaluator: GeometryEvaluator,
    smoother: TemporalSmoother,
    dispatcher: Dispatcher,
    conf_threshold: f32,

    // 统计
    frame_count: u64,
    threat_streak: u64,
    total_threats: u64,
    window_started: Instant,
    window_frames: u64,
}

impl<C: Capture, D: Detector> Pipeline<C, D> {
    pub fn new(
        capture: C,
        detector: D,
        evaluator: GeometryEvaluator,
        smoother: TemporalSmoother,
        dispatcher: Dispatcher,
        conf_threshold: f32,
    ) -> Self {
        Self {
            capture,
            detector,
            evaluator,
            smoother,
            dispatcher,
            conf_threshold,
            frame_count: 0,
            threat_streak: 0,
            total_threats: 0,
            window_started: Instant::now(),
            window_frames: 0,
        }
    }

    /// 运行到采集源结束; 采集失败向上传播
    pub fn run(&mut self) -> Result<()> {
        println!("🚀 监控主循环启动 (策略: {})", self.evaluator.policy_name());

        loop {
            let frame = match self.capture.read_frame().context("采集源失败")? {
                Some(frame) => frame,
                None => break,
            };
            self.step(frame);
        }

        println!(
            "✅ 采集源结束: 共处理 {} 帧, 威胁事件 {} 次",
            self.frame_count, self.total_threats
        );
        Ok(())
    }

    /// 单帧处理; 帧内错误就地恢复, 返回 None 表示本帧被跳过
    pub fn step(&mut self, frame: Frame) -> Option<StepOutcome> {
        self.frame_count += 1;

        if frame.is_empty() {
            if self.frame_count % 30 == 1 {
                eprintln!("⚠️ 空帧, 跳过 (帧 {})", self.frame_count);
            }
            return None;
        }

        let detections = match self.detector.detect(&frame, self.conf_threshold) {
            Ok(detections) => detections,
            Err(e) => {
                eprintln!("❌ 推理失败 (帧 {}): {:#}", self.frame_count, e);
                return None;
            }
        };

        let assessment = self.evaluator.evaluate(&frame, &detections);

        // 威胁连发统计: 仅上升沿计一次事件
        if assessment.raw_threat {
            self.threat_streak += 1;
            if self.threat_streak == 1 {
                self.total_threats += 1;
                println!(
                    "🎯 威胁事件 #{} (帧 {}): {}",
                    self.total_threats,
                    self.frame_count,
                    assessment.status.label()
                );
            }
        } else {
            self.threat_streak = 0;
        }

        let stabilized = self.smoother.update(assessment.raw_threat);
        self.dispatcher.dispatch(stabilized, &frame, &assessment);

        self.log_throughput();

        Some(StepOutcome {
            assessment,
            stabilized,
        })
    }

    /// 每 30 帧一行吞吐统计
    fn log_throughput(&mut self) {
        self.window_frames += 1;
        if self.window_frames >= 30 {
            let elapsed = self.window_started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                println!(
                    "📊 帧 {} | {:.1}fps | 威胁事件 {} 次 | 布防: {}",
                    self.frame_count,
                    self.window_frames as f64 / elapsed,
                    self.total_threats,
                    if self.smoother.stabilized() { "是" } else { "否" }
                );
            }
            self.window_started = Instant::now();
            self.window_frames = 0;
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn total_threats(&self) -> u64 {
        self.total_threats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;

    use crate::detection::policy::ProximityPolicy;
    use crate::detection::types::{BBox, BRIGHTNESS_FLOOR};
    use crate::notify::actuator::Actuator;
    use crate::notify::dispatcher::AlertChannel;
    use crate::TemporalSmoother;

    /// 脚本化采集源: 预置帧序列, 耗尽即结束
    struct ScriptedCapture {
        frames: VecDeque<Frame>,
    }

    impl Capture for ScriptedCapture {
        fn read_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.frames.pop_front())
        }
    }

    /// 脚本化检测器: 逐帧返回预置结果 (或失败)
    struct ScriptedDetector {
        results: VecDeque<Result<Vec<Detection>>>,
    }

    impl Detector for ScriptedDetector {
        fn detect(&mut self, _frame: &Frame, _conf: f32) -> Result<Vec<Detection>> {
            self.results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct RecordingActuator {
        writes: Arc<Mutex<Vec<bool>>>,
    }

    impl Actuator for RecordingActuator {
        fn signal(&mut self, armed: bool) -> Result<()> {
            self.writes.lock().unwrap().push(armed);
            Ok(())
        }
    }

    fn weapon_classes() -> Vec<String> {
        vec!["knife".to_string()]
    }

    fn threat_detections() -> Vec<Detection> {
        vec![
            Detection::new("person", 0.9, BBox::new(0.0, 0.0, 30.0, 40.0)),
            Detection::new("knife", 0.8, BBox::new(20.0, 20.0, 30.0, 30.0)),
        ]
    }

    fn build_pipeline(
        frames: Vec<Frame>,
        results: Vec<Result<Vec<Detection>>>,
        writes: Arc<Mutex<Vec<bool>>>,
    ) -> Pipeline<ScriptedCapture, ScriptedDetector> {
        let capture = ScriptedCapture {
            frames: frames.into(),
        };
        let detector = ScriptedDetector {
            results: results.into(),
        };
        let evaluator = GeometryEvaluator::new(
            Box::new(ProximityPolicy::new(weapon_classes())),
            BRIGHTNESS_FLOOR,
        );
        let dispatcher = Dispatcher::new(
            Some(Box::new(RecordingActuator { writes })),
            AlertChannel::Disabled,
            std::time::Duration::from_secs(60),
        );
        Pipeline::new(
            capture,
            detector,
            evaluator,
            TemporalSmoother::default(),
            dispatcher,
            0.5,
        )
    }

    #[test]
    fn test_actuator_writes_match_transitions_not_frames() {
        // 40 帧: 前 2 帧威胁 → 布防一次, 保持期耗尽后撤防一次
        let frames: Vec<Frame> = (0..40).map(|_| Frame::solid(64, 48, 128)).collect();
        let mut results: Vec<Result<Vec<Detection>>> = Vec::new();
        results.push(Ok(threat_detections()));
        results.push(Ok(threat_detections()));
        for _ in 2..40 {
            results.push(Ok(Vec::new()));
        }

        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = build_pipeline(frames, results, writes.clone());
        pipeline.run().unwrap();

        // 40 帧只有 2 次写入: 布防 + 撤防
        assert_eq!(*writes.lock().unwrap(), vec![true, false]);
        assert_eq!(pipeline.frame_count(), 40);
        assert_eq!(pipeline.total_threats(), 1);
    }

    #[test]
    fn test_detector_failure_skips_frame_keeps_loop() {
        let frames: Vec<Frame> = (0..3).map(|_| Frame::solid(64, 48, 128)).collect();
        let results: Vec<Result<Vec<Detection>>> = vec![
            Ok(Vec::new()),
            Err(anyhow!("模拟推理失败")),
            Ok(Vec::new()),
        ];

        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = build_pipeline(frames, results, writes);
        pipeline.run().unwrap();

        // 失败帧被跳过, 循环仍然处理完 3 帧
        assert_eq!(pipeline.frame_count(), 3);
    }

    #[test]
    fn test_empty_frame_skipped() {
        let frames = vec![Frame::solid(0, 0, 0), Frame::solid(64, 48, 128)];
        let results: Vec<Result<Vec<Detection>>> = vec![Ok(Vec::new()), Ok(Vec::new())];

        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = build_pipeline(frames, results, writes);
        pipeline.run().unwrap();
        assert_eq!(pipeline.frame_count(), 2);
    }

    #[test]
    fn test_dark_frames_never_arm() {
        // 暗帧 + 威胁检测: 亮度闸门压制, 不得布防
        let frames: Vec<Frame> = (0..20).map(|_| Frame::solid(64, 48, 10)).collect();
        let results: Vec<Result<Vec<Detection>>> =
            (0..20).map(|_| Ok(threat_detections())).collect();

        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = build_pipeline(frames, results, writes.clone());
        pipeline.run().unwrap();

        assert!(writes.lock().unwrap().is_empty());
        assert_eq!(pipeline.total_threats(), 0);
    }

    #[test]
    fn test_capture_failure_is_fatal() {
        struct FailingCapture;
        impl Capture for FailingCapture {
            fn read_frame(&mut self) -> Result<Option<Frame>> {
                Err(anyhow!("设备离线"))
            }
        }

        let detector = ScriptedDetector {
            results: VecDeque::new(),
        };
        let evaluator = GeometryEvaluator::new(
            Box::new(ProximityPolicy::new(weapon_classes())),
            BRIGHTNESS_FLOOR,
        );
        let dispatcher = Dispatcher::new(
            None,
            AlertChannel::Disabled,
            std::time::Duration::from_secs(60),
        );
        let mut pipeline = Pipeline::new(
            FailingCapture,
            detector,
            evaluator,
            TemporalSmoother::default(),
            dispatcher,
            0.5,
        );

        assert!(pipeline.run().is_err());
    }
}
