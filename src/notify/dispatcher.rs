//! 通知调度器 (Notification Dispatcher)
//!
//! 每帧对稳定报警状态评估两条互不影响的规则:
//! - 执行器信号: 边沿触发, 同步写入, 与循环迭代严格同序
//! - 报警邮件:   冷却闸门 (默认 60s), 经有界队列交给专职发送线程
//!
//! 任一通道失败只记录日志, 不波及另一通道, 也不中断主循环。

use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};

use crate::detection::types::{Frame, FrameAssessment};
use crate::notify::actuator::Actuator;
use crate::notify::email::AlertJob;

/// 邮件通道状态, 构造时确定
pub enum AlertChannel {
    /// 未启用 (干跑或未配置)
    Disabled,
    /// 已请求但配置不完整: 每次尝试只报告一次, 其余抑制
    Incomplete,
    /// 就绪: 经有界队列投递给发送线程
    Ready(Sender<AlertJob>),
}

/// 调度器跨帧状态: 仅主循环线程写入, 发送线程只读自己捕获的任务数据
pub struct Dispatcher {
    actuator: Option<Box<dyn Actuator>>,
    alert_channel: AlertChannel,
    cooldown: Duration,

    last_signaled_state: bool,
    last_alert_sent_at: Option<Instant>,
    config_warned: bool,
}

impl Dispatcher {
    pub fn new(
        actuator: Option<Box<dyn Actuator>>,
        alert_channel: AlertChannel,
        cooldown: Duration,
    ) -> Self {
        if actuator.is_none() {
            println!("⚠️ 无执行器句柄, 信号通道停用");
        }
        Self {
            actuator,
            alert_channel,
            cooldown,
            last_signaled_state: false,
            last_alert_sent_at: None,
            config_warned: false,
        }
    }

    /// 每帧调用一次
    pub fn dispatch(&mut self, stabilized: bool, frame: &Frame, assessment: &FrameAssessment) {
        self.signal_actuator(stabilized);
        self.maybe_send_alert(stabilized, frame, assessment);
    }

    /// 边沿触发: 状态未变时不重发
    fn signal_actuator(&mut self, stabilized: bool) {
        if stabilized == self.last_signaled_state {
            return;
        }
        if let Some(actuator) = self.actuator.as_mut() {
            match actuator.signal(stabilized) {
                Ok(()) => println!("🔔 执行器信号: {}", if stabilized { "1" } else { "0" }),
                Err(e) => {
                    // 写入失败退化为无信号模式, 只报告一次
                    eprintln!("⚠️ 执行器写入失败, 退化为无信号模式: {:#}", e);
                    self.actuator = None;
                }
            }
        }
        self.last_signaled_state = stabilized;
    }

    /// 冷却闸门 + 非阻塞投递
    fn maybe_send_alert(&mut self, stabilized: bool, frame: &Frame, assessment: &FrameAssessment) {
        if !stabilized {
            return;
        }

        let tx = match &self.alert_channel {
            AlertChannel::Disabled => return,
            AlertChannel::Incomplete => {
                if !self.config_warned {
                    eprintln!("⚠️ 邮件配置不完整, 报警邮件停用 (补全配置后重启生效)");
                    self.config_warned = true;
                }
                return;
            }
            AlertChannel::Ready(tx) => tx.clone(),
        };

        if let Some(last) = self.last_alert_sent_at {
            if last.elapsed() <= self.cooldown {
                return;
            }
        }

        // 冷却已过: 先记录尝试时刻, 慢传输期间不会重复入队
        self.last_alert_sent_at = Some(Instant::now());

        let job = AlertJob::from_assessment(frame.image.clone(), assessment);
        match tx.try_send(job) {
            Ok(()) => println!("📧 报警邮件已入队: {}", assessment.status.label()),
            Err(TrySendError::Full(_)) => {
                eprintln!("⚠️ 报警队列已满, 本次任务丢弃");
            }
            Err(TrySendError::Disconnected(_)) => {
                eprintln!("❌ 发送线程已退出, 邮件通道停用");
                self.alert_channel = AlertChannel::Disabled;
            }
        }
    }

    pub fn last_signaled_state(&self) -> bool {
        self.last_signaled_state
    }

    pub fn alert_attempted(&self) -> bool {
        self.last_alert_sent_at.is_some()
    }
}
