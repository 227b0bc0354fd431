//! 报警邮件通道
//!
//! 专职发送线程 + 有界队列: 主循环只做 try_send, 永不等待网络 I/O。
//! 队列满时丢弃本次任务并记录, 给出背压可见性而非无限起线程。
//! 每个任务携带帧快照的独立拷贝, 与主循环的帧缓冲互不相干。

use std::collections::BTreeSet;
use std::io::Cursor;
use std::thread;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, Sender};
use image::RgbImage;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};

use crate::config::EmailConfig;
use crate::detection::types::{FrameAssessment, ThreatStatus};
use crate::gen_time_string;

/// 报警邮件任务 (发送线程独占消费, 只读自己捕获的数据)
pub struct AlertJob {
    pub snapshot: RgbImage,
    pub status: ThreatStatus,
    pub score: u32,
    pub objects: BTreeSet<String>,
    pub captured_at: DateTime<Local>,
}

impl AlertJob {
    /// 从当前帧与评估结果构造任务, 像素数据在此处完成拷贝
    pub fn from_assessment(snapshot: RgbImage, assessment: &FrameAssessment) -> Self {
        Self {
            snapshot,
            status: assessment.status,
            score: assessment.score,
            objects: assessment.objects.clone(),
            captured_at: Local::now(),
        }
    }
}

/// 启动专职发送线程, 返回入队端
pub fn spawn_mailer(config: EmailConfig, queue_depth: usize) -> Sender<AlertJob> {
    let (tx, rx) = bounded(queue_depth.max(1));
    thread::spawn(move || mailer_loop(rx, config));
    tx
}

fn mailer_loop(rx: Receiver<AlertJob>, config: EmailConfig) {
    println!("📧 邮件发送线程启动");
    // 入队端全部释放后 recv 失败, 线程退出
    while let Ok(job) = rx.recv() {
        match send_alert(&config, &job) {
            Ok(()) => println!(
                "📧 ✅ 报警邮件已发送: {} → {}",
                job.status.label(),
                config.recipient
            ),
            // 发送失败不重试: 下一个冷却窗口自然产生新任务
            Err(e) => eprintln!("❌ 报警邮件发送失败: {:#}", e),
        }
    }
    println!("📧 邮件发送线程退出");
}

fn send_alert(config: &EmailConfig, job: &AlertJob) -> Result<()> {
    let jpeg = encode_jpeg(&job.snapshot)?;

    let subject = format!(
        "[威胁警报] {} - {}",
        job.status.label(),
        job.captured_at.format("%Y-%m-%d %H:%M:%S")
    );
    let objects: Vec<&str> = job.objects.iter().map(|s| s.as_str()).collect();
    let body = format!(
        "状态: {}\n评分: {}\n检出目标: {}\n时间: {}\n",
        job.status.label(),
        job.score,
        objects.join(", "),
        job.captured_at.format("%Y-%m-%d %H:%M:%S")
    );

    let message = Message::builder()
        .from(config.sender.parse().context("发件人地址无效")?)
        .to(config.recipient.parse().context("收件人地址无效")?)
        .subject(subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body))
                .singlepart(
                    Attachment::new(snapshot_filename())
                        .body(jpeg, ContentType::parse("image/jpeg")?),
                ),
        )
        .context("构造邮件失败")?;

    let mailer = SmtpTransport::starttls_relay(&config.smtp_host)
        .context("SMTP 中继配置失败")?
        .port(config.smtp_port)
        .credentials(Credentials::new(
            config.sender.clone(),
            config.credential.clone(),
        ))
        .build();

    mailer.send(&message).context("SMTP 发送失败")?;
    Ok(())
}

/// 附件文件名带时间戳, 收件侧多封邮件互不覆盖
fn snapshot_filename() -> String {
    format!("threat_{}.jpg", gen_time_string("-"))
}

/// 帧快照编码为 JPEG 附件
fn encode_jpeg(snapshot: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(snapshot.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .context("JPEG 编码失败")?;
    Ok(buf)
}
