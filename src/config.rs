//! 运行时配置 - 通过JSON文件调整参数
//!
//! 配置在启动时加载为不可变值, 显式传入各组件构造函数;
//! 运行中不做原地修改, 需要变更时重新加载得到新值。

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::policy::{PolicyKind, ThreatPolicy, PROXIMITY_RATIO};
use crate::detection::smoother::{
    TemporalSmoother, DEFAULT_ARM_THRESHOLD, DEFAULT_HOLD_PERIOD, DEFAULT_WINDOW_SIZE,
};
use crate::detection::types::BRIGHTNESS_FLOOR;

/// 邮件凭据环境变量, 优先于配置文件中的明文行
pub const SMTP_CREDENTIAL_ENV: &str = "SENTINEL_SMTP_PASSWORD";

/// 哨兵参数配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    // === 检测参数 ===
    pub confidence_threshold: f32, // 检测置信度阈值 (各变体观测范围 0.15-0.55)
    pub weapon_classes: Vec<String>, // 武器类别标签
    pub policy: PolicyKind,        // 威胁策略
    pub proximity_ratio: f32,      // 贴近判定系数
    pub brightness_floor: f32,     // 照明警告亮度下限

    // === 平滑参数 ===
    pub window_size: usize,  // 滑动窗口长度 K
    pub arm_threshold: usize, // 布防所需命中数
    pub hold_period: u32,    // 保持期 (帧)

    // === 通知参数 ===
    pub cooldown_secs: u64,         // 报警邮件最小间隔
    pub alert_queue_depth: usize,   // 发送队列深度
    pub serial_port: Option<String>, // 执行器串口 (None = 无信号模式)
    pub serial_baud: u32,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            weapon_classes: vec![
                "knife".to_string(),
                "scissors".to_string(),
                "baseball bat".to_string(),
                "bottle".to_string(),
                "cell phone".to_string(),
            ],
            policy: PolicyKind::Proximity,
            proximity_ratio: PROXIMITY_RATIO,
            brightness_floor: BRIGHTNESS_FLOOR,

            window_size: DEFAULT_WINDOW_SIZE,
            arm_threshold: DEFAULT_ARM_THRESHOLD,
            hold_period: DEFAULT_HOLD_PERIOD,

            cooldown_secs: 60,
            alert_queue_depth: 4,
            serial_port: None,
            serial_baud: 9600,
        }
    }
}

impl SentinelConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    println!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    eprintln!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                println!("📝 配置文件不存在, 创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    eprintln!("❌ 保存配置失败: {}", e);
                } else {
                    println!("💾 配置已保存到 {}", path);
                }
            }
            Err(e) => eprintln!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 默认配置文件位置
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("threat-sentinel").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("sentinel_config.json"))
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        println!("\n🎛️ 当前哨兵配置:");
        println!("  威胁策略: {:?}", self.policy);
        println!("  检测置信度: {:.2}", self.confidence_threshold);
        println!("  武器类别: {}", self.weapon_classes.join(", "));
        println!(
            "  平滑窗口: {} 帧 / 布防阈值 {} / 保持期 {} 帧",
            self.window_size, self.arm_threshold, self.hold_period
        );
        println!("  邮件冷却: {}s", self.cooldown_secs);
        match &self.serial_port {
            Some(port) => println!("  执行器串口: {} @ {}\n", port, self.serial_baud),
            None => println!("  执行器串口: 未配置 (无信号模式)\n"),
        }
    }

    pub fn build_policy(&self) -> Box<dyn ThreatPolicy> {
        use crate::detection::policy::{ProximityPolicy, WeaponOnlyPolicy};
        match self.policy {
            PolicyKind::Proximity => Box::new(ProximityPolicy::with_ratio(
                self.weapon_classes.clone(),
                self.proximity_ratio,
            )),
            PolicyKind::WeaponOnly => Box::new(WeaponOnlyPolicy::new(self.weapon_classes.clone())),
        }
    }

    pub fn build_smoother(&self) -> TemporalSmoother {
        TemporalSmoother::new(self.window_size, self.arm_threshold, self.hold_period)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// 邮件通道配置
///
/// 磁盘布局兼容旧版三行明文 (发件人 / 凭据 / 收件人, 每行一项无转义)。
/// 凭据优先从 `SENTINEL_SMTP_PASSWORD` 环境变量读取; 落到明文行时给出警告,
/// 且保存时若环境变量已设置则不回写凭据行。
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    pub credential: String,
    pub recipient: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            sender: String::new(),
            credential: String::new(),
            recipient: String::new(),
        }
    }
}

impl EmailConfig {
    /// 从三行明文文件加载, 文件缺失时返回空配置
    pub fn load(path: &str) -> Self {
        let mut config = Self::default();

        match fs::read_to_string(path) {
            Ok(content) => {
                let mut lines = content.lines();
                config.sender = lines.next().unwrap_or("").trim().to_string();
                config.credential = lines.next().unwrap_or("").trim().to_string();
                config.recipient = lines.next().unwrap_or("").trim().to_string();
                println!("✅ 邮件配置已从 {} 加载", path);
            }
            Err(_) => {
                println!("📝 邮件配置文件 {} 不存在, 创建空模板...", path);
                config.save(path);
            }
        }

        match std::env::var(SMTP_CREDENTIAL_ENV) {
            Ok(secret) if !secret.trim().is_empty() => {
                config.credential = secret.trim().to_string();
            }
            _ => {
                if !config.credential.is_empty() {
                    eprintln!(
                        "⚠️ 正在使用 {} 中的明文凭据, 建议改用环境变量 {}",
                        path, SMTP_CREDENTIAL_ENV
                    );
                }
            }
        }

        config
    }

    /// 保存为三行明文文件; 环境变量提供凭据时凭据行留空
    pub fn save(&self, path: &str) {
        let credential_line = if std::env::var(SMTP_CREDENTIAL_ENV).is_ok() {
            ""
        } else {
            self.credential.as_str()
        };
        let content = format!("{}\n{}\n{}\n", self.sender, credential_line, self.recipient);
        if let Err(e) = fs::write(path, content) {
            eprintln!("❌ 保存邮件配置失败: {}", e);
        } else {
            println!("💾 邮件配置已保存到 {}", path);
        }
    }

    /// 发送所需字段是否全部就绪
    pub fn is_complete(&self) -> bool {
        !self.smtp_host.is_empty()
            && self.smtp_port != 0
            && !self.sender.is_empty()
            && !self.credential.is_empty()
            && !self.recipient.is_empty()
    }
}
