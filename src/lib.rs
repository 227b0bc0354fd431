pub mod config; // 运行时配置 (JSON) 与邮件配置
pub mod detection; // 检测核心: 几何策略 + 时间平滑
pub mod notify; // 通知系统: 执行器信号 + 报警邮件
pub mod pipeline; // 主循环: capture → evaluate → smooth → dispatch
pub mod replay; // 场景回放 (外部协作者的可运行替身)

pub use crate::config::{EmailConfig, SentinelConfig, SMTP_CREDENTIAL_ENV};
pub use crate::detection::{
    BBox, Detection, Frame, FrameAssessment, GeometryEvaluator, PolicyKind, ProximityPolicy,
    TemporalSmoother, ThreatPolicy, ThreatStatus, WeaponOnlyPolicy,
};
pub use crate::notify::{spawn_mailer, Actuator, AlertChannel, AlertJob, Dispatcher, SerialActuator};
pub use crate::pipeline::{Capture, Detector, Pipeline, StepOutcome};
pub use crate::replay::{Scenario, ScenarioCapture, ScenarioDetector, ScenarioFrame};

/// 时间戳字符串 (快照命名与日志使用)
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
