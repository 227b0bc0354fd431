/// 通知系统 (Notification System)
///
/// 两条物理独立的通知通道, 各自独立的节奏纪律
/// - actuator:   硬件信号线 (边沿触发, 同步)
/// - email:      报警邮件 (冷却闸门, 专职发送线程)
/// - dispatcher: 调度器, 对稳定报警状态评估两条规则
pub mod actuator;
pub mod dispatcher;
pub mod email;

pub use actuator::{Actuator, SerialActuator};
pub use dispatcher::{AlertChannel, Dispatcher};
pub use email::{spawn_mailer, AlertJob};
