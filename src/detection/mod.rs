/// 检测核心 (Detection Core)
///
/// 逐帧无状态评估 + 跨帧时间平滑
/// - types:    数据结构 (Detection / FrameAssessment / Frame)
/// - policy:   几何威胁策略 (proximity / weapon-only)
/// - smoother: 滑动窗口去抖 + 保持期
pub mod policy;
pub mod smoother;
pub mod types;

pub use policy::{GeometryEvaluator, PolicyKind, ProximityPolicy, ThreatPolicy, WeaponOnlyPolicy};
pub use smoother::TemporalSmoother;
pub use types::{BBox, Detection, Frame, FrameAssessment, ThreatStatus};
