/// 威胁哨兵 (Threat Sentinel)
///
/// 检测 → 报警管线
///
/// 系统架构:
/// 1. 主线程:     采集 → 几何评估 → 时间平滑 → 通知调度 (同步帧循环)
/// 2. 发送线程:   报警邮件专职发送 (有界队列, 冷却闸门在调度器侧)
/// 3. 执行器通道: 串口边沿信号, 与帧循环严格同序
use anyhow::Result;
use clap::Parser;

use threat_sentinel::{
    spawn_mailer, AlertChannel, Dispatcher, EmailConfig, GeometryEvaluator, PolicyKind, Scenario,
    SentinelConfig, SerialActuator,
};

/// 威胁哨兵参数
#[derive(Parser, Debug)]
#[command(author, version, about = "威胁哨兵 - 检测报警管线", long_about = None)]
struct Args {
    /// 场景文件 (JSONL 检测轨迹, 每行一帧)
    #[arg(short, long)]
    scenario: String,

    /// 配置文件路径 (缺省使用用户配置目录)
    #[arg(short, long)]
    config: Option<String>,

    /// 邮件配置文件 (三行: 发件人 / 凭据 / 收件人)
    #[arg(long, default_value = "email_config.txt")]
    email_config: String,

    /// 覆盖威胁策略: proximity 或 weapon-only
    #[arg(long)]
    policy: Option<String>,

    /// 执行器串口设备 (覆盖配置文件)
    #[arg(long)]
    port: Option<String>,

    /// 回放帧率 (0 = 不限速)
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// 干跑: 不打开串口, 不发送邮件
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("🚀 威胁哨兵启动");

    // ========== 配置 ==========
    let config_path = args
        .config
        .unwrap_or_else(|| SentinelConfig::default_path().to_string_lossy().into_owned());
    let mut config = SentinelConfig::load(&config_path);
    if let Some(policy) = &args.policy {
        config.policy = PolicyKind::from_str_or_default(policy);
    }
    if args.port.is_some() {
        config.serial_port = args.port.clone();
    }
    config.print_summary();

    // ========== 检测核心 ==========
    let evaluator = GeometryEvaluator::new(config.build_policy(), config.brightness_floor);
    let smoother = config.build_smoother();

    // ========== 执行器通道 ==========
    let actuator: Option<Box<dyn threat_sentinel::Actuator>> = if args.dry_run {
        None
    } else {
        match &config.serial_port {
            Some(port) => SerialActuator::open(port, config.serial_baud)
                .map(|a| Box::new(a) as Box<dyn threat_sentinel::Actuator>),
            None => None,
        }
    };

    // ========== 邮件通道 ==========
    let alert_channel = if args.dry_run {
        AlertChannel::Disabled
    } else {
        let email = EmailConfig::load(&args.email_config);
        if email.is_complete() {
            AlertChannel::Ready(spawn_mailer(email, config.alert_queue_depth))
        } else {
            AlertChannel::Incomplete
        }
    };

    let dispatcher = Dispatcher::new(actuator, alert_channel, config.cooldown());

    // ========== 场景回放 ==========
    let scenario = Scenario::load(&args.scenario)?;
    let (capture, detector) = scenario.split(args.fps);

    // ========== 主循环 ==========
    let mut pipeline = threat_sentinel::Pipeline::new(
        capture,
        detector,
        evaluator,
        smoother,
        dispatcher,
        config.confidence_threshold,
    );
    pipeline.run()?;

    println!("✅ 系统正常退出");
    Ok(())
}
