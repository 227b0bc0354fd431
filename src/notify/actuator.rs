//! 执行器信号通道 (硬件信号线)
//!
//! 布防状态翻转时向串口写入 "1" / "0"。通道可能较慢或有状态,
//! 由调度器保证只在真实边沿写入, 本模块只负责拿到句柄并写字节。
//! 串口扫描与发现是外部协作者的事, 这里只接受一个具体设备路径。

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};

/// 硬件信号接口: 布防 → "1", 撤防 → "0"
pub trait Actuator: Send {
    fn signal(&mut self, armed: bool) -> Result<()>;
}

/// 串口执行器 (Arduino 等)
pub struct SerialActuator {
    port: Box<dyn serialport::SerialPort>,
    path: String,
}

impl SerialActuator {
    /// 打开串口; 失败返回 None, 系统退化为无信号模式继续运行
    pub fn open(path: &str, baud: u32) -> Option<Self> {
        match serialport::new(path, baud)
            .timeout(Duration::from_secs(1))
            .open()
        {
            Ok(port) => {
                println!("✅ 执行器已连接: {} @ {}bps", path, baud);
                Some(Self {
                    port,
                    path: path.to_string(),
                })
            }
            Err(e) => {
                eprintln!("⚠️ 执行器串口打开失败 {}: {}", path, e);
                None
            }
        }
    }
}

impl Actuator for SerialActuator {
    fn signal(&mut self, armed: bool) -> Result<()> {
        let byte: &[u8] = if armed { b"1" } else { b"0" };
        self.port
            .write_all(byte)
            .with_context(|| format!("串口 {} 写入失败", self.path))?;
        Ok(())
    }
}
