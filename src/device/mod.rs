// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 设备通道 (Device Channel)
///
/// 控制循环只依赖 `DeviceChannel`, 串口实现见 `serial.rs`
/// - send:  写入一行指令, 不等待应答
/// - close: 释放句柄, 可重复调用
pub mod serial;

pub use serial::SerialDevice;

use crate::error::DeviceError;

pub trait DeviceChannel {
    /// 把一行文本编码为字节写出
    fn send(&mut self, line: &str) -> Result<(), DeviceError>;

    /// 释放底层句柄
    fn close(&mut self);
}
