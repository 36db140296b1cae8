// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 串口设备 (Arduino 等单片机)

use std::io::Write;
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use super::DeviceChannel;
use crate::error::{ControlError, DeviceError};

pub struct SerialDevice {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialDevice {
    /// 打开串口并等待单片机复位完成
    ///
    /// 大多数 Arduino 在 DTR 变化时会重启, 需要 `settle` 的等待时间才能接收数据
    pub fn open(
        port_name: &str,
        baud: u32,
        read_timeout: Duration,
        settle: Duration,
    ) -> Result<Self, ControlError> {
        info!("🔌 打开串口: {} @ {}", port_name, baud);

        let port = serialport::new(port_name, baud)
            .timeout(read_timeout)
            .open()
            .map_err(|source| ControlError::DeviceOpen {
                port: port_name.to_string(),
                baud,
                source,
            })?;

        if !settle.is_zero() {
            debug!("⏳ 等待设备初始化 {:?}", settle);
            std::thread::sleep(settle);
        }
        info!("✅ 串口就绪: {}", port_name);

        Ok(Self {
            port_name: port_name.to_string(),
            port: Some(port),
        })
    }

}

impl DeviceChannel for SerialDevice {
    fn send(&mut self, line: &str) -> Result<(), DeviceError> {
        let port = self.port.as_mut().ok_or(DeviceError::Closed)?;
        port.write_all(line.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("🔌 串口已关闭: {}", self.port_name);
        }
    }
}

impl Drop for SerialDevice {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_is_device_open_error() {
        let err = SerialDevice::open(
            "/dev/nonexistent-tty",
            9600,
            Duration::from_millis(100),
            Duration::ZERO,
        )
        .err()
        .expect("opening a missing port must fail");
        match err {
            ControlError::DeviceOpen { port, baud, .. } => {
                assert_eq!(port, "/dev/nonexistent-tty");
                assert_eq!(baud, 9600);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_send_after_close_is_closed() {
        let mut device = SerialDevice {
            port_name: "closed".to_string(),
            port: None,
        };
        assert!(matches!(
            device.send("5000,2000,3000\n"),
            Err(DeviceError::Closed)
        ));
        device.close();
        device.close();
    }
}
