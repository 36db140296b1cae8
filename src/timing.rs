// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 信号灯时长指令
//!
//! 串口协议: 每帧一行 ASCII `"{red_ms},{yellow_ms},{green_ms}\n"`, 无校验, 无应答.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

use crate::config::TimingConfig;

/// 一次下发给单片机的三段时长 (毫秒)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingCommand {
    pub red_ms: u32,
    pub yellow_ms: u32,
    pub green_ms: u32,
}

impl TimingCommand {
    pub fn new(red_ms: u32, yellow_ms: u32, green_ms: u32) -> Self {
        Self {
            red_ms,
            yellow_ms,
            green_ms,
        }
    }

    /// 绿灯 = 基础时长 + 每车时长 × 车辆数 (饱和运算, 对车辆数单调不减)
    pub fn from_vehicle_count(config: &TimingConfig, vehicle_count: usize) -> Self {
        let count = u32::try_from(vehicle_count).unwrap_or(u32::MAX);
        let green_ms = config
            .green_base_ms
            .saturating_add(config.green_per_vehicle_ms.saturating_mul(count));
        Self::new(config.red_ms, config.yellow_ms, green_ms)
    }

    /// 串口线格式, 以换行结尾
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for TimingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.red_ms, self.yellow_ms, self.green_ms)
    }
}

impl FromStr for TimingCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut fields = line.split(',');
        let mut next = |name: &str| -> Result<u32> {
            let field = fields
                .next()
                .ok_or_else(|| anyhow!("缺少字段 {}: {:?}", name, line))?;
            field
                .parse::<u32>()
                .with_context(|| format!("字段 {} 不是非负整数: {:?}", name, field))
        };
        let cmd = Self::new(next("red")?, next("yellow")?, next("green")?);
        if fields.next().is_some() {
            bail!("多余字段: {:?}", line);
        }
        Ok(cmd)
    }
}
