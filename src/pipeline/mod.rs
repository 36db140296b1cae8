// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 信号灯控制循环 (Traffic Controller)
///
/// 单线程, 每轮: 取帧 → 检测 → 筛选车辆 → 标注 → 显示 → 计算时长 → 串口下发 → 检查退出键
///
/// 视频源和串口由控制器独占, 在任意退出路径上各释放一次.
pub mod controller;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub use controller::TrafficController;

use crate::config::{Args, WriteFailurePolicy};
use crate::error::ControlError;
use crate::input::UnavailableReason;
use crate::timing::TimingCommand;

/// 每轮检查退出键的等待时间
pub const QUIT_POLL: Duration = Duration::from_millis(1);

/// 每处理多少帧打印一次统计
pub const STATS_INTERVAL: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// 取帧失败与串口写入失败的处理策略
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoopPolicy {
    /// 取帧失败后的等待, 默认立即重试
    pub retry_backoff: Duration,
    /// 连续取帧失败上限, `None` 为无限重试
    pub max_unavailable: Option<u32>,
    pub write_failure: WriteFailurePolicy,
    /// 各阶段耗时以 info 打印, 否则只在 debug 下可见
    pub profile: bool,
}

impl LoopPolicy {
    pub fn from_args(args: &Args) -> Self {
        Self {
            retry_backoff: args.retry_backoff(),
            max_unavailable: args.max_unavailable,
            write_failure: args.on_write_error,
            profile: args.profile,
        }
    }
}

/// 启动各阶段之间检查 Ctrl-C
pub fn check_interrupt(flag: &AtomicBool, stage: &'static str) -> Result<(), ControlError> {
    if flag.load(Ordering::SeqCst) {
        return Err(ControlError::Interrupted(stage));
    }
    Ok(())
}

/// 单轮结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Processed {
        frame: u64,
        vehicles: usize,
        command: TimingCommand,
    },
    Skipped(UnavailableReason),
}

/// `run` 结束时的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub processed: u64,
    pub skipped: u64,
    pub dropped_writes: u64,
    pub last_count: usize,
}
