// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{LoopPolicy, LoopStats, RunState, StepOutcome, QUIT_POLL, STATS_INTERVAL};
use crate::config::{TimingConfig, WriteFailurePolicy};
use crate::detection::{Detector, VehicleClasses};
use crate::device::DeviceChannel;
use crate::error::ControlError;
use crate::input::{FrameRead, UnavailableReason, VideoSource};
use crate::renderer::{Annotator, DisplaySink};
use crate::timing::TimingCommand;

/// 各阶段累计耗时
#[derive(Debug, Default)]
struct StageTimes {
    frames: u64,
    read: Duration,
    detect: Duration,
    render: Duration,
    send: Duration,
}

impl StageTimes {
    /// 本统计窗口的平均耗时
    fn summary(&self, elapsed: Duration, vehicles: usize) -> String {
        let n = self.frames.max(1) as u32;
        format!(
            "📊 {:.1} fps | 取帧 {:?} | 检测 {:?} | 标注+显示 {:?} | 下发 {:?} | 车辆 {}",
            self.frames as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
            self.read / n,
            self.detect / n,
            self.render / n,
            self.send / n,
            vehicles
        )
    }
}

pub struct TrafficController<V: VideoSource, D: Detector, C: DeviceChannel> {
    source: V,
    detector: D,
    device: C,
    vehicles: VehicleClasses,
    annotator: Annotator,
    timing: TimingConfig,
    policy: LoopPolicy,
    interrupt: Option<Arc<AtomicBool>>,
    state: RunState,
    stats: LoopStats,
    consecutive_unavailable: u32,
    released: bool,
    stages: StageTimes,
    window_start: Instant,
}

impl<V: VideoSource, D: Detector, C: DeviceChannel> TrafficController<V, D, C> {
    pub fn new(source: V, detector: D, device: C, vehicles: VehicleClasses) -> Self {
        Self {
            source,
            detector,
            device,
            vehicles,
            annotator: Annotator::new(None),
            timing: TimingConfig::default(),
            policy: LoopPolicy::default(),
            interrupt: None,
            state: RunState::Running,
            stats: LoopStats::default(),
            consecutive_unavailable: 0,
            released: false,
            stages: StageTimes::default(),
            window_start: Instant::now(),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_policy(mut self, policy: LoopPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 外部中断标志 (Ctrl-C), 每轮开始前检查
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// 运行到退出键、中断或致命错误; 返回前释放视频源和串口
    pub async fn run<S: DisplaySink>(&mut self, sink: &mut S) -> Result<LoopStats, ControlError> {
        info!("🚦 控制循环启动");
        self.window_start = Instant::now();
        let result = self.run_loop(sink).await;
        self.state = RunState::Stopped;
        self.release();
        if result.is_ok() {
            info!(
                "🏁 控制循环结束: 处理 {} 帧, 跳过 {} 次, 丢弃指令 {} 条",
                self.stats.processed, self.stats.skipped, self.stats.dropped_writes
            );
        }
        result
    }

    async fn run_loop<S: DisplaySink>(&mut self, sink: &mut S) -> Result<LoopStats, ControlError> {
        while self.state == RunState::Running {
            if self.interrupted() {
                info!("🛑 收到中断信号, 退出");
                self.state = RunState::Stopped;
                break;
            }
            self.step(sink).await?;
        }
        Ok(self.stats.clone())
    }

    /// 执行一轮
    pub async fn step<S: DisplaySink>(&mut self, sink: &mut S) -> Result<StepOutcome, ControlError> {
        let t_read = Instant::now();
        let mut frame = match self.source.read_frame() {
            FrameRead::Frame(frame) => frame,
            FrameRead::Unavailable(reason) => return self.on_unavailable(reason),
        };
        self.consecutive_unavailable = 0;
        let index = frame.index;

        let t_detect = Instant::now();
        let detections = self
            .detector
            .detect(&frame)
            .map_err(|source| ControlError::Detector {
                frame: index,
                source,
            })?;

        let t_render = Instant::now();
        let vehicles = self.vehicles.filter(&detections);
        let count = vehicles.len();
        self.annotator.annotate(&mut frame.image, &vehicles);
        sink.show(&frame).map_err(ControlError::Display)?;

        let t_send = Instant::now();
        let command = TimingCommand::from_vehicle_count(&self.timing, count);
        if let Err(e) = self.device.send(&command.to_line()) {
            match self.policy.write_failure {
                WriteFailurePolicy::Fatal => return Err(ControlError::SerialWrite(e)),
                WriteFailurePolicy::Drop => {
                    warn!("⚠️ 指令 {} 未送达: {}", command, e);
                    self.stats.dropped_writes += 1;
                }
            }
        }
        let t_done = Instant::now();

        debug!(
            "帧 #{}: 检测 {} 个, 车辆 {} 辆 → {}",
            index,
            detections.len(),
            count,
            command
        );
        self.stats.processed += 1;
        self.stats.last_count = count;
        self.record_stages(
            t_detect - t_read,
            t_render - t_detect,
            t_send - t_render,
            t_done - t_send,
        );

        if sink.poll_quit(QUIT_POLL).await {
            info!("⌨️ 收到退出键");
            self.state = RunState::Stopped;
        }

        Ok(StepOutcome::Processed {
            frame: index,
            vehicles: count,
            command,
        })
    }

    fn on_unavailable(&mut self, reason: UnavailableReason) -> Result<StepOutcome, ControlError> {
        self.stats.skipped += 1;
        self.consecutive_unavailable = self.consecutive_unavailable.saturating_add(1);
        warn!(
            "⚠️ 取帧失败 ({}), 连续 {} 次",
            reason, self.consecutive_unavailable
        );

        if let Some(max) = self.policy.max_unavailable {
            if self.consecutive_unavailable >= max {
                return Err(ControlError::FeedLost(self.consecutive_unavailable));
            }
        }
        if !self.policy.retry_backoff.is_zero() {
            std::thread::sleep(self.policy.retry_backoff);
        }
        Ok(StepOutcome::Skipped(reason))
    }

    fn record_stages(&mut self, read: Duration, detect: Duration, render: Duration, send: Duration) {
        let s = &mut self.stages;
        s.frames += 1;
        s.read += read;
        s.detect += detect;
        s.render += render;
        s.send += send;

        if s.frames < STATS_INTERVAL {
            return;
        }
        let summary = s.summary(self.window_start.elapsed(), self.stats.last_count);
        if self.policy.profile {
            info!("{}", summary);
        } else {
            debug!("{}", summary);
        }
        self.stages = StageTimes::default();
        self.window_start = Instant::now();
    }

    /// 释放视频源和串口, 只执行一次
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source.release();
        self.device.close();
        info!("✅ 资源已释放");
    }
}

impl<V: VideoSource, D: Detector, C: DeviceChannel> Drop for TrafficController<V, D, C> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_summary_averages_per_frame() {
        let times = StageTimes {
            frames: 4,
            read: Duration::from_millis(8),
            detect: Duration::from_millis(40),
            render: Duration::from_millis(12),
            send: Duration::from_millis(4),
        };
        let line = times.summary(Duration::from_secs(2), 3);
        assert!(line.starts_with("📊 2.0 fps"), "{}", line);
        assert!(line.contains("取帧 2ms"), "{}", line);
        assert!(line.contains("检测 10ms"), "{}", line);
        assert!(line.contains("标注+显示 3ms"), "{}", line);
        assert!(line.contains("下发 1ms"), "{}", line);
        assert!(line.ends_with("车辆 3"), "{}", line);
    }
}
