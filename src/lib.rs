// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行与配置文件
pub mod detection; // 目标检测与车辆筛选
pub mod device; // 串口设备通道
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod models; // 模型接口与具体实现
pub mod pipeline; // 信号灯控制循环
pub mod renderer; // 画面标注与显示
pub mod timing; // 信号灯时长计算

pub use crate::config::{Args, TimingConfig, WriteFailurePolicy};
pub use crate::detection::{Detection, Detector, Frame, VehicleClasses, YoloDetector};
pub use crate::device::{DeviceChannel, SerialDevice};
pub use crate::error::{ControlError, DeviceError};
pub use crate::input::{FrameRead, StreamSource, UnavailableReason, VideoSource};
pub use crate::models::{Model, YOLOv8};
pub use crate::pipeline::{LoopPolicy, LoopStats, RunState, StepOutcome, TrafficController};
pub use crate::renderer::{Annotator, DisplaySink, HeadlessSink, WindowSink};
pub use crate::timing::TimingCommand;

/// 按置信度降序做 NMS, 原地保留幸存框
///
/// `agnostic = false` 时只在同类别之间抑制
pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32, agnostic: bool) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if !agnostic && xs[prev_index].id() != xs[index].id() {
                continue;
            }
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // 模型输出坐标系下的浮点框 (左上角 + 宽高)
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}
