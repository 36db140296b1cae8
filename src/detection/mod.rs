// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// - Detector:       帧 → 检测框 (整数像素坐标)
/// - VehicleClasses: 车辆类别集合, 负责筛选与计数
/// - types:          Frame / Detection 等公共数据结构
pub mod detector;
pub mod types;
pub mod vehicles;

pub use detector::{Detector, YoloDetector};
pub use types::{Detection, Frame, COCO_CLASSES, INF_SIZE};
pub use vehicles::VehicleClasses;
