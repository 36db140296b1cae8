// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型统一接口与实现
///
/// # 架构说明
///
/// - **YOLOv8**: struct + impl Model trait
///   - 模型加载 (new): ONNX Runtime 会话 + names 元数据
///   - 预处理 (preprocess): letterbox 缩放, NCHW 张量
///   - 推理 (run)
///   - 后处理 (postprocess): 置信度过滤 + NMS, 坐标还原到原图
///   - 文件: `yolov8.rs`
/// - **names**: 解析模型内嵌的类别名
/// - **hub**: 本地没有模型文件时按地址下载到缓存目录
///
/// ## 使用示例
/// ```no_run
/// use traffic_light_rs::models::{Model, YOLOv8, YOLOv8Config};
///
/// # fn demo(frame: &image::RgbaImage) -> anyhow::Result<()> {
/// let mut model = YOLOv8::new(YOLOv8Config::default())?;
/// let bboxes = model.forward(frame)?;
/// # Ok(())
/// # }
/// ```
use anyhow::Result;
use image::RgbaImage;
use ndarray::{Array, IxDyn};

use crate::Bbox;

pub mod hub;
pub mod names;
pub mod yolov8;

pub use hub::resolve_model;
pub use names::{class_names, parse_names};
pub use yolov8::{decode_detections, YOLOv8, YOLOv8Config};

/// 统一的检测模型接口
///
/// ## 核心流程
/// ```text
/// 原始帧 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → 原图坐标下的检测框
/// ```
pub trait Model {
    /// 预处理: RGBA帧 → NCHW 张量
    fn preprocess(&mut self, image: &RgbaImage) -> Result<Array<f32, IxDyn>>;

    /// 推理: 执行模型前向传播
    fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>>;

    /// 后处理: 原始输出 → 检测框
    ///
    /// * `image_size` - 原始帧 (宽, 高), 用于坐标还原
    fn postprocess(&self, ys: Array<f32, IxDyn>, image_size: (u32, u32)) -> Result<Vec<Bbox>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, image: &RgbaImage) -> Result<Vec<Bbox>> {
        let xs = self.preprocess(image)?;
        let ys = self.run(xs)?;
        self.postprocess(ys, image.dimensions())
    }

    /// 类别名, 下标即类别 id
    fn names(&self) -> &[String];

    /// 打印模型信息
    fn summary(&self);
}
