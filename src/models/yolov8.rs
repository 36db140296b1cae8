// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型实现
// 包含: 模型加载、预处理、推理、后处理

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use fast_image_resize as fr;
use image::RgbaImage;
use ndarray::{s, Array, Axis, IxDyn};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use tracing::{debug, info, warn};

use super::names::class_names;
use crate::config::Args;
use crate::detection::types::INF_SIZE;
use crate::{non_max_suppression, Bbox};

/// letterbox 填充值
const PAD_VALUE: f32 = 144.0 / 255.0;
const CXYWH_OFFSET: usize = 4;
/// NMS 后最多保留的检测框数
pub const MAX_DET: usize = 300;

/// YOLOv8 加载参数
#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub model: PathBuf,
    pub width: u32,
    pub height: u32,
    pub conf: f32,
    pub iou: f32,
    pub max_det: usize,
    pub threads: usize,
    pub cuda: bool,
    pub trt: bool,
    pub device_id: i32,
    pub profile: bool,
}

impl Default for YOLOv8Config {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/yolov8n.onnx"),
            width: INF_SIZE,
            height: INF_SIZE,
            conf: 0.25,
            iou: 0.7,
            max_det: MAX_DET,
            threads: 4,
            cuda: false,
            trt: false,
            device_id: 0,
            profile: false,
        }
    }
}

impl YOLOv8Config {
    /// 命令行参数 + 已解析的模型路径
    pub fn from_args(args: &Args, model: PathBuf) -> Self {
        Self {
            model,
            width: args.imgsz,
            height: args.imgsz,
            conf: args.conf,
            iou: args.iou,
            max_det: args.max_det,
            threads: args.threads,
            cuda: args.cuda,
            trt: args.trt,
            device_id: args.device_id,
            profile: args.profile,
        }
    }
}

/// YOLOv8 检测模型结构
pub struct YOLOv8 {
    session: Session,
    input_name: String,
    ep: &'static str,
    nc: usize,
    height: u32,
    width: u32,
    conf: f32,
    iou: f32,
    max_det: usize,
    names: Vec<String>,
    resizer: fr::Resizer,
    profile: bool,
}

impl YOLOv8 {
    /// 从配置创建 YOLOv8 模型
    pub fn new(config: YOLOv8Config) -> Result<Self> {
        if config.width == 0 || config.height == 0 || config.width % 32 != 0 || config.height % 32 != 0
        {
            bail!(
                "推理尺寸必须是 32 的正整数倍: {}x{}",
                config.width,
                config.height
            );
        }

        info!("📦 加载检测模型: {}", config.model.display());

        #[allow(unused_mut)]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.threads)?;

        // execution provider
        #[allow(unused_mut)]
        let mut ep = "CPU";
        if config.trt {
            #[cfg(feature = "tensorrt")]
            {
                builder = builder.with_execution_providers([
                    ort::execution_providers::TensorRTExecutionProvider::default()
                        .with_device_id(config.device_id)
                        .build(),
                ])?;
                ep = "TensorRT";
            }
            #[cfg(not(feature = "tensorrt"))]
            warn!("⚠️ 未启用 tensorrt 特性, 回退到 CPU");
        } else if config.cuda {
            #[cfg(feature = "cuda")]
            {
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(config.device_id)
                        .build(),
                ])?;
                ep = "CUDA";
            }
            #[cfg(not(feature = "cuda"))]
            warn!("⚠️ 未启用 cuda 特性, 回退到 CPU");
        }

        let session = builder.commit_from_file(&config.model)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        // class names
        let names = class_names(session.metadata()?.custom("names")?.as_deref())?;

        let model = Self {
            session,
            input_name,
            ep,
            nc: names.len(),
            height: config.height,
            width: config.width,
            conf: config.conf,
            iou: config.iou,
            max_det: config.max_det,
            names,
            resizer: fr::Resizer::new(),
            profile: config.profile,
        };
        Ok(model)
    }

    fn scale_wh(&self, w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round(), (h0 * r).round())
    }
}

impl super::Model for YOLOv8 {
    fn preprocess(&mut self, image: &RgbaImage) -> Result<Array<f32, IxDyn>> {
        let t_pre = Instant::now();
        let (w0, h0) = image.dimensions();
        if w0 == 0 || h0 == 0 {
            bail!("空帧: {}x{}", w0, h0);
        }

        let (_, w_new, h_new) = self.scale_wh(
            w0 as f32,
            h0 as f32,
            self.width as f32,
            self.height as f32,
        );
        let w_new = (w_new as u32).clamp(1, self.width);
        let h_new = (h_new as u32).clamp(1, self.height);

        // 等比缩放 (左上角对齐, 其余填充)
        let src = fr::images::Image::from_vec_u8(w0, h0, image.as_raw().clone(), fr::PixelType::U8x4)?;
        let mut dst = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x4);
        self.resizer.resize(
            &src,
            &mut dst,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )?;

        let mut ys = Array::from_elem(
            (1, 3, self.height as usize, self.width as usize),
            PAD_VALUE,
        )
        .into_dyn();
        let row = w_new as usize;
        for (i, rgba) in dst.buffer().chunks_exact(4).enumerate() {
            let (x, y) = (i % row, i / row);
            ys[[0, 0, y, x]] = (rgba[0] as f32) / 255.0;
            ys[[0, 1, y, x]] = (rgba[1] as f32) / 255.0;
            ys[[0, 2, y, x]] = (rgba[2] as f32) / 255.0;
        }

        if self.profile {
            info!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }
        Ok(ys)
    }

    fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>> {
        let t_run = Instant::now();
        let shape = [1usize, 3, self.height as usize, self.width as usize];
        let (data, _) = xs.into_raw_vec_and_offset();
        let input = Value::from_array((shape.as_slice(), data.into_boxed_slice()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])?;
        let (out_shape, out_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = out_shape.iter().map(|&d| d.max(0) as usize).collect();
        let ys = Array::from_shape_vec(IxDyn(&dims), out_data.to_vec())?;

        if self.profile {
            info!("[Model Inference]: {:?}", t_run.elapsed());
        }
        Ok(ys)
    }

    fn postprocess(&self, ys: Array<f32, IxDyn>, image_size: (u32, u32)) -> Result<Vec<Bbox>> {
        let t_post = Instant::now();
        if ys.ndim() == 3 && ys.shape()[1] > CXYWH_OFFSET && ys.shape()[1] - CXYWH_OFFSET != self.nc {
            debug!(
                "输出类别数 {} 与 names 数量 {} 不一致",
                ys.shape()[1] - CXYWH_OFFSET,
                self.nc
            );
        }
        let data = decode_detections(
            &ys,
            (self.width, self.height),
            image_size,
            self.conf,
            self.iou,
            self.max_det,
        )?;
        if self.profile {
            info!("[Model Postprocess]: {:?}", t_post.elapsed());
        }
        Ok(data)
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn summary(&self) {
        info!(
            "\nSummary:\n\
            > Task: Detect\n\
            > EP: {} {}\n\
            > Height: {}, Width: {}\n\
            > nc: {}, conf: {}, iou: {}, max_det: {}\n",
            self.ep,
            if self.ep == "CPU" {
                ""
            } else {
                "(May still fall back to CPU)"
            },
            self.height,
            self.width,
            self.nc,
            self.conf,
            self.iou,
            self.max_det,
        );
    }
}

/// 解码 `[1, 4 + nc, anchors]` 输出: 取最大类别分数, 置信度过滤, 坐标还原到原图,
/// 按类别 NMS, 最多保留 `max_det` 个
pub fn decode_detections(
    ys: &Array<f32, IxDyn>,
    input_size: (u32, u32),
    image_size: (u32, u32),
    conf: f32,
    iou: f32,
    max_det: usize,
) -> Result<Vec<Bbox>> {
    if ys.ndim() != 3 || ys.shape()[0] == 0 || ys.shape()[1] <= CXYWH_OFFSET {
        bail!("无法识别的输出形状: {:?}", ys.shape());
    }
    if image_size.0 == 0 || image_size.1 == 0 {
        bail!("空帧: {}x{}", image_size.0, image_size.1);
    }
    let nc = ys.shape()[1] - CXYWH_OFFSET;

    let (width_original, height_original) = (image_size.0 as f32, image_size.1 as f32);
    let ratio =
        (input_size.0 as f32 / width_original).min(input_size.1 as f32 / height_original);

    let preds = ys.index_axis(Axis(0), 0);
    let mut data: Vec<Bbox> = Vec::new();
    for pred in preds.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

        let Some((id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };

        if confidence < conf {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        let x1 = (cx - w / 2.).clamp(0., width_original);
        let y1 = (cy - h / 2.).clamp(0., height_original);
        let x2 = (cx + w / 2.).clamp(0., width_original);
        let y2 = (cy + h / 2.).clamp(0., height_original);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        data.push(Bbox::new(x1, y1, x2 - x1, y2 - y1, id, confidence));
    }

    non_max_suppression(&mut data, iou, false);
    data.truncate(max_det);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造 [1, 4 + nc, anchors] 输出
    fn output(nc: usize, anchors: &[([f32; 4], usize, f32)]) -> Array<f32, IxDyn> {
        let mut ys = Array::zeros((1, CXYWH_OFFSET + nc, anchors.len())).into_dyn();
        for (a, (cxcywh, cls, score)) in anchors.iter().enumerate() {
            for (k, v) in cxcywh.iter().enumerate() {
                ys[[0, k, a]] = *v;
            }
            ys[[0, CXYWH_OFFSET + cls, a]] = *score;
        }
        ys
    }

    #[test]
    fn test_decode_rescales_to_original_frame() {
        // 1280x720 → 640 输入, ratio = 0.5
        let ys = output(80, &[([100., 100., 40., 20.], 2, 0.9)]);
        let boxes = decode_detections(&ys, (640, 640), (1280, 720), 0.25, 0.7, MAX_DET).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert_eq!(b.id(), 2);
        assert!((b.xmin() - 160.).abs() < 1e-3);
        assert!((b.ymin() - 180.).abs() < 1e-3);
        assert!((b.xmax() - 240.).abs() < 1e-3);
        assert!((b.ymax() - 220.).abs() < 1e-3);
    }

    #[test]
    fn test_decode_drops_low_confidence() {
        let ys = output(
            80,
            &[([50., 50., 10., 10.], 7, 0.1), ([300., 300., 10., 10.], 5, 0.5)],
        );
        let boxes = decode_detections(&ys, (640, 640), (640, 640), 0.25, 0.7, MAX_DET).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].id(), 5);
    }

    #[test]
    fn test_decode_clamps_to_frame() {
        let ys = output(80, &[([5., 5., 40., 40.], 3, 0.8)]);
        let boxes = decode_detections(&ys, (640, 640), (640, 640), 0.25, 0.7, MAX_DET).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].xmin(), 0.);
        assert_eq!(boxes[0].ymin(), 0.);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let ys = Array::<f32, _>::zeros((1, 4, 10)).into_dyn();
        assert!(decode_detections(&ys, (640, 640), (640, 640), 0.25, 0.7, MAX_DET).is_err());
    }

    #[test]
    fn test_decode_caps_at_max_det() {
        // 20x20 网格, 400 个互不重叠的框
        let anchors: Vec<([f32; 4], usize, f32)> = (0..400)
            .map(|i| {
                let (gx, gy) = ((i % 20) as f32, (i / 20) as f32);
                ([15. + 30. * gx, 15. + 30. * gy, 10., 10.], 2, 0.5 + i as f32 / 1000.)
            })
            .collect();
        let ys = output(80, &anchors);
        let boxes = decode_detections(&ys, (640, 640), (640, 640), 0.25, 0.7, MAX_DET).unwrap();
        assert_eq!(boxes.len(), MAX_DET);
        // 保留的是置信度最高的
        assert!(boxes.iter().all(|b| b.confidence() >= 0.6 - 1e-6));

        let few = decode_detections(&ys, (640, 640), (640, 640), 0.25, 0.7, 5).unwrap();
        assert_eq!(few.len(), 5);
    }
}
