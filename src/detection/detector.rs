// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器 (Detector)
//! 职责: Frame → 模型推理 → 原图坐标下的 Detection 列表

use anyhow::Result;
use tracing::trace;

use super::types::{Detection, Frame};
use crate::models::Model;

/// 控制循环依赖的检测接口
///
/// 失败即致命, 控制循环不会跳过出错的帧
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// 类别名, 下标即类别 id
    fn labels(&self) -> &[String];
}

/// 把任意 `Model` 包装成 `Detector`
pub struct YoloDetector<M: Model> {
    model: M,
}

impl<M: Model> YoloDetector<M> {
    pub fn new(model: M) -> Self {
        model.summary();
        Self { model }
    }

}

impl<M: Model> Detector for YoloDetector<M> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let bboxes = self.model.forward(&frame.image)?;
        let detections: Vec<Detection> = bboxes
            .iter()
            .map(|b| {
                Detection::new(
                    b.id(),
                    b.confidence(),
                    (
                        b.xmin().round() as i32,
                        b.ymin().round() as i32,
                        b.xmax().round() as i32,
                        b.ymax().round() as i32,
                    ),
                )
            })
            .collect();
        trace!("帧 #{}: {} 个检测框", frame.index, detections.len());
        Ok(detections)
    }

    fn labels(&self) -> &[String] {
        self.model.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bbox;
    use image::RgbaImage;
    use ndarray::{Array, IxDyn};

    /// 固定输出的假模型
    struct FixedModel {
        names: Vec<String>,
        boxes: Vec<Bbox>,
    }

    impl Model for FixedModel {
        fn preprocess(&mut self, _image: &RgbaImage) -> Result<Array<f32, IxDyn>> {
            Ok(Array::zeros(IxDyn(&[1])))
        }

        fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>> {
            Ok(xs)
        }

        fn postprocess(&self, _ys: Array<f32, IxDyn>, _size: (u32, u32)) -> Result<Vec<Bbox>> {
            Ok(self.boxes.clone())
        }

        fn names(&self) -> &[String] {
            &self.names
        }

        fn summary(&self) {}
    }

    #[test]
    fn test_detect_rounds_to_pixel_corners() {
        let model = FixedModel {
            names: vec!["car".into()],
            boxes: vec![Bbox::new(10.4, 20.6, 30.0, 40.0, 0, 0.8)],
        };
        let mut detector = YoloDetector::new(model);
        let frame = Frame::new(0, RgbaImage::new(64, 64));
        let dets = detector.detect(&frame).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!((dets[0].x1, dets[0].y1, dets[0].x2, dets[0].y2), (10, 21, 40, 61));
        assert_eq!(detector.labels(), ["car"]);
    }
}
