// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 车辆类别集合
//!
//! 类别 id 随模型标签顺序变化, 所以启动时按类别名从模型 names 元数据解析,
//! 不在代码里写死 {2, 3, 5, 7}.

use std::collections::BTreeSet;

use super::types::{Detection, COCO_CLASSES};
use crate::error::ControlError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleClasses {
    ids: BTreeSet<usize>,
}

impl VehicleClasses {
    /// 按名称解析; `labels` 为空时退回 COCO-80
    pub fn resolve<S: AsRef<str>>(labels: &[String], wanted: &[S]) -> Result<Self, ControlError> {
        let lookup = |name: &str| -> Option<usize> {
            if labels.is_empty() {
                COCO_CLASSES.iter().position(|l| l.eq_ignore_ascii_case(name))
            } else {
                labels.iter().position(|l| l.eq_ignore_ascii_case(name))
            }
        };

        let mut ids = BTreeSet::new();
        for name in wanted {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let id = lookup(name)
                .ok_or_else(|| ControlError::Config(format!("模型标签中没有类别 {:?}", name)))?;
            ids.insert(id);
        }

        if ids.is_empty() {
            return Err(ControlError::Config("车辆类别集合为空".to_string()));
        }
        Ok(Self { ids })
    }

    pub fn contains(&self, class_id: usize) -> bool {
        self.ids.contains(&class_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids.iter().copied()
    }

    /// 只保留车辆
    pub fn filter<'a>(&self, detections: &'a [Detection]) -> Vec<&'a Detection> {
        detections
            .iter()
            .filter(|d| self.contains(d.class_id))
            .collect()
    }

    pub fn count(&self, detections: &[Detection]) -> usize {
        detections.iter().filter(|d| self.contains(d.class_id)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: [&str; 4] = ["car", "motorcycle", "bus", "truck"];

    fn det(class_id: usize) -> Detection {
        Detection::new(class_id, 0.9, (0, 0, 10, 10))
    }

    #[test]
    fn test_resolve_coco_fallback() {
        let classes = VehicleClasses::resolve(&[], &DEFAULT).unwrap();
        assert_eq!(classes.ids().collect::<Vec<_>>(), vec![2, 3, 5, 7]);
    }

    #[test]
    fn test_resolve_from_model_labels() {
        let labels: Vec<String> = ["bus", "person", "truck", "car", "motorcycle"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let classes = VehicleClasses::resolve(&labels, &DEFAULT).unwrap();
        assert_eq!(classes.ids().collect::<Vec<_>>(), vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_resolve_unknown_name() {
        let err = VehicleClasses::resolve(&[], &["car", "tractor"]).unwrap_err();
        assert!(matches!(err, ControlError::Config(_)));
    }

    #[test]
    fn test_count_ignores_other_classes() {
        let classes = VehicleClasses::resolve(&[], &DEFAULT).unwrap();
        let dets = [det(2), det(7), det(9)];
        assert_eq!(classes.count(&dets), 2);
        assert_eq!(classes.filter(&dets).len(), 2);
        assert_eq!(classes.count(&[]), 0);

        let people = [det(0), det(0), det(9), det(1)];
        assert_eq!(classes.count(&people), 0);
    }
}
