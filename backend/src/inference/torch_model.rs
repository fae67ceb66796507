use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tch::{CModule, Device, IValue, Kind, Tensor};

use crate::config::ModelConfig;

use super::annotate::{annotate, save_annotated};
use super::yolo_decode::{DecodeParams, RawOutput, decode, letterbox_tensor};
use super::{ClassNames, InferenceError, Prediction, SaveOptions, SegmentationModel};

const MAX_DETECTIONS: usize = 300;

/// YOLOv8-seg weights exported to TorchScript, run in-process.
#[derive(Clone)]
pub struct TorchModel {
    model: Arc<Mutex<CModule>>,
    device: Device,
    names: ClassNames,
    image_size: u32,
    params: DecodeParams,
}

impl TorchModel {
    pub fn new(config: &ModelConfig, names: ClassNames) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let model = CModule::load_on_device(&config.model_path, device)?;
        log::info!(
            "Loaded TorchScript model {} on {:?}",
            config.model_path.display(),
            device
        );
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            device,
            names,
            image_size: config.image_size,
            params: DecodeParams {
                confidence: config.confidence,
                iou: config.iou,
                max_detections: MAX_DETECTIONS,
            },
        })
    }

    fn forward(&self, input: &Tensor) -> Result<(Tensor, Tensor), InferenceError> {
        let model = self
            .model
            .lock()
            .map_err(|_| InferenceError::Model("model mutex poisoned".to_string()))?;
        let output = tch::no_grad(|| model.forward_is(&[IValue::Tensor(input.shallow_clone())]))?;

        let mut tensors: Vec<Tensor> = match output {
            IValue::Tuple(values) | IValue::GenericList(values) => values
                .into_iter()
                .filter_map(|value| match value {
                    IValue::Tensor(tensor) => Some(tensor),
                    _ => None,
                })
                .collect(),
            IValue::TensorList(tensors) => tensors,
            _ => Vec::new(),
        };

        if tensors.len() < 2 {
            return Err(InferenceError::Model(format!(
                "expected predictions and mask prototypes, got {} tensors",
                tensors.len()
            )));
        }
        let protos = tensors.remove(1);
        let preds = tensors.remove(0);
        Ok((preds, protos))
    }
}

fn to_vec(tensor: &Tensor) -> Result<Vec<f32>, InferenceError> {
    let flat = tensor
        .to_device(Device::Cpu)
        .to_kind(Kind::Float)
        .contiguous()
        .view([-1]);
    Ok(Vec::<f32>::try_from(&flat)?)
}

impl SegmentationModel for TorchModel {
    fn name(&self) -> &str {
        "torch"
    }

    fn predict(&self, image_path: &Path, save: &SaveOptions) -> Result<Prediction, InferenceError> {
        let image = image::open(image_path)?.to_rgb8();
        let (data, letterbox) = letterbox_tensor(&image, self.image_size);
        let size = self.image_size as i64;
        let input = Tensor::from_slice(&data)
            .view([1, 3, size, size])
            .to_device(self.device);

        let (preds, protos) = self.forward(&input)?;
        let pred_shape = preds.size();
        let proto_shape = protos.size();
        if pred_shape.len() != 3 || proto_shape.len() != 4 {
            return Err(InferenceError::Model(format!(
                "unexpected output shapes {:?} and {:?}",
                pred_shape, proto_shape
            )));
        }

        let preds = to_vec(&preds)?;
        let protos = to_vec(&protos)?;
        let raw = RawOutput {
            preds: &preds,
            channels: pred_shape[1] as usize,
            anchors: pred_shape[2] as usize,
            protos: &protos,
            mask_dim: proto_shape[1] as usize,
            proto_height: proto_shape[2] as usize,
            proto_width: proto_shape[3] as usize,
        };
        let detections = decode(&raw, &letterbox, &self.params);
        log::debug!("{} detections in {}", detections.len(), image_path.display());

        let output_dir = save.output_dir();
        fs::create_dir_all(&output_dir)?;
        let file_name = image_path.file_name().ok_or_else(|| {
            InferenceError::Model(format!("no file name in {}", image_path.display()))
        })?;
        save_annotated(&annotate(&image, &detections), &output_dir.join(file_name))?;

        let classes = detections.iter().map(|d| d.class).collect();
        Ok(Prediction::new(self.names.clone(), classes))
    }
}
