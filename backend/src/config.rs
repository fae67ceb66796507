use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const UPLOAD_DIR_NAME: &str = "uploaded_images";
pub const OUTPUT_DIR_NAME: &str = "output";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Unknown model backend: {0}")]
    UnknownBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    YoloCli,
    Torch,
}

impl FromStr for ModelBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yolo-cli" | "yolo" | "cli" => Ok(ModelBackend::YoloCli),
            "torch" | "torchscript" => Ok(ModelBackend::Torch),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub backend: ModelBackend,
    pub model_path: PathBuf,
    pub class_names_path: PathBuf,
    pub yolo_bin: String,
    pub confidence: f32,
    pub iou: f32,
    pub image_size: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub predicts_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub model: ModelConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let frontend_dir = match lookup("FRONTEND_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => match lookup("CARGO_MANIFEST_DIR") {
                Some(manifest_dir) => PathBuf::from(format!("{}/../frontend/dist", manifest_dir)),
                None => PathBuf::from("/usr/src/app/frontend/dist"),
            },
        };

        let max_upload_mb: usize = parse_or(&lookup, "MAX_UPLOAD_MB", 50)?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| invalid_value("MAX_UPLOAD_MB", max_upload_mb))?;

        let image_size: u32 = parse_or(&lookup, "MODEL_IMGSZ", 640)?;
        if image_size == 0 {
            return Err(invalid_value("MODEL_IMGSZ", image_size));
        }

        let model = ModelConfig {
            backend: lookup("MODEL_BACKEND")
                .as_deref()
                .unwrap_or("yolo-cli")
                .parse()?,
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("best.pt")),
            class_names_path: lookup("CLASS_NAMES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data.yaml")),
            yolo_bin: lookup("YOLO_BIN").unwrap_or_else(|| "yolo".to_string()),
            confidence: parse_or(&lookup, "MODEL_CONF", 0.25)?,
            iou: parse_or(&lookup, "MODEL_IOU", 0.7)?,
            image_size,
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", 8081)?,
            predicts_dir: lookup("PREDICTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("predicts")),
            frontend_dir,
            max_upload_bytes,
            model,
        })
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.predicts_dir.join(UPLOAD_DIR_NAME)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.predicts_dir.join(OUTPUT_DIR_NAME)
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        create_dir(&self.upload_dir())?;
        create_dir(&self.output_dir())
    }
}

fn create_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)?;
    log::info!("Using directory {}", path.display());
    Ok(())
}

fn invalid_value(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_demo_layout() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.upload_dir(), Path::new("predicts/uploaded_images"));
        assert_eq!(config.output_dir(), Path::new("predicts/output"));
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.model.backend, ModelBackend::YoloCli);
        assert_eq!(config.model.model_path, Path::new("best.pt"));
        assert_eq!(
            config.frontend_dir,
            Path::new("/usr/src/app/frontend/dist")
        );
    }

    #[test]
    fn port_and_backend_come_from_env() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("MODEL_BACKEND", "Torch"),
            ("CARGO_MANIFEST_DIR", "/src/backend"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.model.backend, ModelBackend::Torch);
        assert_eq!(config.frontend_dir, Path::new("/src/backend/../frontend/dist"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PORT"));

        let err = AppConfig::from_lookup(lookup_from(&[("MODEL_BACKEND", "onnx")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(_)));

        let err = AppConfig::from_lookup(lookup_from(&[(
            "MAX_UPLOAD_MB",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MAX_UPLOAD_MB"));

        let err = AppConfig::from_lookup(lookup_from(&[("MODEL_IMGSZ", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MODEL_IMGSZ"));
    }

    #[test]
    fn ensure_dirs_creates_both_directories() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("predicts");
        let root_str = root.to_string_lossy().to_string();
        let config =
            AppConfig::from_lookup(lookup_from(&[("PREDICTS_DIR", root_str.as_str())])).unwrap();
        config.ensure_dirs().unwrap();
        config.ensure_dirs().unwrap();
        assert!(root.join("uploaded_images").is_dir());
        assert!(root.join("output").is_dir());
    }
}
