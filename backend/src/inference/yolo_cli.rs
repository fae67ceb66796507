use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ModelConfig;

use super::{ClassNames, InferenceError, Prediction, SaveOptions, SegmentationModel};

/// Runs segmentation through the Ultralytics `yolo` command line.
///
/// The CLI writes the annotated image into the run directory and, with
/// `save_txt=True`, one `labels/<stem>.txt` file whose lines start with the
/// class index of each detected instance. No label file means no detections.
pub struct YoloCliModel {
    program: String,
    leading_args: Vec<String>,
    weights: PathBuf,
    names: ClassNames,
    confidence: f32,
    iou: f32,
    image_size: u32,
}

impl YoloCliModel {
    pub fn new(config: &ModelConfig, names: ClassNames) -> Self {
        // YOLO_BIN may carry a launcher, e.g. "uv run yolo".
        let mut parts = config.yolo_bin.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "yolo".to_string());
        Self {
            program,
            leading_args: parts.collect(),
            weights: config.model_path.clone(),
            names,
            confidence: config.confidence,
            iou: config.iou,
            image_size: config.image_size,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn build_args(&self, image_path: &Path, output_dir: &Path) -> Vec<String> {
        let project = output_dir.parent().unwrap_or_else(|| Path::new("."));
        let name = output_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut args = self.leading_args.clone();
        args.extend([
            "segment".to_string(),
            "predict".to_string(),
            format!("model={}", self.weights.display()),
            format!("source={}", image_path.display()),
            format!("project={}", project.display()),
            format!("name={}", name),
            // never let the CLI pick a numbered sibling run directory
            "exist_ok=True".to_string(),
            "save=True".to_string(),
            "save_txt=True".to_string(),
            format!("conf={}", self.confidence),
            format!("iou={}", self.iou),
            format!("imgsz={}", self.image_size),
        ]);
        args
    }

    pub fn label_file(output_dir: &Path, image_path: &Path) -> PathBuf {
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        output_dir.join("labels").join(format!("{}.txt", stem))
    }

    fn read_classes(label_path: &Path) -> Result<Vec<usize>, InferenceError> {
        match fs::read_to_string(label_path) {
            Ok(contents) => parse_label_lines(&contents).map_err(|reason| {
                InferenceError::Detections {
                    path: label_path.to_path_buf(),
                    reason,
                }
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(InferenceError::Detections {
                path: label_path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}

impl SegmentationModel for YoloCliModel {
    fn name(&self) -> &str {
        "yolo-cli"
    }

    fn predict(&self, image_path: &Path, save: &SaveOptions) -> Result<Prediction, InferenceError> {
        let output_dir = save.output_dir();
        let args = self.build_args(image_path, &output_dir);
        log::info!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| InferenceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log::error!("{} failed ({}): {}", self.program, output.status, stderr);
            return Err(InferenceError::Process {
                status: output.status.to_string(),
                stderr,
            });
        }

        let label_path = Self::label_file(&output_dir, image_path);
        let classes = Self::read_classes(&label_path)?;
        log::debug!("{} instances listed in {}", classes.len(), label_path.display());

        Ok(Prediction::new(self.names.clone(), classes))
    }
}

/// Class index of every non-empty line of a YOLO label file.
pub fn parse_label_lines(contents: &str) -> Result<Vec<usize>, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let token = line.split_whitespace().next().unwrap_or_default();
            token
                .parse::<usize>()
                .or_else(|_| {
                    token
                        .parse::<f32>()
                        .ok()
                        .filter(|v| *v >= 0.0 && v.fract() == 0.0)
                        .map(|v| v as usize)
                        .ok_or(())
                })
                .map_err(|_| format!("invalid class index '{}'", token))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelBackend;

    fn config(yolo_bin: &str) -> ModelConfig {
        ModelConfig {
            backend: ModelBackend::YoloCli,
            model_path: PathBuf::from("best.pt"),
            class_names_path: PathBuf::from("data.yaml"),
            yolo_bin: yolo_bin.to_string(),
            confidence: 0.25,
            iou: 0.7,
            image_size: 640,
        }
    }

    fn names() -> ClassNames {
        ClassNames::from_labels(["plastic", "metal"])
    }

    #[test]
    fn args_point_the_run_at_the_output_dir() {
        let model = YoloCliModel::new(&config("yolo"), names());
        let args = model.build_args(
            Path::new("predicts/uploaded_images/abc.jpg"),
            Path::new("predicts/output"),
        );
        assert_eq!(
            args,
            vec![
                "segment",
                "predict",
                "model=best.pt",
                "source=predicts/uploaded_images/abc.jpg",
                "project=predicts",
                "name=output",
                "exist_ok=True",
                "save=True",
                "save_txt=True",
                "conf=0.25",
                "iou=0.7",
                "imgsz=640",
            ]
        );
    }

    #[test]
    fn launcher_words_are_prepended() {
        let model = YoloCliModel::new(&config("uv run yolo"), names());
        assert_eq!(model.program(), "uv");
        let args = model.build_args(Path::new("a.png"), Path::new("out/run"));
        assert_eq!(&args[..4], &["run", "yolo", "segment", "predict"]);
    }

    #[test]
    fn label_lines_yield_class_indices() {
        let contents = "0 0.1 0.2 0.3 0.4\n\n2 0.5 0.5 0.6 0.6\n1.0 0.1 0.1\n";
        assert_eq!(parse_label_lines(contents).unwrap(), vec![0, 2, 1]);
        assert!(parse_label_lines("cat 0.1 0.2\n").is_err());
        assert!(parse_label_lines("").unwrap().is_empty());
    }

    #[test]
    fn label_file_follows_the_image_stem() {
        assert_eq!(
            YoloCliModel::label_file(Path::new("predicts/output"), Path::new("x/abc.jpeg")),
            Path::new("predicts/output/labels/abc.txt")
        );
    }

    #[cfg(unix)]
    const FAKE_YOLO: &str = r#"
for arg in "$@"; do
  case "$arg" in
    source=*) src="${arg#source=}" ;;
    project=*) project="${arg#project=}" ;;
    name=*) name="${arg#name=}" ;;
  esac
done
out="$project/$name"
mkdir -p "$out/labels"
cp "$src" "$out/"
base=$(basename "$src")
stem="${base%.*}"
case "$stem" in
  empty*) ;;
  *) printf '0 0.1 0.1 0.2 0.2\n1 0.5 0.5 0.6 0.6\n0 0.3 0.3 0.4 0.4\n' > "$out/labels/$stem.txt" ;;
esac
"#;

    #[cfg(unix)]
    fn fake_cli(dir: &Path) -> YoloCliModel {
        let script = dir.join("fake_yolo.sh");
        fs::write(&script, FAKE_YOLO).unwrap();
        YoloCliModel::new(&config(&format!("sh {}", script.display())), names())
    }

    #[cfg(unix)]
    #[test]
    fn predict_reads_detections_written_by_the_cli() {
        let temp = tempfile::tempdir().unwrap();
        let model = fake_cli(temp.path());
        let image = temp.path().join("abc.jpg");
        fs::write(&image, b"jpeg bytes").unwrap();

        let save = SaveOptions::new(temp.path().join("predicts"), "output");
        let prediction = model.predict(&image, &save).unwrap();

        assert_eq!(prediction.classes, vec![0, 1, 0]);
        assert_eq!(prediction.labels().unwrap(), vec!["plastic", "metal"]);
        assert!(temp.path().join("predicts/output/abc.jpg").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn missing_label_file_means_zero_detections() {
        let temp = tempfile::tempdir().unwrap();
        let model = fake_cli(temp.path());
        let image = temp.path().join("empty-scene.png");
        fs::write(&image, b"png bytes").unwrap();

        let save = SaveOptions::new(temp.path().join("predicts"), "output");
        let prediction = model.predict(&image, &save).unwrap();
        assert!(prediction.classes.is_empty());
        assert!(prediction.labels().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn failing_process_reports_stderr() {
        let temp = tempfile::tempdir().unwrap();
        let script = temp.path().join("broken.sh");
        fs::write(&script, "echo 'weights not found' >&2\nexit 3\n").unwrap();
        let model = YoloCliModel::new(&config(&format!("sh {}", script.display())), names());

        let save = SaveOptions::new(temp.path(), "output");
        let err = model.predict(Path::new("x.jpg"), &save).unwrap_err();
        match err {
            InferenceError::Process { stderr, .. } => assert_eq!(stderr, "weights not found"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let model = YoloCliModel::new(&config("/nonexistent/bin/yolo"), names());
        let temp = tempfile::tempdir().unwrap();
        let save = SaveOptions::new(temp.path(), "output");
        let err = model.predict(Path::new("x.jpg"), &save).unwrap_err();
        assert!(matches!(err, InferenceError::Spawn { .. }));
    }
}
