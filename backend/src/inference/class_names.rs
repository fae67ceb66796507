use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::InferenceError;

/// Class index to label table, as found in the `names:` key of a dataset YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNames(BTreeMap<usize, String>);

#[derive(Debug, Deserialize)]
struct DatasetConfig {
    names: NamesSpec,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NamesSpec {
    List(Vec<String>),
    Map(BTreeMap<usize, String>),
}

impl ClassNames {
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let config_str =
            std::fs::read_to_string(path).map_err(|e| InferenceError::ClassNames {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let names = Self::from_yaml_str(&config_str).map_err(|reason| {
            InferenceError::ClassNames {
                path: path.to_path_buf(),
                reason,
            }
        })?;
        log::info!("Loaded {} class names from {}", names.len(), path.display());
        Ok(names)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, String> {
        let config: DatasetConfig = serde_yaml::from_str(config_str).map_err(|e| e.to_string())?;
        let names = match config.names {
            NamesSpec::List(list) => list.into_iter().enumerate().collect(),
            NamesSpec::Map(map) => map,
        };
        Ok(Self(names))
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).enumerate().collect())
    }

    pub fn get(&self, class: usize) -> Option<&str> {
        self.0.get(&class).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_list_form() {
        let names = ClassNames::from_yaml_str(
            "path: ../datasets/waste\ntrain: images/train\nnc: 3\nnames: ['metal', 'paper', 'plastic']\n",
        )
        .unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names.get(2), Some("plastic"));
        assert_eq!(names.get(3), None);
    }

    #[test]
    fn reads_map_form() {
        let names =
            ClassNames::from_yaml_str("names:\n  0: glass\n  4: cardboard\n").unwrap();
        assert_eq!(names.get(0), Some("glass"));
        assert_eq!(names.get(4), Some("cardboard"));
        assert_eq!(names.get(1), None);
    }

    #[test]
    fn missing_names_key_is_an_error() {
        assert!(ClassNames::from_yaml_str("nc: 2\n").is_err());
    }

    #[test]
    fn load_reports_the_path() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("data.yaml");
        let err = ClassNames::load(&missing).unwrap_err();
        assert!(matches!(err, InferenceError::ClassNames { ref path, .. } if path == &missing));

        std::fs::write(&missing, "names: [organic]\n").unwrap();
        assert_eq!(ClassNames::load(&missing).unwrap(), ClassNames::from_labels(["organic"]));
    }
}
