use serde::{Deserialize, Serialize};

/// A file or folder inside a representation's `data` directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: String,
    pub aip_id: String,
    pub representation_id: String,
    /// Folders between `data` and the file.
    #[serde(default)]
    pub path: Vec<String>,
    pub is_directory: bool,
}

impl File {
    pub fn new<S: AsRef<str>>(aip_id: &str, representation_id: &str, path: &[S], id: &str, is_directory: bool) -> Self {
        Self {
            id: id.into(),
            aip_id: aip_id.into(),
            representation_id: representation_id.into(),
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            is_directory,
        }
    }
}
