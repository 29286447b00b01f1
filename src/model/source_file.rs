//! Descriptor languages, file types and retrieved source files.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use super::entry::EntryKind;
use crate::error::{Error, Result};

/// Kind of a file attached to a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    DockstoreCwl,
    DockstoreWdl,
    Nextflow,
    NextflowConfig,
    DockstoreGxformat2,
    DockstoreSmk,
    DockstoreJupyter,
    CwlTestJson,
    WdlTestJson,
    NextflowTestParams,
    Gxformat2TestFile,
    SmkTestParams,
    JupyterTestParams,
    DockstoreYml,
    DockstoreServiceYml,
    DockstoreServiceTestJson,
    DockstoreServiceOther,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::DockstoreCwl => "DOCKSTORE_CWL",
            FileType::DockstoreWdl => "DOCKSTORE_WDL",
            FileType::Nextflow => "NEXTFLOW",
            FileType::NextflowConfig => "NEXTFLOW_CONFIG",
            FileType::DockstoreGxformat2 => "DOCKSTORE_GXFORMAT2",
            FileType::DockstoreSmk => "DOCKSTORE_SMK",
            FileType::DockstoreJupyter => "DOCKSTORE_JUPYTER",
            FileType::CwlTestJson => "CWL_TEST_JSON",
            FileType::WdlTestJson => "WDL_TEST_JSON",
            FileType::NextflowTestParams => "NEXTFLOW_TEST_PARAMS",
            FileType::Gxformat2TestFile => "GXFORMAT2_TEST_FILE",
            FileType::SmkTestParams => "SMK_TEST_PARAMS",
            FileType::JupyterTestParams => "JUPYTER_TEST_PARAMS",
            FileType::DockstoreYml => "DOCKSTORE_YML",
            FileType::DockstoreServiceYml => "DOCKSTORE_SERVICE_YML",
            FileType::DockstoreServiceTestJson => "DOCKSTORE_SERVICE_TEST_JSON",
            FileType::DockstoreServiceOther => "DOCKSTORE_SERVICE_OTHER",
        };
        f.write_str(name)
    }
}

/// Language an entry's primary descriptor is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DescriptorLanguage {
    Cwl,
    Wdl,
    Nfl,
    Galaxy,
    Smk,
    Jupyter,
    Service,
}

impl DescriptorLanguage {
    /// Parses the short name used in manifests (`CWL`, `WDL`, `gxformat2`, ...).
    pub fn from_short_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cwl" => Ok(Self::Cwl),
            "wdl" => Ok(Self::Wdl),
            "nfl" | "nextflow" => Ok(Self::Nfl),
            "galaxy" | "gxformat2" => Ok(Self::Galaxy),
            "smk" | "snakemake" => Ok(Self::Smk),
            "jupyter" | "ipynb" => Ok(Self::Jupyter),
            "service" => Ok(Self::Service),
            _ => Err(Error::UnsupportedDescriptor {
                message: format!("Type {} is not a valid descriptor language.", name),
            }),
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Self::Cwl => "CWL",
            Self::Wdl => "WDL",
            Self::Nfl => "NFL",
            Self::Galaxy => "GALAXY",
            Self::Smk => "SMK",
            Self::Jupyter => "JUPYTER",
            Self::Service => "SERVICE",
        }
    }

    /// File type of the primary descriptor.
    pub fn file_type(self) -> FileType {
        match self {
            Self::Cwl => FileType::DockstoreCwl,
            Self::Wdl => FileType::DockstoreWdl,
            Self::Nfl => FileType::Nextflow,
            Self::Galaxy => FileType::DockstoreGxformat2,
            Self::Smk => FileType::DockstoreSmk,
            Self::Jupyter => FileType::DockstoreJupyter,
            Self::Service => FileType::DockstoreServiceYml,
        }
    }

    /// File type of test-parameter files.
    pub fn test_param_type(self) -> FileType {
        match self {
            Self::Cwl => FileType::CwlTestJson,
            Self::Wdl => FileType::WdlTestJson,
            Self::Nfl => FileType::NextflowTestParams,
            Self::Galaxy => FileType::Gxformat2TestFile,
            Self::Smk => FileType::SmkTestParams,
            Self::Jupyter => FileType::JupyterTestParams,
            Self::Service => FileType::DockstoreServiceTestJson,
        }
    }

    pub fn supports(self, kind: EntryKind) -> bool {
        match self {
            Self::Cwl | Self::Wdl => {
                matches!(kind, EntryKind::Pipeline | EntryKind::SingleStepTool)
            }
            Self::Nfl | Self::Galaxy | Self::Smk | Self::Service => kind == EntryKind::Pipeline,
            Self::Jupyter => kind == EntryKind::Notebook,
        }
    }
}

impl fmt::Display for DescriptorLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Refinement of a descriptor language: the service flavour or the notebook
/// programming language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DescriptorLanguageSubclass {
    #[default]
    NotApplicable,
    DockerCompose,
    Swarm,
    Kubernetes,
    Helm,
    Python,
    R,
    Julia,
}

impl DescriptorLanguageSubclass {
    pub fn from_short_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "n/a" | "not_applicable" | "not applicable" => Ok(Self::NotApplicable),
            "docker-compose" | "docker_compose" => Ok(Self::DockerCompose),
            "swarm" => Ok(Self::Swarm),
            "kubernetes" => Ok(Self::Kubernetes),
            "helm" => Ok(Self::Helm),
            "python" => Ok(Self::Python),
            "r" => Ok(Self::R),
            "julia" => Ok(Self::Julia),
            _ => Err(Error::UnsupportedDescriptor {
                message: format!("Subclass {} is not a valid descriptor language subclass.", name),
            }),
        }
    }

    pub fn supports(self, kind: EntryKind) -> bool {
        match self {
            Self::NotApplicable => {
                matches!(kind, EntryKind::Pipeline | EntryKind::SingleStepTool)
            }
            Self::DockerCompose | Self::Swarm | Self::Kubernetes | Self::Helm => {
                kind == EntryKind::Pipeline
            }
            Self::Python | Self::R | Self::Julia => kind == EntryKind::Notebook,
        }
    }
}

/// Metadata probed from a file's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileMetadata {
    /// Declared language version (`v1.2`, `1.0`, ...)
    pub type_version: Option<String>,
    pub has_http_imports: bool,
    pub has_local_imports: bool,
}

/// One retrieved file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub file_type: FileType,
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub metadata: SourceFileMetadata,
}

impl SourceFile {
    pub fn new(file_type: FileType, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_type,
            path: path.into(),
            content: content.into(),
            metadata: SourceFileMetadata::default(),
        }
    }

    /// Same file under a different type.
    pub fn with_type(&self, file_type: FileType) -> Self {
        Self {
            file_type,
            ..self.clone()
        }
    }
}

/// Files of a version, unique by `(path, type)`.
///
/// Inserting a file whose path and type match an existing one evicts the
/// earlier file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFileSet {
    files: BTreeMap<(String, FileType), SourceFile>,
}

impl SourceFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `file`, returning the file it replaced.
    pub fn insert(&mut self, file: SourceFile) -> Option<SourceFile> {
        self.files.insert((file.path.clone(), file.file_type), file)
    }

    pub fn contains(&self, path: &str, file_type: FileType) -> bool {
        self.files.contains_key(&(path.to_string(), file_type))
    }

    /// First file at `path`, whatever its type.
    pub fn find_by_path(&self, path: &str) -> Option<&SourceFile> {
        self.files.values().find(|f| f.path == path)
    }

    pub fn of_type(&self, file_type: FileType) -> impl Iterator<Item = &SourceFile> {
        self.files.values().filter(move |f| f.file_type == file_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Extend<SourceFile> for SourceFileSet {
    fn extend<T: IntoIterator<Item = SourceFile>>(&mut self, iter: T) {
        for file in iter {
            self.insert(file);
        }
    }
}

impl FromIterator<SourceFile> for SourceFileSet {
    fn from_iter<T: IntoIterator<Item = SourceFile>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for SourceFileSet {
    type Item = SourceFile;
    type IntoIter = std::collections::btree_map::IntoValues<(String, FileType), SourceFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_values()
    }
}

impl Serialize for SourceFileSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.files.values())
    }
}
