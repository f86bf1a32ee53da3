//! Configuration for FNF sessions
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (fnf.toml)
//! - Environment variables (FNF__*)
//!
//! ## Example config file (fnf.toml):
//! ```toml
//! [registry]
//! base_id = 1
//!
//! [binary]
//! version_major = 3
//! version_minor = 5
//!
//! [xml]
//! indent = 2
//! default_namespace = "http://www.ipdr.org/namespaces/ipdr"
//! recorder_info = "collector-01"
//! record_element = "named"
//!
//! [validation]
//! enabled = true
//! strict = true
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::document::{DocHeader, DocVersion, DEFAULT_NAMESPACE};
use crate::error::Result;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FnfConfig {
    /// Descriptor registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Binary codec settings
    #[serde(default)]
    pub binary: BinaryConfig,

    /// XML codec settings
    #[serde(default)]
    pub xml: XmlConfig,

    /// Schema validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// First descriptor id allocated in a session
    #[serde(default = "default_base_id")]
    pub base_id: u32,
}

/// Binary codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryConfig {
    /// Stream header major version; readers reject other majors
    #[serde(default = "default_version_major")]
    pub version_major: u32,

    #[serde(default = "default_version_minor")]
    pub version_minor: u32,
}

/// How the XML writer names record elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordElement {
    /// `<typeName>...</typeName>`
    #[default]
    Named,
    /// `<IPDR xsi:type="typeName">...</IPDR>`
    Typed,
}

/// XML codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlConfig {
    /// Indentation width, 0 for compact output
    #[serde(default = "default_indent")]
    pub indent: usize,

    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Written as the root's IPDRRecorderInfo attribute
    #[serde(default = "default_recorder_info")]
    pub recorder_info: String,

    #[serde(default)]
    pub record_element: RecordElement,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Validate records when a schema is loaded
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Schema violations are errors; otherwise they are warnings
    #[serde(default = "default_true")]
    pub strict: bool,
}

// Default value functions
fn default_base_id() -> u32 {
    1
}

fn default_version_major() -> u32 {
    3
}

fn default_version_minor() -> u32 {
    5
}

fn default_indent() -> usize {
    2
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_recorder_info() -> String {
    "ipdr-fnf".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_id: default_base_id(),
        }
    }
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            version_major: default_version_major(),
            version_minor: default_version_minor(),
        }
    }
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            default_namespace: default_namespace(),
            recorder_info: default_recorder_info(),
            record_element: RecordElement::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: true,
        }
    }
}

impl FnfConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["fnf.toml", ".fnf.toml", "config/fnf.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "ipdr", "fnf") {
            let xdg_config = config_dir.config_dir().join("fnf.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (FNF__*)
        builder = builder.add_source(
            Environment::with_prefix("FNF")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Version written into stream headers
    pub fn doc_version(&self) -> DocVersion {
        DocVersion::new(self.binary.version_major, self.binary.version_minor)
    }

    /// A fresh document header carrying the configured namespace and recorder info
    pub fn doc_header(&self) -> DocHeader {
        let mut header = DocHeader::new(self.doc_version(), self.xml.recorder_info.clone());
        header.default_namespace = self.xml.default_namespace.clone();
        header
    }
}
