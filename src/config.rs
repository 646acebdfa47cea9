use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use crate::errors::{io_err, Error, Result};
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the artifact hash in the object name templates.
pub const HASH_PLACEHOLDER: &str = "{hash}";

/// Defines the node initialization configuration.
/// Every field falls back to the stock Dataproc/Hail layout when omitted.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub metadata: MetadataConfig,
    pub anaconda: AnacondaConfig,
    /// Extra pip packages, installed one at a time in this order.
    pub packages: Vec<String>,
    pub artifacts: ArtifactsConfig,
    pub spark: SparkConfig,
    pub jupyter: JupyterConfig,
    pub service: ServiceConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(default, rename_all = "snake_case")]
pub struct MetadataConfig {
    /// Full URL of the role attribute on the instance metadata server.
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from(
                "http://metadata.google.internal/computeMetadata/v1/instance/attributes/dataproc-role",
            ),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(default, rename_all = "snake_case")]
pub struct AnacondaConfig {
    pub installer_url: String,
    /// Install prefix, also where the installer is downloaded to.
    pub prefix: String,
    #[serde(with = "octal")]
    pub mode: u32,
}

impl Default for AnacondaConfig {
    fn default() -> Self {
        Self {
            installer_url: String::from(
                "https://repo.continuum.io/archive/Anaconda2-4.3.1-Linux-x86_64.sh",
            ),
            prefix: String::from("/home/anaconda2/"),
            mode: 0o755,
        }
    }
}

impl AnacondaConfig {
    /// Returns the installer file name, the last segment of the URL.
    pub fn installer_file_name(&self) -> &str {
        self.installer_url
            .rsplit('/')
            .next()
            .unwrap_or(self.installer_url.as_str())
    }

    /// Returns the local path the installer is downloaded to.
    pub fn installer_path(&self) -> String {
        format!("{}{}", append_slash(&self.prefix), self.installer_file_name())
    }

    /// Returns the path of an executable in the environment "bin" directory.
    pub fn bin(&self, name: &str) -> String {
        format!("{}bin/{}", append_slash(&self.prefix), name)
    }

    pub fn python(&self) -> String {
        self.bin("python")
    }

    pub fn jupyter(&self) -> String {
        self.bin("jupyter")
    }

    pub fn pip(&self) -> String {
        self.bin("pip")
    }
}

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(default, rename_all = "snake_case")]
pub struct ArtifactsConfig {
    pub bucket: String,
    /// Object holding the latest build hash.
    pub marker_object: String,
    pub jar_template: String,
    pub zip_template: String,
    /// Local directory the archives are copied to.
    pub dir: String,
    #[serde(with = "octal")]
    pub mode: u32,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            bucket: String::from("hail-common"),
            marker_object: String::from("latest-hash.txt"),
            jar_template: String::from("hail-hail-is-master-all-spark2.0.2-{hash}.jar"),
            zip_template: String::from("pyhail-hail-is-master-{hash}.zip"),
            dir: String::from("/home/hail/"),
            mode: 0o755,
        }
    }
}

impl ArtifactsConfig {
    /// Returns the "gs://" URL of an object in the artifact bucket.
    pub fn object_url(&self, object: &str) -> String {
        format!("gs://{}/{}", self.bucket.trim_end_matches('/'), object)
    }

    pub fn marker_url(&self) -> String {
        self.object_url(&self.marker_object)
    }
}

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(default, rename_all = "snake_case")]
pub struct SparkConfig {
    pub home: String,
    pub py4j_zip: String,
    pub defaults_conf: String,
    pub env_sh: String,
}

impl Default for SparkConfig {
    fn default() -> Self {
        Self {
            home: String::from("/usr/lib/spark/"),
            py4j_zip: String::from("/usr/lib/spark/python/lib/py4j-0.10.3-src.zip"),
            defaults_conf: String::from("/etc/spark/conf/spark-defaults.conf"),
            env_sh: String::from("/etc/spark/conf/spark-env.sh"),
        }
    }
}

impl SparkConfig {
    pub fn python_dir(&self) -> String {
        format!("{}python/", append_slash(&self.home))
    }
}

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(default, rename_all = "snake_case")]
pub struct JupyterConfig {
    pub kernel_name: String,
    pub display_name: String,
    pub log_level: String,
    pub ip: String,
    pub port: u16,
    pub token: String,
    pub open_browser: bool,
    pub contents_manager_class: String,
}

impl Default for JupyterConfig {
    fn default() -> Self {
        Self {
            kernel_name: String::from("hail"),
            display_name: String::from("Hail"),
            log_level: String::from("DEBUG"),
            ip: String::from("127.0.0.1"),
            port: 8123,
            token: String::new(),
            open_browser: false,
            contents_manager_class: String::from("jgscm.GoogleStorageContentManager"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(default, rename_all = "snake_case")]
pub struct ServiceConfig {
    pub name: String,
    pub unit_dir: String,
    pub description: String,
    pub after: String,
    pub user: String,
    pub group: String,
    pub restart: String,
    pub restart_sec: u32,
    pub wanted_by: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::from("jupyter"),
            unit_dir: String::from("/lib/systemd/system/"),
            description: String::from("Jupyter Notebook"),
            after: String::from("hadoop-yarn-resourcemanager.service"),
            user: String::from("root"),
            group: String::from("root"),
            restart: String::from("always"),
            restart_sec: 1,
            wanted_by: String::from("multi-user.target"),
        }
    }
}

impl ServiceConfig {
    pub fn unit_path(&self) -> String {
        format!("{}{}.service", append_slash(&self.unit_dir), self.name)
    }
}

/// Retry policy for the network-bound commands.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(default, rename_all = "snake_case")]
pub struct RetryConfig {
    pub attempts: u32,
    pub interval_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_secs: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata: MetadataConfig::default(),
            anaconda: AnacondaConfig::default(),
            packages: vec![
                String::from("lxml"),
                String::from("jupyter-spark"),
                String::from("jgscm"),
            ],
            artifacts: ArtifactsConfig::default(),
            spark: SparkConfig::default(),
            jupyter: JupyterConfig::default(),
            service: ServiceConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration from a YAML file.
    pub fn load(file_path: &str) -> Result<Self> {
        log::info!("loading config from '{}'", file_path);

        if !Path::new(file_path).exists() {
            return Err(Error::Config {
                message: format!("config file '{}' does not exist", file_path),
            });
        }

        let f = File::open(file_path).map_err(|e| io_err("File::open", file_path, e))?;
        serde_yaml::from_reader(f).map_err(|e| Error::Config {
            message: format!("invalid YAML in '{}' {}", file_path, e),
        })
    }

    /// Saves the current configuration to disk in YAML.
    pub fn sync(&self, file_path: &str) -> Result<()> {
        log::info!("syncing config to '{}'", file_path);

        let path = Path::new(file_path);
        if let Some(parent_dir) = path.parent() {
            fs::create_dir_all(parent_dir).map_err(|e| io_err("create_dir_all", file_path, e))?;
        }

        let d = self.encode_yaml()?;
        let mut f = File::create(file_path).map_err(|e| io_err("File::create", file_path, e))?;
        f.write_all(d.as_bytes())
            .map_err(|e| io_err("write_all", file_path, e))?;

        Ok(())
    }

    pub fn encode_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config {
            message: format!("failed to serialize config to YAML {}", e),
        })
    }

    /// Validates the configuration before anything touches the system.
    pub fn validate(&self) -> Result<()> {
        log::info!("validating config");

        for pkg in self.packages.iter() {
            if pkg.trim().is_empty() || pkg.contains(char::is_whitespace) {
                return invalid(format!("invalid package name '{}'", pkg));
            }
        }
        if self.artifacts.bucket.trim().is_empty() {
            return invalid("artifacts.bucket is empty".to_string());
        }
        if self.artifacts.marker_object.trim().is_empty() {
            return invalid("artifacts.marker_object is empty".to_string());
        }
        for tmpl in [&self.artifacts.jar_template, &self.artifacts.zip_template] {
            if !tmpl.contains(HASH_PLACEHOLDER) {
                return invalid(format!(
                    "artifact template '{}' is missing '{}'",
                    tmpl, HASH_PLACEHOLDER
                ));
            }
        }
        if self.jupyter.port == 0 {
            return invalid("jupyter.port must be non-zero".to_string());
        }
        if self.service.name.trim().is_empty() {
            return invalid("service.name is empty".to_string());
        }
        if self.retry.attempts == 0 {
            return invalid("retry.attempts must be at least 1".to_string());
        }

        for (field, p) in [
            ("anaconda.prefix", &self.anaconda.prefix),
            ("artifacts.dir", &self.artifacts.dir),
            ("spark.home", &self.spark.home),
            ("spark.defaults_conf", &self.spark.defaults_conf),
            ("spark.env_sh", &self.spark.env_sh),
            ("service.unit_dir", &self.service.unit_dir),
        ] {
            if !Path::new(p).is_absolute() {
                return invalid(format!("{} '{}' must be an absolute path", field, p));
            }
        }

        for (field, mode) in [
            ("anaconda.mode", self.anaconda.mode),
            ("artifacts.mode", self.artifacts.mode),
        ] {
            if mode > 0o7777 {
                return invalid(format!("{} '{:o}' is not a valid file mode", field, mode));
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> Result<()> {
    Err(Error::Config { message })
}

/// Appends a trailing slash to a directory path if missing.
pub fn append_slash(k: &str) -> String {
    if k.is_empty() || k.ends_with('/') {
        String::from(k)
    } else {
        format!("{}/", k)
    }
}

/// Serializes file modes as octal strings (e.g., "755").
mod octal {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:o}", mode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim().trim_start_matches("0o");
        u32::from_str_radix(s, 8).map_err(D::Error::custom)
    }
}

#[test]
fn test_append_slash() {
    assert_eq!(append_slash("hello"), "hello/");
    assert_eq!(append_slash("hello/"), "hello/");
    assert_eq!(append_slash(""), "");
}

#[test]
fn test_defaults() {
    let cfg = Config::new();
    assert_eq!(cfg.packages, vec!["lxml", "jupyter-spark", "jgscm"]);
    assert_eq!(
        cfg.anaconda.installer_path(),
        "/home/anaconda2/Anaconda2-4.3.1-Linux-x86_64.sh"
    );
    assert_eq!(cfg.anaconda.pip(), "/home/anaconda2/bin/pip");
    assert_eq!(cfg.artifacts.marker_url(), "gs://hail-common/latest-hash.txt");
    assert_eq!(cfg.service.unit_path(), "/lib/systemd/system/jupyter.service");
    assert_eq!(cfg.spark.python_dir(), "/usr/lib/spark/python/");
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_load_sync() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("sub").join("config.yaml");
    let p = p.to_str().unwrap();

    let mut cfg = Config::new();
    cfg.jupyter.port = 9999;
    cfg.anaconda.mode = 0o750;
    cfg.sync(p).unwrap();

    let contents = fs::read_to_string(p).unwrap();
    assert!(contents.contains("mode: '750'") || contents.contains("mode: \"750\""));

    let loaded = Config::load(p).unwrap();
    assert_eq!(cfg, loaded);
}

#[test]
fn test_load_partial() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("config.yaml");
    fs::write(
        &p,
        "packages:\n  - lxml\njupyter:\n  port: 9000\nanaconda:\n  mode: \"700\"\n",
    )
    .unwrap();

    let cfg = Config::load(p.to_str().unwrap()).unwrap();
    assert_eq!(cfg.packages, vec!["lxml"]);
    assert_eq!(cfg.jupyter.port, 9000);
    assert_eq!(cfg.jupyter.ip, "127.0.0.1");
    assert_eq!(cfg.anaconda.mode, 0o700);
    assert_eq!(cfg.anaconda.prefix, "/home/anaconda2/");
}

#[test]
fn test_load_missing() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("nope.yaml");
    let e = Config::load(p.to_str().unwrap()).unwrap_err();
    assert!(matches!(e, Error::Config { .. }));
}

#[test]
fn test_validate() {
    let mut cfg = Config::new();
    cfg.packages.push("two words".to_string());
    assert!(cfg.validate().is_err());

    let mut cfg = Config::new();
    cfg.artifacts.bucket = String::new();
    assert!(cfg.validate().is_err());

    let mut cfg = Config::new();
    cfg.artifacts.jar_template = "hail.jar".to_string();
    assert!(cfg.validate().is_err());

    let mut cfg = Config::new();
    cfg.jupyter.port = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = Config::new();
    cfg.spark.defaults_conf = "spark-defaults.conf".to_string();
    assert!(cfg.validate().is_err());

    let mut cfg = Config::new();
    cfg.retry.attempts = 0;
    assert!(cfg.validate().is_err());
}
