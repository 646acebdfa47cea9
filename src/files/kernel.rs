use std::collections::BTreeMap;

use crate::{
    artifacts::Artifacts,
    config::{append_slash, Config},
    errors::{Error, Result},
    files,
};
use serde::{Deserialize, Serialize};

/// Jupyter kernel specification ("kernel.json").
/// ref. https://jupyter-client.readthedocs.io/en/stable/kernels.html#kernel-specs
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
pub struct KernelSpec {
    pub argv: Vec<String>,
    pub display_name: String,
    pub language: String,
    pub env: BTreeMap<String, String>,
}

impl KernelSpec {
    pub fn new(cfg: &Config, artifacts: &Artifacts) -> Self {
        let python_path = [
            cfg.spark.python_dir(),
            cfg.spark.py4j_zip.clone(),
            artifacts.zip_path.clone(),
        ]
        .join(":");

        let mut env = BTreeMap::new();
        env.insert("PYTHONHASHSEED".to_string(), "0".to_string());
        env.insert("SPARK_HOME".to_string(), append_slash(&cfg.spark.home));
        env.insert("PYTHONPATH".to_string(), python_path);

        Self {
            argv: vec![
                cfg.anaconda.python(),
                "-m".to_string(),
                "ipykernel".to_string(),
                "-f".to_string(),
                // substituted by the notebook server at launch
                "{connection_file}".to_string(),
            ],
            display_name: cfg.jupyter.display_name.clone(),
            language: "python".to_string(),
            env,
        }
    }

    pub fn encode_json(&self) -> Result<String> {
        let mut d = serde_json::to_string_pretty(self).map_err(|e| Error::Other {
            message: format!("failed to serialize kernel spec {}", e),
            retryable: false,
        })?;
        d.push('\n');
        Ok(d)
    }
}

/// Returns the kernel spec path in the environment's default kernel directory.
pub fn spec_path(cfg: &Config) -> String {
    format!(
        "{}share/jupyter/kernels/{}/kernel.json",
        append_slash(&cfg.anaconda.prefix),
        cfg.jupyter.kernel_name
    )
}

/// Writes the kernel spec and returns its path.
pub fn write(cfg: &Config, artifacts: &Artifacts) -> Result<String> {
    let p = spec_path(cfg);
    log::info!("writing kernel spec '{}'", p);

    let d = KernelSpec::new(cfg, artifacts).encode_json()?;
    files::write_file(&p, &d)?;
    Ok(p)
}

#[test]
fn test_kernel_spec() {
    let cfg = Config::default();
    let artifacts = Artifacts::new("abc123", &cfg.artifacts);
    let spec = KernelSpec::new(&cfg, &artifacts);

    assert_eq!(
        spec.argv,
        vec![
            "/home/anaconda2/bin/python",
            "-m",
            "ipykernel",
            "-f",
            "{connection_file}"
        ]
    );
    assert_eq!(spec.display_name, "Hail");
    assert_eq!(spec.language, "python");
    assert_eq!(spec.env["PYTHONHASHSEED"], "0");
    assert_eq!(spec.env["SPARK_HOME"], "/usr/lib/spark/");
    assert_eq!(
        spec.env["PYTHONPATH"],
        "/usr/lib/spark/python/:/usr/lib/spark/python/lib/py4j-0.10.3-src.zip:/home/hail/pyhail-hail-is-master-abc123.zip"
    );
    assert_eq!(
        spec_path(&cfg),
        "/home/anaconda2/share/jupyter/kernels/hail/kernel.json"
    );

    let d = spec.encode_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&d).unwrap();
    assert_eq!(parsed["display_name"], "Hail");
    assert_eq!(parsed["argv"][4], "{connection_file}");
}
