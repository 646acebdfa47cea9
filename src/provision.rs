use std::path::Path;

use crate::{
    anaconda,
    artifacts::{self, Artifacts},
    command::Runner,
    config::Config,
    errors::{io_err, Result},
    files::{self, jupyter, kernel, spark, systemd},
    metadata::Role,
    packages, service,
};

/// Result of one provisioning run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// Not the master node; nothing was touched.
    Skipped(Role),
    Provisioned { hash: String },
}

/// Runs the master-node initialization for the given role.
///
/// Non-master roles return immediately without running any command or
/// touching the filesystem. On the master the steps run strictly in order
/// and the first failure is returned; completed steps are not rolled back.
/// Every step is safe to repeat on an already-provisioned node.
pub fn provision(role: &Role, cfg: &Config, runner: &dyn Runner) -> Result<Outcome> {
    if !role.is_master() {
        log::info!("node role '{}' is not master, nothing to do", role);
        return Ok(Outcome::Skipped(role.clone()));
    }
    cfg.validate()?;

    log::info!("STEP 1: installing anaconda");
    anaconda::install(runner, &cfg.anaconda, &cfg.retry)?;

    log::info!("STEP 2: installing packages {:?}", cfg.packages);
    packages::install(runner, &cfg.anaconda, &cfg.retry, &cfg.packages)?;

    log::info!("STEP 3: fetching artifacts");
    let hash = artifacts::fetch_hash(runner, &cfg.artifacts, &cfg.retry)?;
    let artifacts = Artifacts::new(&hash, &cfg.artifacts);
    artifacts::download(runner, &cfg.artifacts, &cfg.retry, &artifacts)?;

    log::info!("STEP 4: writing configuration");
    write_configs(cfg, &artifacts)?;

    log::info!("STEP 5: registering service '{}'", cfg.service.name);
    service::register(runner, cfg)?;

    log::info!("provisioned master node with hash '{}'", hash);
    Ok(Outcome::Provisioned { hash })
}

/// Writes the kernel spec, the spark settings, the notebook config and the
/// service unit for the fetched artifacts.
pub fn write_configs(cfg: &Config, artifacts: &Artifacts) -> Result<()> {
    kernel::write(cfg, artifacts)?;
    spark::write(cfg, artifacts)?;
    jupyter::write(cfg)?;
    systemd::write(cfg)?;
    Ok(())
}

/// Renders every generated file into "output_dir" without touching system
/// paths or running commands. Returns the written paths.
pub fn render(cfg: &Config, hash: &str, output_dir: &str) -> Result<Vec<String>> {
    artifacts::validate_hash(hash)?;
    log::info!("rendering configuration for hash '{}' into '{}'", hash, output_dir);

    let artifacts = Artifacts::new(hash, &cfg.artifacts);
    let dir = Path::new(output_dir);
    std::fs::create_dir_all(dir).map_err(|e| io_err("create_dir_all", output_dir, e))?;

    let unit_name = format!("{}.service", cfg.service.name);
    let rendered = [
        (
            "kernel.json",
            kernel::KernelSpec::new(cfg, &artifacts).encode_json()?,
        ),
        (
            "spark-defaults.conf",
            lines_to_string(&spark::defaults_lines(&artifacts)),
        ),
        ("spark-env.sh", lines_to_string(&spark::env_lines(cfg))),
        ("jupyter_notebook_config.py", jupyter::render(&cfg.jupyter)),
        (unit_name.as_str(), systemd::render(cfg)),
    ]
    .into_iter()
    .map(|(name, d)| (dir.join(name).display().to_string(), d))
    .collect::<Vec<_>>();

    let mut paths = Vec::with_capacity(rendered.len());
    for (p, d) in rendered {
        files::write_file(&p, &d)?;
        paths.push(p);
    }
    Ok(paths)
}

fn lines_to_string(lines: &[String]) -> String {
    let mut d = lines.join("\n");
    d.push('\n');
    d
}
