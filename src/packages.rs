use crate::{
    command::{run_with_retries, Command, Runner},
    config::{AnacondaConfig, RetryConfig},
    errors::Result,
};

/// Installs each package with the environment's pip, one invocation per
/// package in the given order. Stops at the first failure.
pub fn install(
    runner: &dyn Runner,
    cfg: &AnacondaConfig,
    retry: &RetryConfig,
    packages: &[String],
) -> Result<()> {
    let pip = cfg.pip();
    for pkg in packages.iter() {
        log::info!("installing package '{}'", pkg);
        let cmd = Command::new(&pip)
            .args(&["install", pkg.as_str()])
            .retryable(true);
        run_with_retries(runner, &cmd, retry)?;
    }

    log::info!("installed {} packages", packages.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RecordingRunner;

    fn no_wait() -> RetryConfig {
        RetryConfig {
            attempts: 1,
            interval_secs: 0,
        }
    }

    #[test]
    fn test_one_invocation_per_package() {
        let runner = RecordingRunner::new();
        let pkgs = vec![
            "lxml".to_string(),
            "jupyter-spark".to_string(),
            "jgscm".to_string(),
        ];
        install(&runner, &AnacondaConfig::default(), &no_wait(), &pkgs).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        for (call, pkg) in calls.iter().zip(pkgs.iter()) {
            assert_eq!(call.program, "/home/anaconda2/bin/pip");
            assert_eq!(call.args, vec!["install".to_string(), pkg.clone()]);
        }
    }

    #[test]
    fn test_stops_at_first_failure() {
        let runner =
            RecordingRunner::new().with_failure("/home/anaconda2/bin/pip install jupyter-spark", false);
        let pkgs = vec![
            "lxml".to_string(),
            "jupyter-spark".to_string(),
            "jgscm".to_string(),
        ];
        assert!(install(&runner, &AnacondaConfig::default(), &no_wait(), &pkgs).is_err());
        assert_eq!(runner.calls().len(), 2);
    }
}
