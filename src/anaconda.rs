use crate::{
    command::{run_with_retries, Command, Runner},
    config::{append_slash, AnacondaConfig, RetryConfig},
    errors::Result,
    files,
};

/// Downloads and installs the Anaconda distribution into the prefix,
/// then applies the configured permission bits.
///
/// The installer is always fetched again with "-O", so a truncated file
/// left by an earlier run is overwritten rather than executed.
///
/// e.g.,
/// wget --no-verbose --retry-connrefused --waitretry=1 --read-timeout=20 --timeout=15 --tries=70 -O /home/anaconda2/Anaconda2-4.3.1-Linux-x86_64.sh https://repo.continuum.io/archive/Anaconda2-4.3.1-Linux-x86_64.sh
/// bash /home/anaconda2/Anaconda2-4.3.1-Linux-x86_64.sh -b -f -p /home/anaconda2/
pub fn install(runner: &dyn Runner, cfg: &AnacondaConfig, retry: &RetryConfig) -> Result<()> {
    let prefix = append_slash(&cfg.prefix);
    let installer = cfg.installer_path();
    files::ensure_dir(&prefix, cfg.mode)?;

    log::info!("downloading '{}' to '{}'", cfg.installer_url, installer);
    let cmd = Command::new("wget")
        .args(&[
            "--no-verbose",
            "--retry-connrefused",
            "--waitretry=1",
            "--read-timeout=20",
            "--timeout=15",
            "--tries=70",
            "-O",
            installer.as_str(),
            cfg.installer_url.as_str(),
        ])
        .retryable(true);
    run_with_retries(runner, &cmd, retry)?;

    // "-b" batch mode, "-f" no error if the prefix exists, "-p" prefix
    log::info!("installing anaconda into '{}'", prefix);
    let cmd = Command::new("bash").args(&[installer.as_str(), "-b", "-f", "-p", prefix.as_str()]);
    runner.run(&cmd)?;

    // the installer may reset the prefix permissions
    files::set_mode(&prefix, cfg.mode)?;
    log::info!("installed anaconda into '{}'", prefix);
    Ok(())
}
