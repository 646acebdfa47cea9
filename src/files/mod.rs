//! Writers for the configuration files the notebook server and Spark read.
//!
//! Every renderer is a pure function returning the file contents so the
//! text can be previewed (see the "render" subcommand) without touching
//! system paths. Generated files are replaced atomically. Files owned by the
//! cluster image are only modified in place (same inode, mode and owner):
//! appends skip lines that are already present and properties replace the
//! value of an existing key, so repeated runs leave the files unchanged.

pub mod jupyter;
pub mod kernel;
pub mod spark;
pub mod systemd;

use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    os::unix::fs::PermissionsExt,
    path::Path,
};

use crate::errors::{io_err, Result};

/// Writes the contents to the file path, creating missing parent directories.
/// The file is written to a temporary sibling first and renamed into place.
pub fn write_file(file_path: &str, contents: &str) -> Result<()> {
    let fp = Path::new(file_path);
    let parent_dir = create_parent_dir(file_path)?;

    let file_name = fp
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = parent_dir.join(format!(".{}.{}", file_name, random_manager::secure_string(10)));
    let tmp = tmp_path.display().to_string();

    let mut f = File::create(&tmp_path).map_err(|e| io_err("File::create", &tmp, e))?;
    f.write_all(contents.as_bytes())
        .map_err(|e| io_err("write_all", &tmp, e))?;
    f.sync_all().map_err(|e| io_err("sync_all", &tmp, e))?;
    drop(f);

    if let Err(e) = fs::rename(&tmp_path, fp) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err("fs::rename", file_path, e));
    }

    log::info!("wrote '{}'", file_path);
    Ok(())
}

/// Appends the lines that the file does not already contain.
/// A missing file is created. Returns the number of lines appended.
/// The file is opened in append mode, so symlinks, mode and owner are kept.
pub fn append_lines(file_path: &str, lines: &[String]) -> Result<usize> {
    let contents = read_or_empty(file_path)?;

    let missing: Vec<&String> = lines
        .iter()
        .filter(|line| !contents.lines().any(|l| l.trim_end() == line.as_str()))
        .collect();
    if missing.is_empty() {
        log::warn!(
            "'{}' already contains all {} lines, skipping",
            file_path,
            lines.len()
        );
        return Ok(0);
    }

    log::info!("appending {} lines to '{}'", missing.len(), file_path);
    let mut d = String::new();
    if !contents.is_empty() && !contents.ends_with('\n') {
        d.push('\n');
    }
    for line in missing.iter() {
        d.push_str(line);
        d.push('\n');
    }

    create_parent_dir(file_path)?;
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)
        .map_err(|e| io_err("OpenOptions::open", file_path, e))?;
    f.write_all(d.as_bytes())
        .map_err(|e| io_err("write_all", file_path, e))?;
    f.sync_all().map_err(|e| io_err("sync_all", file_path, e))?;

    Ok(missing.len())
}

/// Sets "key=value" properties in a Java-style properties file such as
/// "spark-defaults.conf". An existing entry for the same key is replaced
/// where it stands and later duplicates of that key are dropped; keys not
/// in the file are appended. Comments and other keys are left untouched.
/// Returns the number of properties that changed.
///
/// The file is rewritten in place rather than renamed over, so symlinks,
/// mode and owner are kept.
pub fn set_properties(file_path: &str, props: &[String]) -> Result<usize> {
    let contents = read_or_empty(file_path)?;

    let mut seen = vec![false; props.len()];
    let mut changed = 0;
    let mut out: Vec<String> = Vec::new();
    for line in contents.lines() {
        let idx = property_key(line).and_then(|k| {
            props
                .iter()
                .position(|p| property_key(p) == Some(k))
        });
        let idx = match idx {
            Some(idx) => idx,
            None => {
                out.push(line.to_string());
                continue;
            }
        };

        if seen[idx] {
            log::info!("dropping duplicate '{}' from '{}'", line, file_path);
            changed += 1;
            continue;
        }
        seen[idx] = true;
        if line.trim_end() != props[idx] {
            log::info!("replacing '{}' with '{}' in '{}'", line, props[idx], file_path);
            changed += 1;
        }
        out.push(props[idx].clone());
    }
    for (idx, p) in props.iter().enumerate() {
        if !seen[idx] {
            out.push(p.clone());
            changed += 1;
        }
    }

    if changed == 0 {
        log::warn!(
            "'{}' already sets all {} properties, skipping",
            file_path,
            props.len()
        );
        return Ok(0);
    }

    log::info!("updating {} properties in '{}'", changed, file_path);
    let mut d = out.join("\n");
    d.push('\n');
    rewrite_in_place(file_path, &d)?;

    Ok(changed)
}

/// Returns the key of a "key=value" or "key value" property line.
/// Blank lines and comments have no key.
fn property_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        return None;
    }
    line.split(|c: char| c == '=' || c == ':' || c.is_whitespace())
        .next()
        .filter(|k| !k.is_empty())
}

/// Truncates and rewrites the existing file (following symlinks).
fn rewrite_in_place(file_path: &str, contents: &str) -> Result<()> {
    create_parent_dir(file_path)?;
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(file_path)
        .map_err(|e| io_err("OpenOptions::open", file_path, e))?;
    f.write_all(contents.as_bytes())
        .map_err(|e| io_err("write_all", file_path, e))?;
    f.sync_all().map_err(|e| io_err("sync_all", file_path, e))
}

fn read_or_empty(file_path: &str) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!("'{}' does not exist, creating", file_path);
            Ok(String::new())
        }
        Err(e) => Err(io_err("read_to_string", file_path, e)),
    }
}

/// Creates the parent directory of the file path if missing.
fn create_parent_dir(file_path: &str) -> Result<&Path> {
    let parent_dir = match Path::new(file_path).parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir).map_err(|e| io_err("create_dir_all", file_path, e))?;
    Ok(parent_dir)
}

/// Creates the directory if missing and sets its permission bits.
pub fn ensure_dir(dir_path: &str, mode: u32) -> Result<()> {
    fs::create_dir_all(dir_path).map_err(|e| io_err("create_dir_all", dir_path, e))?;
    set_mode(dir_path, mode)
}

/// Sets the permission bits, warning when the path becomes world-writable.
pub fn set_mode(path: &str, mode: u32) -> Result<()> {
    if mode & 0o002 != 0 {
        log::warn!(
            "setting world-writable mode {:o} on '{}'; any local user can modify it",
            mode,
            path
        );
    } else {
        log::info!("setting mode {:o} on '{}'", mode, path);
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| io_err("set_permissions", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_file_creates_parents() {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a").join("b").join("kernel.json");
        let p = p.to_str().unwrap();

        write_file(p, "{}\n").unwrap();
        assert_eq!(fs::read_to_string(p).unwrap(), "{}\n");

        write_file(p, "{\"x\":1}\n").unwrap();
        assert_eq!(fs::read_to_string(p).unwrap(), "{\"x\":1}\n");

        // no temporary files left behind
        let entries = fs::read_dir(dir.path().join("a").join("b")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_append_lines_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("spark-defaults.conf");
        fs::write(&p, "spark.master yarn").unwrap();
        let p = p.to_str().unwrap();

        let lines = vec!["a=1".to_string(), "b=2".to_string()];
        assert_eq!(append_lines(p, &lines).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(p).unwrap(),
            "spark.master yarn\na=1\nb=2\n"
        );

        assert_eq!(append_lines(p, &lines).unwrap(), 0);
        assert_eq!(
            fs::read_to_string(p).unwrap(),
            "spark.master yarn\na=1\nb=2\n"
        );

        let lines = vec!["b=2".to_string(), "c=3".to_string()];
        assert_eq!(append_lines(p, &lines).unwrap(), 1);
        assert_eq!(
            fs::read_to_string(p).unwrap(),
            "spark.master yarn\na=1\nb=2\nc=3\n"
        );
    }

    #[test]
    fn test_append_lines_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("conf").join("spark-env.sh");
        let p = p.to_str().unwrap();

        assert_eq!(append_lines(p, &["X=1".to_string()]).unwrap(), 1);
        assert_eq!(fs::read_to_string(p).unwrap(), "X=1\n");
    }

    #[test]
    fn test_append_lines_keeps_symlink_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real-spark-env.sh");
        fs::write(&real, "#!/usr/bin/env bash\n").unwrap();
        fs::set_permissions(&real, fs::Permissions::from_mode(0o755)).unwrap();
        let link = dir.path().join("spark-env.sh");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert_eq!(
            append_lines(link.to_str().unwrap(), &["X=1".to_string()]).unwrap(),
            1
        );

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(
            fs::read_to_string(&real).unwrap(),
            "#!/usr/bin/env bash\nX=1\n"
        );
        let mode = fs::metadata(&real).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o755);
    }

    #[test]
    fn test_set_properties_replaces_keys() {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("spark-defaults.conf");
        fs::write(&p, "# defaults\nspark.master yarn\nspark.files=/old.jar\nspark.files=/older.jar").unwrap();
        let p = p.to_str().unwrap();

        let props = vec!["spark.files=/new.jar".to_string(), "b=2".to_string()];
        assert_eq!(set_properties(p, &props).unwrap(), 3);
        assert_eq!(
            fs::read_to_string(p).unwrap(),
            "# defaults\nspark.master yarn\nspark.files=/new.jar\nb=2\n"
        );

        assert_eq!(set_properties(p, &props).unwrap(), 0);

        let props = vec!["spark.files=/newer.jar".to_string(), "b=2".to_string()];
        assert_eq!(set_properties(p, &props).unwrap(), 1);
        let d = fs::read_to_string(p).unwrap();
        assert_eq!(d.matches("spark.files=").count(), 1);
        assert!(d.contains("spark.files=/newer.jar\n"));
    }

    #[test]
    fn test_set_properties_keeps_symlink_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real-spark-defaults.conf");
        fs::write(&real, "spark.master yarn\n").unwrap();
        fs::set_permissions(&real, fs::Permissions::from_mode(0o640)).unwrap();
        let link = dir.path().join("spark-defaults.conf");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        set_properties(link.to_str().unwrap(), &["a=1".to_string()]).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "spark.master yarn\na=1\n");
        let mode = fs::metadata(&real).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o640);
    }

    #[test]
    fn test_property_key() {
        assert_eq!(property_key("spark.master yarn"), Some("spark.master"));
        assert_eq!(property_key("  spark.files=/a.jar"), Some("spark.files"));
        assert_eq!(property_key("# spark.files=/a.jar"), None);
        assert_eq!(property_key(""), None);
    }

    #[test]
    fn test_ensure_dir_mode() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("hail");
        let p = p.to_str().unwrap();

        ensure_dir(p, 0o750).unwrap();
        ensure_dir(p, 0o750).unwrap();
        let mode = fs::metadata(p).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o750);
    }
}
