#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

/// Write a small shell script posing as the control node helper.
///
/// The helper is launched with the device path as its only argument;
/// these scripts ignore it. Answers and diagnostics go to stderr,
/// like the real helper's do.
pub fn helper_script(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "serial-expect-helper-{name}-{}",
        std::process::id()
    ));

    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();

    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();

    path
}

/// A helper which answers every command by echoing it back.
pub fn echo_helper(name: &str) -> PathBuf {
    helper_script(name, r#"while read line; do echo "$line" 1>&2; done"#)
}
