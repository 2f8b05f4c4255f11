use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Runs a CLI to completion and returns its stdout.
///
/// The error string carries the command line and trimmed stderr; callers wrap
/// it in the error kind that fits (query vs. command). The child is killed if
/// `timeout` expires.
pub async fn run_cli(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<String, String> {
    let command_line = format!("{program} {}", shell_words::join(args));
    log::debug!("cli: {command_line}");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("{program} failed to start: {e}"))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output.map_err(|e| format!("`{command_line}`: {e}"))?,
        Err(_) => return Err(format!("`{command_line}` timed out after {timeout:?}")),
    };

    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr);
        let err = err.trim();
        log::warn!("cli: `{command_line}` exited with {}", output.status);
        return Err(if err.is_empty() {
            format!("`{command_line}` exited with {}", output.status)
        } else {
            format!("`{command_line}` failed: {err}")
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `--context=<ctx>` and `--kubeconfig=<file>` flags shared by kubectl and flux.
pub fn cluster_flags(context: Option<&str>, kubeconfig: Option<&std::path::Path>) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(file) = kubeconfig {
        flags.push(format!("--kubeconfig={}", file.display()));
    }
    if let Some(ctx) = context {
        flags.push(format!("--context={ctx}"));
    }
    flags
}

/// Writes an executable shell script standing in for a CLI.
#[cfg(all(test, unix))]
pub(crate) fn fake_cli(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
