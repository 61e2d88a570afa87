//! Capability adapters over external clients
//!
//! Each adapter is a narrow async trait mirroring the calls the core
//! actually makes. Production implementations are thin pass-throughs to the
//! `kind`, `k3d`, and `helm` binaries or to the Kubernetes API; tests
//! substitute fakes through the traits.

pub mod helm;
pub mod k3d;
pub mod kind;
pub mod kube;

use anyhow::{bail, Context, Result};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Run an external tool, returning stdout on success. With `stdin` set, the
/// bytes are piped into the child before waiting.
pub(crate) async fn run_tool(bin: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<String> {
    which::which(bin).with_context(|| format!("'{bin}' not found in PATH"))?;

    let mut command = Command::new(bin);
    command.args(args);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    if stdin.is_some() {
        command.stdin(Stdio::piped());
    }

    tracing::debug!(bin = %bin, args = ?args, "running external tool");

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn '{bin}'"))?;

    if let Some(input) = stdin {
        let mut handle = child
            .stdin
            .take()
            .with_context(|| format!("failed to open stdin of '{bin}'"))?;
        handle
            .write_all(input)
            .await
            .with_context(|| format!("failed to write to stdin of '{bin}'"))?;
        drop(handle);
    }

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("failed to wait for '{bin}'"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{bin} {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
