// kiln-core/src/build/patch.rs
use std::io::Write;
use std::path::Path;

use kiln_common::error::{KilnError, Result};
use kiln_common::model::PatchSpec;
use tracing::{debug, error};

use super::env::BuildEnvironment;
use super::tool::{BuildTool, Invocation};

/// Applies an inline unified diff with `patch -p<strip>` in `source_root`.
///
/// A rejected hunk is drift in the upstream sources, reported against the
/// first file the diff touches.
pub fn apply_patch(
    tool: &dyn BuildTool,
    source_root: &Path,
    patch: &PatchSpec,
    env: &BuildEnvironment,
) -> Result<()> {
    let mut diff_file = tempfile::Builder::new()
        .prefix(".kiln-patch-")
        .suffix(".diff")
        .tempfile_in(source_root)?;
    diff_file.write_all(patch.diff.as_bytes())?;
    diff_file.flush()?;

    let target = patched_file(&patch.diff).unwrap_or("<inline patch>");
    debug!("Applying patch to {} (-p{})", target, patch.strip);
    let invocation = Invocation {
        program: "patch".to_string(),
        args: vec![
            format!("-p{}", patch.strip),
            "-i".to_string(),
            diff_file.path().to_string_lossy().into_owned(),
        ],
        cwd: source_root.to_path_buf(),
        env: env.vars().clone(),
    };
    let output = tool.invoke(&invocation)?;
    if output.success() {
        return Ok(());
    }
    error!(
        "patch failed for {} ({}): {}",
        target,
        output.status_string(),
        output.stdout.trim()
    );
    Err(KilnError::ConfigurationDrift {
        file: target.to_string(),
        pattern: first_hunk(&patch.diff).unwrap_or_default().to_string(),
    })
}

/// The `+++` target of the first file in a diff, minus its `b/` prefix.
fn patched_file(diff: &str) -> Option<&str> {
    diff.lines()
        .find_map(|line| line.strip_prefix("+++ "))
        .map(|path| path.split('\t').next().unwrap_or(path).trim())
        .map(|path| path.strip_prefix("b/").unwrap_or(path))
}

fn first_hunk(diff: &str) -> Option<&str> {
    diff.lines().find(|line| line.starts_with("@@"))
}
