// kiln-core/src/build/inreplace.rs
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use kiln_common::error::{KilnError, Result};
use tracing::debug;

/// Replaces every occurrence of `pattern` in `source_root/file`.
///
/// Returns the number of replacements. A missing file or a pattern that
/// does not occur means upstream changed under the recipe: that is
/// [`KilnError::ConfigurationDrift`] and the file is left untouched.
pub fn inreplace(source_root: &Path, file: &str, pattern: &str, replacement: &str) -> Result<usize> {
    let drift = || KilnError::ConfigurationDrift {
        file: file.to_string(),
        pattern: pattern.to_string(),
    };
    if pattern.is_empty() {
        return Err(drift());
    }
    let path = source_root.join(file);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("inreplace target {} does not exist", path.display());
            return Err(drift());
        }
        Err(e) => return Err(e.into()),
    };

    let count = contents.matches(pattern).count();
    if count == 0 {
        return Err(drift());
    }
    fs::write(&path, contents.replace(pattern, replacement))?;
    debug!(
        "inreplace {}: {} occurrence(s) of {:?}",
        path.display(),
        count,
        pattern
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETUPEXT: &str = "basedir = {\n    'darwin' : ['/usr/local/', '/usr', '/usr/X11', '/opt/local'],\n}\n";

    #[test]
    fn replaces_every_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("setup.cfg"), "a x a x a\n").unwrap();
        assert_eq!(inreplace(dir.path(), "setup.cfg", "a", "b").unwrap(), 3);
        assert_eq!(
            fs::read_to_string(dir.path().join("setup.cfg")).unwrap(),
            "b x b x b\n"
        );
    }

    #[test]
    fn literal_python_edit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("setupext.py"), SETUPEXT).unwrap();
        inreplace(
            dir.path(),
            "setupext.py",
            "'darwin' : ['/usr/local/', '/usr', '/usr/X11', '/opt/local'],",
            "'darwin' : ['/opt/kiln', '/usr', '/usr/X11', '/opt/local'],",
        )
        .unwrap();
        let patched = fs::read_to_string(dir.path().join("setupext.py")).unwrap();
        assert!(patched.contains("['/opt/kiln', '/usr'"));
    }

    #[test]
    fn missing_pattern_is_drift_and_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("setupext.py"), SETUPEXT).unwrap();
        let err = inreplace(dir.path(), "setupext.py", "'/System/Library/Frameworks/',", "x")
            .unwrap_err();
        assert!(matches!(err, KilnError::ConfigurationDrift { ref file, .. } if file == "setupext.py"));
        assert_eq!(
            fs::read_to_string(dir.path().join("setupext.py")).unwrap(),
            SETUPEXT
        );
    }

    #[test]
    fn missing_file_is_drift() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            inreplace(dir.path(), "nope.py", "x", "y"),
            Err(KilnError::ConfigurationDrift { .. })
        ));
    }
}
