//! Unit-test fixtures: fake extraction scripts and scratch cleanup polling.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shell body of a fake extraction binary.
///
/// Answers `--version`, otherwise writes a small payload to the path after `-o`.
pub(crate) const FAKE_EXTRACTOR_SCRIPT: &str = r#"if [ "$1" = "--version" ]; then
  echo 2025.06.30
  exit 0
fi
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    out="$2"
  fi
  shift
done
if [ -z "$out" ]; then
  echo "ERROR: no output path" >&2
  exit 2
fi
printf 'fake media payload\n' > "$out"
"#;

/// Writes an executable `#!/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "{}", body).unwrap();
    file.sync_all().unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Scratch removal runs on the blocking pool; waits up to a second for it.
pub(crate) async fn removed_eventually(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Entries left under `root` once pending scratch removals have settled.
pub(crate) async fn settled_entries(root: &Path) -> usize {
    let count = || std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0);
    for _ in 0..100 {
        if count() == 0 {
            return 0;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    count()
}
