//! Output packaging: `worker.js` and a single-entry `worker.zip`.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::BuildConfig;
use crate::BuildError;

/// Prepended to the module so editors skip type-checking it.
pub const TS_NOCHECK: &str = "// @ts-nocheck\n";

/// Files written by a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub module_path: PathBuf,
    pub archive_path: PathBuf,
    /// Size of the written module, prefix included.
    pub bytes: usize,
}

/// Write the module and its archive into the output directory.
///
/// Both files go to `.tmp` siblings first and are renamed into place only
/// after both writes succeed.
pub async fn package(code: &str, config: &BuildConfig) -> Result<BuildArtifact, BuildError> {
    let module = format!("{TS_NOCHECK}{code}");
    let archive = zip_module(&config.archive_entry_name, module.as_bytes())?;

    fs::create_dir_all(&config.out_dir)
        .await
        .map_err(|e| package_error(&config.out_dir, e))?;

    let module_path = config.module_path();
    let archive_path = config.archive_path();
    let module_tmp = tmp_path(&module_path);
    let archive_tmp = tmp_path(&archive_path);

    let written = async {
        write(&module_tmp, module.as_bytes()).await?;
        write(&archive_tmp, &archive).await?;
        rename(&module_tmp, &module_path).await?;
        rename(&archive_tmp, &archive_path).await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&module_tmp).await;
        let _ = fs::remove_file(&archive_tmp).await;
        return Err(err);
    }

    debug!(
        module = %module_path.display(),
        archive = %archive_path.display(),
        bytes = module.len(),
        "artifacts written"
    );
    Ok(BuildArtifact {
        module_path,
        archive_path,
        bytes: module.len(),
    })
}

/// A DEFLATE archive holding `contents` under `entry_name`.
pub fn zip_module(entry_name: &str, contents: &[u8]) -> Result<Vec<u8>, BuildError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(entry_name, options)
        .map_err(|e| BuildError::PackageError(format!("zip entry {entry_name}: {e}")))?;
    writer
        .write_all(contents)
        .map_err(|e| BuildError::PackageError(format!("zip entry {entry_name}: {e}")))?;
    let cursor = writer
        .finish()
        .map_err(|e| BuildError::PackageError(format!("zip finish: {e}")))?;
    Ok(cursor.into_inner())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    fs::write(path, contents)
        .await
        .map_err(|e| package_error(path, e))
}

async fn rename(from: &Path, to: &Path) -> Result<(), BuildError> {
    fs::rename(from, to).await.map_err(|e| package_error(to, e))
}

fn package_error(path: &Path, err: std::io::Error) -> BuildError {
    BuildError::PackageError(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildMode;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    fn config(root: &Path) -> BuildConfig {
        BuildConfig::new(root, BuildMode::Development)
    }

    #[tokio::test]
    async fn writes_module_and_archive() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let artifact = package("export default {};", &config).await.unwrap();
        assert_eq!(artifact.module_path, dir.path().join("dist/worker.js"));
        assert_eq!(artifact.archive_path, dir.path().join("dist/worker.zip"));

        let module = std::fs::read_to_string(&artifact.module_path).unwrap();
        assert_eq!(module, "// @ts-nocheck\nexport default {};");
        assert_eq!(artifact.bytes, module.len());

        let file = std::fs::File::open(&artifact.archive_path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_name("_worker.js").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut unzipped = String::new();
        entry.read_to_string(&mut unzipped).unwrap();
        assert_eq!(unzipped, module);
    }

    #[tokio::test]
    async fn leaves_no_tmp_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        package("1", &config).await.unwrap();

        let mut names: Vec<_> = std::fs::read_dir(&config.out_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["worker.js", "worker.zip"]);
    }

    #[tokio::test]
    async fn overwrites_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        package("old", &config).await.unwrap();
        package("new", &config).await.unwrap();
        let module = std::fs::read_to_string(config.module_path()).unwrap();
        assert_eq!(module, "// @ts-nocheck\nnew");
    }

    #[tokio::test]
    async fn unwritable_out_dir_is_a_package_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        config.out_dir = blocker.join("dist");

        let err = package("x", &config).await.unwrap_err();
        assert!(matches!(err, BuildError::PackageError(_)), "{err:?}");
    }

    #[test]
    fn tmp_path_is_a_sibling() {
        assert_eq!(
            tmp_path(Path::new("/out/worker.zip")),
            PathBuf::from("/out/worker.zip.tmp")
        );
    }
}
