use flate2::{write::GzEncoder, Compression};
use ignore::WalkBuilder;
use log::info;
use number_prefix::NumberPrefix;
use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};
use tar::Builder as TarBuilder;
use tempfile::TempDir;

use crate::errors::DeployError;

/// Fixed archive filename, local and remote.
pub const ARCHIVE_FILE_NAME: &str = "build_context.tar.gz";

/// Gzipped tar archive holding the build description and every local input
/// reference. Lives in its own temp directory so concurrent invocations
/// never collide; dropping the context removes the local archive.
pub struct BuildContext {
    temp_dir: TempDir,
    archive_path: PathBuf,
}

impl BuildContext {
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Deletes the local archive. Drop would get there too, but the success
    /// path removes it eagerly and logs any problem.
    pub fn close(self) {
        if let Err(err) = self.temp_dir.close() {
            log::warn!("could not remove local build context: {}", err);
        }
    }
}

/// Packages the build description and its input references into a gzipped
/// tarball. Entry names mirror the literal directive tokens so remote
/// unpacking reproduces the layout the build expects. A missing referenced
/// path is a hard failure; no partial archive is handed onward.
pub fn package(descriptor_path: &Path, references: &[String]) -> Result<BuildContext, DeployError> {
    let temp_dir = TempDir::new().map_err(DeployError::packaging)?;
    let archive_path = temp_dir.path().join(ARCHIVE_FILE_NAME);

    let archive_file = {
        let mut options = OpenOptions::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options
            .write(true)
            .create(true)
            .open(&archive_path)
            .map_err(DeployError::packaging)?
    };

    let encoder = GzEncoder::new(archive_file, Compression::default());
    let mut tar = TarBuilder::new(encoder);

    let descriptor_dir = descriptor_path.parent().ok_or_else(|| {
        DeployError::packaging("build description path has no parent directory")
    })?;
    let descriptor_name = descriptor_path
        .file_name()
        .ok_or_else(|| DeployError::packaging("build description path has no file name"))?;

    tar.append_path_with_name(descriptor_path, descriptor_name)
        .map_err(DeployError::packaging)?;
    let mut context_size = file_size(descriptor_path)?;

    for token in references {
        let source_path = descriptor_dir.join(token);

        if !source_path.exists() {
            return Err(DeployError::packaging(format!(
                "referenced path does not exist: {}",
                token
            )));
        }

        if source_path.is_dir() {
            context_size += append_directory(&mut tar, token, &source_path)?;
        } else {
            tar.append_path_with_name(&source_path, token)
                .map_err(DeployError::packaging)?;
            context_size += file_size(&source_path)?;
        }
    }

    let encoder = tar.into_inner().map_err(DeployError::packaging)?;
    encoder.finish().map_err(DeployError::packaging)?;

    match NumberPrefix::binary(context_size as f32) {
        NumberPrefix::Standalone(bytes) => println!("Archived build context ({} bytes)", bytes),
        NumberPrefix::Prefixed(prefix, n) => {
            println!("Archived build context ({:.1} {}B)", n, prefix)
        }
    };
    info!("created build context archive at {:?}", archive_path);

    Ok(BuildContext {
        temp_dir,
        archive_path,
    })
}

/// Adds a referenced directory recursively, honoring `.dockerignore` but not
/// any git ignore files. Entry names stay relative to the token.
fn append_directory<W: std::io::Write>(
    tar: &mut TarBuilder<W>,
    token: &str,
    source_path: &Path,
) -> Result<u64, DeployError> {
    let walk = WalkBuilder::new(source_path)
        .add_custom_ignore_filename(".dockerignore")
        .ignore(false)
        .git_global(false)
        .git_ignore(false)
        .git_exclude(false)
        .hidden(false)
        .build();

    let mut size = 0;
    for result in walk {
        let entry = result.map_err(DeployError::packaging)?;

        let relative = entry
            .path()
            .strip_prefix(source_path)
            .map_err(DeployError::packaging)?;
        let entry_name = Path::new(token).join(relative);

        if entry.path().is_dir() {
            continue;
        }

        tar.append_path_with_name(entry.path(), &entry_name)
            .map_err(DeployError::packaging)?;
        size += file_size(entry.path())?;
    }

    Ok(size)
}

fn file_size(path: &Path) -> Result<u64, DeployError> {
    let metadata = path.metadata().map_err(DeployError::packaging)?;
    Ok(metadata.len())
}
