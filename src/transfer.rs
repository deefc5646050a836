use log::info;

use crate::{
    command,
    context::{BuildContext, ARCHIVE_FILE_NAME},
    errors::DeployError,
    models::RemoteWorkspace,
    services::SessionTransport,
};

/// Creates a fresh remote workspace, streams the archive into it and unpacks
/// it. The archive travels as one opaque unit; there are no partial-resume
/// semantics. Removing the workspace afterwards is the lifecycle manager's
/// job.
pub fn transfer(
    transport: &mut dyn SessionTransport,
    context: &BuildContext,
) -> Result<RemoteWorkspace, DeployError> {
    let workspace = RemoteWorkspace::generate();
    info!("remote workspace {}", workspace);

    run_remote(transport, &command::make_workspace(&workspace))?;

    let remote_archive = format!("{}/{}", workspace.path(), ARCHIVE_FILE_NAME);
    crate::status("Uploading build context");
    if let Err(err) = transport.write_file(context.archive_path(), &remote_archive) {
        crate::status_failed();
        return Err(DeployError::transfer(format!("{:#}", err)));
    }
    crate::status_done();
    info!("uploaded build context to {}", remote_archive);

    run_remote(transport, &command::extract_archive(&workspace))?;

    Ok(workspace)
}

fn run_remote(transport: &mut dyn SessionTransport, cmd: &str) -> Result<(), DeployError> {
    let output = transport
        .exec(cmd)
        .map_err(|err| DeployError::transfer(format!("{:#}", err)))?;

    if output.success() {
        Ok(())
    } else {
        Err(DeployError::transfer(format!(
            "{:?} exited with status {}: {}",
            cmd,
            output.exit_status,
            output.stderr.trim()
        )))
    }
}
