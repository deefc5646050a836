use log::{info, warn};
use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    backends::SshTransport,
    context::{self, BuildContext},
    descriptor,
    errors::DeployError,
    lifecycle::LifecycleManager,
    models::{ContainerName, HostSpec},
    services::SessionTransport,
    transfer,
};

pub struct DeployOptions {
    pub show_logs: bool,
    pub verbose: bool,
    pub clean_on_failure: bool,
}

/// Output of the local stages: validated metadata plus the packaged build
/// context, ready to go over the wire.
pub struct Prepared {
    pub name: ContainerName,
    pub port_map: Option<String>,
    pub context: BuildContext,
}

/// Everything that happens before a session exists: read the build
/// description, validate its header, package the context. Any failure here
/// aborts the deployment without a single remote action.
pub fn prepare(descriptor_path: &Path) -> Result<Prepared, DeployError> {
    let content = fs::read_to_string(descriptor_path).map_err(|err| {
        DeployError::precondition(format!("cannot read build description: {}", err))
    })?;

    if content.trim().is_empty() {
        return Err(DeployError::precondition("build description is empty"));
    }

    let parsed = descriptor::parse(&content);

    // Presence before pattern, so a missing header reads as exactly that.
    let raw_name = parsed.container_name.as_deref().ok_or_else(|| {
        DeployError::precondition("missing Container-Name header in build description")
    })?;
    let name = ContainerName::parse(raw_name)?;

    let context = context::package(descriptor_path, &parsed.input_references)?;

    Ok(Prepared {
        name,
        port_map: parsed.port_map,
        context,
    })
}

/// Full deployment: local preparation, connect, remote pipeline. The session
/// is closed on every exit path, however far the pipeline got.
pub fn deploy(
    descriptor_path: &Path,
    host: &HostSpec,
    options: &DeployOptions,
    interrupted: &AtomicBool,
) -> Result<ContainerName, DeployError> {
    let prepared = prepare(descriptor_path)?;
    let name = prepared.name.clone();

    check_interrupt(interrupted)?;
    let mut transport = SshTransport::connect(host)
        .map_err(|err| DeployError::connection(&host.host, format!("{:#}", err)))?;
    println!("Connected to {}", host.host);

    run_connected(&mut transport, prepared, options, interrupted)?;

    Ok(name)
}

/// Runs the remote pipeline and disconnects afterwards, success or not.
pub fn run_connected(
    transport: &mut dyn SessionTransport,
    prepared: Prepared,
    options: &DeployOptions,
    interrupted: &AtomicBool,
) -> Result<(), DeployError> {
    let result = run_pipeline(transport, prepared, options, interrupted);

    if let Err(err) = transport.disconnect() {
        warn!("could not close session cleanly: {:#}", err);
    }

    result
}

/// Transfer then lifecycle, strictly sequential. A build or run failure
/// leaves the remote workspace behind for inspection unless the caller opted
/// into cleanup on failure.
fn run_pipeline(
    transport: &mut dyn SessionTransport,
    prepared: Prepared,
    options: &DeployOptions,
    interrupted: &AtomicBool,
) -> Result<(), DeployError> {
    let Prepared {
        name,
        port_map,
        context,
    } = prepared;

    check_interrupt(interrupted)?;
    let workspace = transfer::transfer(transport, &context)?;

    let mut lifecycle = LifecycleManager::new(transport, options.verbose);

    let mut stages = || -> Result<(), DeployError> {
        check_interrupt(interrupted)?;
        lifecycle.replace_existing(&name);

        check_interrupt(interrupted)?;
        lifecycle.build(&workspace, &name)?;

        check_interrupt(interrupted)?;
        lifecycle.run(&name, port_map.as_deref())
    };

    match stages() {
        Ok(()) => {
            if options.show_logs {
                lifecycle.tail_logs(&name);
            }
            lifecycle.remove_workspace(&workspace);
            context.close();
            Ok(())
        }
        Err(err) => {
            if options.clean_on_failure {
                lifecycle.remove_workspace(&workspace);
            } else {
                info!("leaving remote workspace {} for inspection", workspace);
            }
            Err(err)
        }
    }
}

fn check_interrupt(interrupted: &AtomicBool) -> Result<(), DeployError> {
    if interrupted.load(Ordering::SeqCst) {
        Err(DeployError::Interrupted)
    } else {
        Ok(())
    }
}
