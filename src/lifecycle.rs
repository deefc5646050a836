use log::{info, warn};

use crate::{
    command,
    errors::DeployError,
    models::{ContainerName, RemoteWorkspace},
    services::{ExecOutput, SessionTransport},
};

/// Observed state of the named container on the remote runtime. Never
/// cached; every transition re-queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainerState {
    Absent,
    Running,
    Stopped,
}

/// Drives one named container through replacement: stop and remove whatever
/// is there, build the new image from the unpacked workspace, start the new
/// instance, then clean up remote scratch space.
///
/// There is no atomic swap on the runtime, so replacement is
/// stop-then-remove-then-rebuild-then-run with a visible downtime window.
pub struct LifecycleManager<'a> {
    transport: &'a mut dyn SessionTransport,
    verbose: bool,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(transport: &'a mut dyn SessionTransport, verbose: bool) -> LifecycleManager<'a> {
        LifecycleManager { transport, verbose }
    }

    /// Queries the runtime for the container, stopped instances included.
    /// A transport hiccup here is advisory; the container is treated as
    /// absent and a later build or run fails loudly if that was wrong.
    pub fn observe(&mut self, name: &ContainerName) -> ContainerState {
        let present = match self.transport.exec(&command::list_container(name)) {
            Ok(output) => !output.stdout.trim().is_empty(),
            Err(err) => {
                warn!("could not list containers: {}", err);
                false
            }
        };

        if !present {
            return ContainerState::Absent;
        }

        match self.transport.exec(&command::list_running_container(name)) {
            Ok(output) if !output.stdout.trim().is_empty() => ContainerState::Running,
            Ok(_) => ContainerState::Stopped,
            Err(err) => {
                warn!("could not query container status: {}", err);
                ContainerState::Stopped
            }
        }
    }

    /// Stops and removes any prior instance. Failures are reported but not
    /// escalated; if removal did not stick, the subsequent run attempt fails
    /// on the name collision, which is the chosen failure policy.
    pub fn replace_existing(&mut self, name: &ContainerName) {
        match self.observe(name) {
            ContainerState::Absent => {
                info!("no existing container named {}", name);
            }
            state @ ContainerState::Running | state @ ContainerState::Stopped => {
                info!("replacing existing container {} ({:?})", name, state);
                crate::status(&format!(
                    "Stopping and removing existing container {}",
                    name
                ));

                // The runtime tolerates stopping a stopped container.
                self.advisory(&command::stop_container(name));
                self.advisory(&command::remove_container(name));
                crate::status_done();
            }
        }
    }

    /// Builds the image from the workspace, tag = container name. Nonzero
    /// status is fatal; no partial image is ever started. Build output is
    /// echoed only in verbose mode.
    pub fn build(
        &mut self,
        workspace: &RemoteWorkspace,
        name: &ContainerName,
    ) -> Result<(), DeployError> {
        crate::status(&format!("Building image {}", name));
        let output = match self.transport.exec(&command::build_image(workspace, name)) {
            Ok(output) => output,
            Err(err) => {
                crate::status_failed();
                return Err(DeployError::build(format!("{:#}", err)));
            }
        };

        if output.success() {
            crate::status_done();
            if self.verbose {
                echo(&output);
            }
            info!("built image {}", name);
            Ok(())
        } else {
            crate::status_failed();
            if self.verbose {
                echo(&output);
            }
            Err(DeployError::build(format!(
                "exited with status {}: {}",
                output.exit_status,
                output.stderr.trim()
            )))
        }
    }

    /// Starts the freshly built image detached, publishing the descriptor's
    /// port map if one was declared.
    pub fn run(
        &mut self,
        name: &ContainerName,
        port_map: Option<&str>,
    ) -> Result<(), DeployError> {
        crate::status(&format!("Starting container {}", name));
        let output = match self.transport.exec(&command::run_container(name, port_map)) {
            Ok(output) => output,
            Err(err) => {
                crate::status_failed();
                return Err(DeployError::run(format!("{:#}", err)));
            }
        };

        if output.success() {
            crate::status_done();
            info!("container {} is running", name);
            Ok(())
        } else {
            crate::status_failed();
            Err(DeployError::run(format!(
                "exited with status {}: {}",
                output.exit_status,
                output.stderr.trim()
            )))
        }
    }

    /// Echoes the last 20 log lines of the new container. The deployment has
    /// already succeeded by now, so failures only warn.
    pub fn tail_logs(&mut self, name: &ContainerName) {
        match self.transport.exec(&command::tail_logs(name)) {
            Ok(output) if output.success() => {
                println!("Logs for {}:", name);
                echo(&output);
            }
            Ok(output) => warn!(
                "could not fetch logs for {}: {}",
                name,
                output.stderr.trim()
            ),
            Err(err) => warn!("could not fetch logs for {}: {}", name, err),
        }
    }

    /// Removes the remote workspace. Never escalated; success of the
    /// deployment was decided by `run`.
    pub fn remove_workspace(&mut self, workspace: &RemoteWorkspace) {
        info!("removing remote workspace {}", workspace);
        self.advisory(&command::remove_workspace(workspace));
    }

    fn advisory(&mut self, cmd: &str) {
        match self.transport.exec(cmd) {
            Ok(output) if output.success() => (),
            Ok(output) => warn!(
                "{:?} exited with status {}: {}",
                cmd,
                output.exit_status,
                output.stderr.trim()
            ),
            Err(err) => warn!("{:?} failed: {}", cmd, err),
        }
    }
}

fn echo(output: &ExecOutput) {
    for line in output.stdout.lines() {
        println!("> {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{output, ScriptedTransport};

    fn name() -> ContainerName {
        ContainerName::parse("demo-app").unwrap()
    }

    #[test]
    fn absent_container_skips_stop_and_remove() {
        let mut transport = ScriptedTransport::new();
        LifecycleManager::new(&mut transport, false).replace_existing(&name());

        assert!(transport.ran("docker ps -a -q"));
        assert!(!transport.ran("docker stop"));
        assert!(!transport.ran("docker rm"));
    }

    #[test]
    fn running_container_is_stopped_then_removed() {
        let mut transport =
            ScriptedTransport::new().respond("docker ps", output("abc123\n", "", 0));
        LifecycleManager::new(&mut transport, false).replace_existing(&name());

        assert!(transport.ran("docker stop demo-app"));
        assert!(transport.ran("docker rm demo-app"));
    }

    #[test]
    fn stopped_container_is_still_stopped_then_removed() {
        // Stop is idempotent on the runtime, so the stopped state takes the
        // same stop-then-remove path.
        let mut transport = ScriptedTransport::new()
            .respond("docker ps -a -q", output("abc123\n", "", 0))
            .respond("docker ps -q", output("", "", 0));
        let mut manager = LifecycleManager::new(&mut transport, false);

        assert_eq!(manager.observe(&name()), ContainerState::Stopped);
        manager.replace_existing(&name());

        assert!(transport.ran("docker stop demo-app"));
        assert!(transport.ran("docker rm demo-app"));
    }

    #[test]
    fn observe_distinguishes_running_from_stopped() {
        let mut transport =
            ScriptedTransport::new().respond("docker ps", output("abc123\n", "", 0));
        let state = LifecycleManager::new(&mut transport, false).observe(&name());
        assert_eq!(state, ContainerState::Running);
    }

    #[test]
    fn stop_failure_is_advisory() {
        let mut transport = ScriptedTransport::new()
            .respond("docker stop", output("", "cannot stop", 1))
            .respond("docker ps", output("abc123\n", "", 0));
        LifecycleManager::new(&mut transport, false).replace_existing(&name());

        // Removal is still attempted after a failed stop.
        assert!(transport.ran("docker rm demo-app"));
    }

    #[test]
    fn nonzero_build_is_fatal_with_stderr() {
        let mut transport = ScriptedTransport::new()
            .respond("docker build", output("", "no such instruction", 1));
        let workspace = RemoteWorkspace::generate();

        let result = LifecycleManager::new(&mut transport, false).build(&workspace, &name());

        match result {
            Err(DeployError::Build { details }) => {
                assert!(details.contains("no such instruction"));
            }
            other => panic!("expected build error, got {:?}", other),
        }
    }

    #[test]
    fn nonzero_run_is_a_run_error() {
        let mut transport = ScriptedTransport::new()
            .respond("docker run", output("", "port already allocated", 1));

        let result = LifecycleManager::new(&mut transport, false).run(&name(), Some("8080:80"));

        assert!(matches!(result, Err(DeployError::Run { .. })));
    }

    #[test]
    fn log_fetch_failure_does_not_escalate() {
        let mut transport =
            ScriptedTransport::new().respond("docker logs", output("", "no such container", 1));
        // Returns (), nothing to assert beyond not panicking and the command
        // having been issued.
        LifecycleManager::new(&mut transport, false).tail_logs(&name());
        assert!(transport.ran("docker logs --tail 20 demo-app"));
    }

    #[test]
    fn workspace_removal_issues_rm_rf() {
        let workspace = RemoteWorkspace::generate();
        let mut transport = ScriptedTransport::new();
        LifecycleManager::new(&mut transport, false).remove_workspace(&workspace);

        assert_eq!(
            transport.commands,
            vec![format!("rm -rf {}", workspace.path())]
        );
    }
}
