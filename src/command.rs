//! Remote command composition.
//!
//! Every command string sent over the session is built here, and only from
//! validated identifiers: `ContainerName` enforces its pattern at
//! construction and `RemoteWorkspace` paths are generated uuids. Raw caller
//! strings never reach a command, so relaxing validation elsewhere cannot
//! turn into command injection. The one passthrough value, the port map, is
//! inserted verbatim into the publish argument as documented.

use crate::context::ARCHIVE_FILE_NAME;
use crate::models::{ContainerName, RemoteWorkspace};

pub fn make_workspace(workspace: &RemoteWorkspace) -> String {
    format!("mkdir -p {}", workspace.path())
}

pub fn extract_archive(workspace: &RemoteWorkspace) -> String {
    format!(
        "cd {} && tar -xzf {}",
        workspace.path(),
        ARCHIVE_FILE_NAME
    )
}

/// Lists containers (stopped ones included) with exactly this name.
pub fn list_container(name: &ContainerName) -> String {
    format!("docker ps -a -q --filter name=^{}$", name)
}

/// Lists only running containers with exactly this name.
pub fn list_running_container(name: &ContainerName) -> String {
    format!("docker ps -q --filter name=^{}$", name)
}

pub fn stop_container(name: &ContainerName) -> String {
    format!("docker stop {}", name)
}

pub fn remove_container(name: &ContainerName) -> String {
    format!("docker rm {}", name)
}

/// The image tag is the container name; the build is scoped to the unpacked
/// workspace.
pub fn build_image(workspace: &RemoteWorkspace, name: &ContainerName) -> String {
    format!("cd {} && docker build -t {} .", workspace.path(), name)
}

/// Detached run, container name doubling as the image tag. The port map is
/// the descriptor's opaque `Port-Map` value.
pub fn run_container(name: &ContainerName, port_map: Option<&str>) -> String {
    let publish = match port_map {
        Some(port_map) => format!("-p {} ", port_map),
        None => String::new(),
    };
    format!("docker run -d {}--name {} {}", publish, name, name)
}

pub fn tail_logs(name: &ContainerName) -> String {
    format!("docker logs --tail 20 {}", name)
}

pub fn remove_workspace(workspace: &RemoteWorkspace) -> String {
    format!("rm -rf {}", workspace.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerName, RemoteWorkspace};

    fn name() -> ContainerName {
        ContainerName::parse("demo-app").unwrap()
    }

    #[test]
    fn run_includes_publish_argument_when_port_map_is_present() {
        let command = run_container(&name(), Some("8080:80"));
        assert_eq!(command, "docker run -d -p 8080:80 --name demo-app demo-app");
    }

    #[test]
    fn run_omits_publish_argument_without_port_map() {
        let command = run_container(&name(), None);
        assert_eq!(command, "docker run -d --name demo-app demo-app");
    }

    #[test]
    fn list_filters_on_the_exact_name() {
        assert_eq!(
            list_container(&name()),
            "docker ps -a -q --filter name=^demo-app$"
        );
        assert_eq!(
            list_running_container(&name()),
            "docker ps -q --filter name=^demo-app$"
        );
    }

    #[test]
    fn build_is_scoped_to_the_workspace() {
        let workspace = RemoteWorkspace::generate();
        let command = build_image(&workspace, &name());
        assert!(command.starts_with(&format!("cd {} && ", workspace.path())));
        assert!(command.ends_with("docker build -t demo-app ."));
    }

    #[test]
    fn extraction_targets_the_uploaded_archive() {
        let workspace = RemoteWorkspace::generate();
        let command = extract_archive(&workspace);
        assert_eq!(
            command,
            format!(
                "cd {} && tar -xzf build_context.tar.gz",
                workspace.path()
            )
        );
    }
}
