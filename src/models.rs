use regex::Regex;
use std::{fmt, sync::LazyLock};
use uuid::Uuid;

use crate::errors::DeployError;

static CONTAINER_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]+$").ok());

static HOST_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?P<user>[a-zA-Z0-9_.-]+)@(?P<host>[a-zA-Z0-9_.-]+):(?P<port>\d+)$").ok()
});

/// Validated container name. Construction is the only place the name pattern
/// is checked, so anything holding a `ContainerName` is safe to interpolate
/// into a remote command.
#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn parse(raw: &str) -> Result<ContainerName, DeployError> {
        let matches = CONTAINER_NAME_RE
            .as_ref()
            .map(|re| re.is_match(raw))
            .unwrap_or(false);

        if matches {
            Ok(ContainerName(raw.to_string()))
        } else {
            Err(DeployError::precondition(format!(
                "invalid container name {:?}: must be alphanumeric with dashes only",
                raw
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed form of the `user@host:port` CLI argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostSpec {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl HostSpec {
    pub fn parse(raw: &str) -> Result<HostSpec, DeployError> {
        let captures = HOST_RE
            .as_ref()
            .and_then(|re| re.captures(raw))
            .ok_or_else(|| DeployError::precondition("invalid host format, use user@host:port"))?;

        let port = captures["port"]
            .parse::<u16>()
            .map_err(|_| DeployError::precondition("invalid host port"))?;

        Ok(HostSpec {
            user: captures["user"].to_string(),
            host: captures["host"].to_string(),
            port,
        })
    }
}

/// Parsed metadata header and input references of a build description.
///
/// `container_name` is the raw header value; validation happens at the
/// orchestrator before any remote action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildDescriptor {
    pub container_name: Option<String>,
    pub port_map: Option<String>,
    pub input_references: Vec<String>,
}

/// Random identifier naming a remote scratch directory. Decoupled from the
/// container name so concurrent or retried deployments never collide on the
/// same workspace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteWorkspace {
    token: String,
}

impl RemoteWorkspace {
    pub fn generate() -> RemoteWorkspace {
        RemoteWorkspace {
            token: Uuid::new_v4().to_string(),
        }
    }

    pub fn path(&self) -> String {
        format!("/tmp/build_context_{}", self.token)
    }
}

impl fmt::Display for RemoteWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path())
    }
}
