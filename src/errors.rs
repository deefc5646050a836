use thiserror::Error;

/// Fatal deployment failures, one variant per pipeline stage.
///
/// `Build` and `Run` are kept separate so an operator can tell whether the
/// new image exists but failed to start. Cleanup and log-fetch problems are
/// never represented here; they are logged and swallowed where they happen.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Bad input caught before any remote connection is made.
    #[error("{message}")]
    Precondition { message: String },

    /// Could not establish or authenticate the SSH session.
    #[error("connection to {host} failed: {details}")]
    Connection { host: String, details: String },

    /// A local file or directory referenced by the build description could
    /// not be packaged.
    #[error("failed to package build context: {details}")]
    Packaging { details: String },

    /// Remote workspace creation, archive upload or extraction failed.
    #[error("failed to transfer build context: {details}")]
    Transfer { details: String },

    /// The remote image build returned a nonzero status.
    #[error("image build failed: {details}")]
    Build { details: String },

    /// The remote container start returned a nonzero status.
    #[error("container start failed: {details}")]
    Run { details: String },

    /// The user interrupted the deployment between stages.
    #[error("deployment interrupted")]
    Interrupted,
}

impl DeployError {
    pub fn precondition(message: impl Into<String>) -> DeployError {
        DeployError::Precondition {
            message: message.into(),
        }
    }

    pub fn connection(host: impl Into<String>, details: impl ToString) -> DeployError {
        DeployError::Connection {
            host: host.into(),
            details: details.to_string(),
        }
    }

    pub fn packaging(details: impl ToString) -> DeployError {
        DeployError::Packaging {
            details: details.to_string(),
        }
    }

    pub fn transfer(details: impl ToString) -> DeployError {
        DeployError::Transfer {
            details: details.to_string(),
        }
    }

    pub fn build(details: impl ToString) -> DeployError {
        DeployError::Build {
            details: details.to_string(),
        }
    }

    pub fn run(details: impl ToString) -> DeployError {
        DeployError::Run {
            details: details.to_string(),
        }
    }
}
