use anyhow::Result;
use std::path::Path;

/// Captured result of one remote command round-trip.
#[derive(Clone, Debug)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Seam to the remote session. The orchestrator owns exactly one transport
/// per deployment and drives every remote interaction through it, one
/// synchronous round-trip at a time.
pub trait SessionTransport {
    /// Runs a command on the remote host and captures stdout, stderr and the
    /// exit status. An `Err` means the transport itself failed, not that the
    /// command exited nonzero.
    fn exec(&mut self, command: &str) -> Result<ExecOutput>;

    /// Streams a local file's bytes to a remote path.
    fn write_file(&mut self, local: &Path, remote: &str) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;

    /// Transport double that records every command and upload, answering from
    /// a list of substring-matched canned responses. Unmatched commands
    /// succeed with empty output.
    pub struct ScriptedTransport {
        pub commands: Vec<String>,
        pub uploads: Vec<(PathBuf, String)>,
        pub disconnected: bool,
        responses: Vec<(String, ExecOutput)>,
        fail_exec_on: Option<String>,
    }

    impl ScriptedTransport {
        pub fn new() -> ScriptedTransport {
            ScriptedTransport {
                commands: Vec::new(),
                uploads: Vec::new(),
                disconnected: false,
                responses: Vec::new(),
                fail_exec_on: None,
            }
        }

        /// Answers any command containing `pattern` with the given output.
        /// First matching rule wins.
        pub fn respond(mut self, pattern: &str, output: ExecOutput) -> ScriptedTransport {
            self.responses.push((pattern.to_string(), output));
            self
        }

        /// Makes the transport itself fail (as opposed to the command exiting
        /// nonzero) for commands containing `pattern`.
        pub fn fail_exec_on(mut self, pattern: &str) -> ScriptedTransport {
            self.fail_exec_on = Some(pattern.to_string());
            self
        }

        pub fn ran(&self, pattern: &str) -> bool {
            self.commands.iter().any(|c| c.contains(pattern))
        }
    }

    impl SessionTransport for ScriptedTransport {
        fn exec(&mut self, command: &str) -> Result<ExecOutput> {
            self.commands.push(command.to_string());

            if let Some(pattern) = &self.fail_exec_on {
                if command.contains(pattern.as_str()) {
                    return Err(anyhow!("connection reset by peer"));
                }
            }

            let response = self
                .responses
                .iter()
                .find(|(pattern, _)| command.contains(pattern.as_str()))
                .map(|(_, output)| output.clone());

            Ok(response.unwrap_or(ExecOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_status: 0,
            }))
        }

        fn write_file(&mut self, local: &Path, remote: &str) -> Result<()> {
            self.uploads.push((local.to_path_buf(), remote.to_string()));
            Ok(())
        }

        fn disconnect(&mut self) -> Result<()> {
            self.disconnected = true;
            Ok(())
        }
    }

    pub fn output(stdout: &str, stderr: &str, exit_status: i32) -> ExecOutput {
        ExecOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_status,
        }
    }
}
