use anyhow::{anyhow, Context, Result};
use log::info;
use ssh2::Session;
use std::{
    env,
    fs::File,
    io::Read,
    net::TcpStream,
    path::{Path, PathBuf},
};

use crate::{models::HostSpec, services::{ExecOutput, SessionTransport}};

/// SSH transport backed by libssh2. One TCP connection per deployment;
/// every command runs on its own channel over the same session.
pub struct SshTransport {
    session: Session,
    host: String,
}

impl SshTransport {
    /// Connects and authenticates, preferring the ssh-agent and falling back
    /// to the default key files in `~/.ssh`.
    pub fn connect(spec: &HostSpec) -> Result<SshTransport> {
        let address = format!("{}:{}", spec.host, spec.port);
        let tcp = TcpStream::connect(&address)
            .with_context(|| format!("could not reach {}", address))?;

        let mut session = Session::new().context("could not create SSH session")?;
        session.set_tcp_stream(tcp);
        session.handshake().context("SSH handshake failed")?;

        authenticate(&session, &spec.user)?;
        if !session.authenticated() {
            return Err(anyhow!("SSH authentication failed for {}", spec.user));
        }

        info!("connected to {}", address);
        Ok(SshTransport {
            session,
            host: spec.host.clone(),
        })
    }
}

fn authenticate(session: &Session, user: &str) -> Result<()> {
    if session.userauth_agent(user).is_ok() {
        return Ok(());
    }

    for key in default_key_files() {
        if session.userauth_pubkey_file(user, None, &key, None).is_ok() {
            return Ok(());
        }
    }

    Err(anyhow!(
        "no usable SSH credential: agent refused and no default key worked"
    ))
}

fn default_key_files() -> Vec<PathBuf> {
    let home = match env::var_os("HOME") {
        Some(home) => PathBuf::from(home),
        None => return Vec::new(),
    };

    ["id_ed25519", "id_rsa"]
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .filter(|path| path.exists())
        .collect()
}

impl SessionTransport for SshTransport {
    fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        let mut channel = self
            .session
            .channel_session()
            .context("could not open SSH channel")?;

        channel
            .exec(command)
            .with_context(|| format!("could not execute {:?}", command))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .context("could not read command output")?;

        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .context("could not read command error stream")?;

        channel.wait_close().context("could not close SSH channel")?;
        let exit_status = channel.exit_status().context("could not get exit status")?;

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_status,
        })
    }

    fn write_file(&mut self, local: &Path, remote: &str) -> Result<()> {
        let metadata = local
            .metadata()
            .with_context(|| format!("could not stat {:?}", local))?;
        let mut local_file =
            File::open(local).with_context(|| format!("could not open {:?}", local))?;

        let mut remote_file = self
            .session
            .scp_send(Path::new(remote), 0o644, metadata.len(), None)
            .with_context(|| format!("could not start upload to {:?}", remote))?;

        std::io::copy(&mut local_file, &mut remote_file).context("upload interrupted")?;

        remote_file.send_eof().context("could not finish upload")?;
        remote_file.wait_eof().context("could not finish upload")?;
        remote_file.close().context("could not close remote file")?;
        remote_file
            .wait_close()
            .context("could not close remote file")?;

        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.session
            .disconnect(None, "deployment finished", None)
            .with_context(|| format!("disconnect from {} failed", self.host))?;
        info!("disconnected from {}", self.host);
        Ok(())
    }
}
