mod ssh;

pub use self::ssh::SshTransport;
