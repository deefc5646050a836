use crossterm::{
    style::{self, Colorize, StyledContent, Styler},
    QueueableCommand,
};
use std::{
    io::{stdout, Write},
    path::PathBuf,
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use structopt::StructOpt;

use deploy::DeployOptions;
use models::HostSpec;

mod backends;
mod command;
mod context;
mod deploy;
mod descriptor;
mod errors;
mod lifecycle;
mod models;
mod services;
mod transfer;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "stevedore",
    about = "Deploys a containerized application to a remote host over SSH."
)]
struct Opt {
    #[structopt(short = "f", long = "file")]
    /// Path to the build description (a Dockerfile with a metadata header).
    file: PathBuf,

    #[structopt(short = "H", long = "host")]
    /// Remote host in the form user@host:port.
    host: String,

    #[structopt(short = "l", long = "logs")]
    /// Show the last log lines of the container after deployment.
    logs: bool,

    #[structopt(short = "v", long = "verbose")]
    /// Echo the full remote build output.
    verbose: bool,

    #[structopt(long = "clean-on-failure")]
    /// Remove the remote workspace even when the build or run step fails.
    clean_on_failure: bool,
}

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let opt = Opt::from_args();

    let host = match HostSpec::parse(&opt.host) {
        Ok(host) => host,
        Err(err) => fail(&err.to_string()),
    };

    let file = match opt.file.canonicalize() {
        Ok(file) => file,
        Err(err) => fail(&format!("cannot open {:?}: {}", opt.file, err)),
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        }) {
            log::warn!("could not install interrupt handler: {}", err);
        }
    }

    let options = DeployOptions {
        show_logs: opt.logs,
        verbose: opt.verbose,
        clean_on_failure: opt.clean_on_failure,
    };

    match deploy::deploy(&file, &host, &options, &interrupted) {
        Ok(name) => {
            println!(
                "{} container {} is now running on {}",
                "Deployed:".green().bold(),
                name,
                host.host
            );
        }
        Err(err) => fail(&err.to_string()),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{} {}", "ERROR:".red().bold(), message);
    process::exit(1);
}

/// Stage-progress lines come in a "Doing thing ...  done" pair; the pipeline
/// stages open one with `status` and settle it with `status_done` or
/// `status_failed`. Console write failures are ignored.
pub(crate) fn status(message: &str) {
    let _ = queue_status(&mut stdout(), message);
}

pub(crate) fn status_done() {
    let _ = queue_verdict(&mut stdout(), "done".green().bold());
}

pub(crate) fn status_failed() {
    let _ = queue_verdict(&mut stdout(), "failed".red().bold());
}

fn queue_status(stdout: &mut impl Write, message: &str) -> crossterm::Result<()> {
    stdout
        .queue(style::Print(message))?
        .queue(style::Print(" ... "))?
        .flush()?;
    Ok(())
}

fn queue_verdict(
    stdout: &mut impl Write,
    verdict: StyledContent<&'static str>,
) -> crossterm::Result<()> {
    stdout
        .queue(style::PrintStyledContent(verdict))?
        .queue(style::Print("\n"))?
        .flush()?;
    Ok(())
}
