use std::ffi::OsString;
use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wlpower::{HidapiBackend, Session, WIRELESS_RECEIVER};

const USAGE: &str = "Usage:\nwlpower [--info] [--help] [--power]";

#[derive(Parser, Debug, Default, PartialEq)]
#[command(
    name = "wlpower",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true,
    infer_long_args = true
)]
struct Args {
    /// Dump the HID report descriptor
    #[arg(short, long)]
    info: bool,

    /// Print only the battery percentage
    #[arg(long)]
    power: bool,

    #[arg(short, long)]
    help: bool,

    // non-option arguments are accepted and ignored
    #[arg(hide = true)]
    rest: Vec<OsString>,
}

/// Returns `None` when the usage banner should be shown instead, which is
/// also what happens for anything clap doesn't recognize.
fn parse_args<I, T>(args: I) -> Option<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(args) {
        Ok(args) if !args.help => Some(args),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!("{}", err);
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let Some(args) = parse_args(std::env::args_os()) else {
        println!("{}", USAGE);
        return Ok(());
    };
    if !args.rest.is_empty() {
        tracing::debug!("Ignoring arguments {:?}", args.rest);
    }

    let mut session = Session::new(HidapiBackend::new()?);
    session.open(WIRELESS_RECEIVER)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.info {
        let descriptor = session.report_descriptor()?;
        wlpower::write_descriptor(&mut out, &descriptor)?;
    } else {
        let status = session.poll_status()?;
        wlpower::write_status(&mut out, &status, args.power)?;
    }
    out.flush()?;

    Ok(())
}
