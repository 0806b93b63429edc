use anyhow::{Context, Result};
use clap::CommandFactory as _;

mod client;
mod opts;
mod util;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("mconnectctl"), log_level_filter)
            .filter(Some("mconnect_client"), log_level_filter)
            .init();
    }

    if let opts::Action::ShellCompletions { shell } = opts.action {
        clap_complete::generate(shell, &mut opts::RawOpt::command(), "mconnectctl", &mut std::io::stdout());
        return;
    }

    if let Err(err) = run(opts) {
        print_error(&err);
        std::process::exit(exit_code(&err));
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to initialize tokio runtime")?;
    rt.block_on(client::run(opts))
}

fn daemon_error(err: &anyhow::Error) -> Option<&mconnect_client::Error> {
    err.chain().find_map(|cause| cause.downcast_ref::<mconnect_client::Error>())
}

fn print_error(err: &anyhow::Error) {
    log::error!("{:?}", err);
    if daemon_error(err).is_some_and(mconnect_client::Error::is_daemon_unavailable) {
        eprintln!("Is the mconnect daemon running? It can be started with `mconnect -d`.");
    }
}

/// 2 when the daemon could not be reached, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    match daemon_error(err) {
        Some(e) if e.is_daemon_unavailable() => 2,
        _ => 1,
    }
}
