//! iolat entry point
//!
//! Wires the pieces together in order: parse and validate the command line,
//! prepare the target, construct the backend and reporter, install the
//! interrupt handler, and hand control to the scheduler. Exit codes follow
//! the error taxonomy: 1 for configuration errors, 2 for setup failures,
//! 3 for runtime I/O failures.

use clap::Parser;
use iolat::config::{Cli, Config};
use iolat::engine::{Dispatch, Engine};
use iolat::output;
use iolat::rng::Xorshift128Plus;
use iolat::scheduler::{install_interrupt_handler, CancelToken, Scheduler};
use iolat::target;
use iolat::RunError;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(err.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    let cfg = Config::from_cli(cli)?;

    let mut rng = match cfg.seed {
        Some(seed) => Xorshift128Plus::seeded(seed),
        None => Xorshift128Plus::from_clock(),
    };

    let handle = target::prepare(&cfg.target_options(), &mut rng)?;
    if !cfg.cached {
        handle.advise_random();
    }

    let mut engine = Engine::new(cfg.backend, cfg.flush_mode()).map_err(RunError::Setup)?;
    let mut reporter = output::make_reporter(&cfg, &handle);

    install_interrupt_handler();

    let mut scheduler = Scheduler::new(
        &cfg,
        &handle,
        &mut engine as &mut dyn Dispatch,
        reporter.as_mut(),
        rng,
        CancelToken::new(),
    );
    scheduler.run()
}
