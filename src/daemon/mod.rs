//! The argo-lite daemon: target registry, per-target supervisors, bootstrap.

mod registry;
mod run;
mod standalone;
mod supervisor;

pub use registry::{ManagedTarget, Registry, RegistryError};
pub use run::run_serve;
pub use standalone::run_standalone;

use crossbeam::channel::{self, Receiver};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

/// One-shot channel that fires on SIGINT/SIGTERM.
pub(crate) fn shutdown_channel() -> std::io::Result<Receiver<()>> {
    let (tx, rx) = channel::bounded(1);
    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    std::thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if signals.forever().next().is_some() {
                let _ = tx.send(());
            }
        })?;
    Ok(rx)
}
