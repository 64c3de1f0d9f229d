//! Capability handling.
//!
//! Start-up narrows the process to [`RETAINED`] before confinement and gives up
//! everything once the root is confined and the listener is bound. Linux
//! capabilities are per thread, so both calls must happen on the main thread
//! before the runtime spawns its workers; threads created later inherit the
//! reduced sets.

use caps::errors::CapsError;
use caps::{CapSet, Capability, CapsHashSet};
use thiserror::Error;
use tracing::{debug, info};

/// Capabilities needed until the listener is bound.
pub const RETAINED: [Capability; 2] = [
    Capability::CAP_SYS_CHROOT,
    Capability::CAP_NET_BIND_SERVICE,
];

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("cannot read {set:?} capability set")]
    Read {
        set: CapSet,
        #[source]
        source: CapsError,
    },

    #[error("cannot update {set:?} capability set")]
    Update {
        set: CapSet,
        #[source]
        source: CapsError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Privilege {
    /// No permitted capabilities to give up.
    Unprivileged,
    /// Holding only these, a subset of [`RETAINED`].
    Restricted(CapsHashSet),
}

/// The members of [`RETAINED`] present in `permitted`.
pub fn retained_from(permitted: &CapsHashSet) -> CapsHashSet {
    RETAINED
        .iter()
        .copied()
        .filter(|cap| permitted.contains(cap))
        .collect()
}

/// Drops every capability of the calling thread except [`RETAINED`].
///
/// An unprivileged process is left alone. Bounding-set trimming needs
/// `CAP_SETPCAP` and is skipped without it.
pub fn restrict() -> Result<Privilege, PrivilegeError> {
    let permitted = read(CapSet::Permitted)?;
    if permitted.is_empty() {
        info!("running without capabilities");
        return Ok(Privilege::Unprivileged);
    }

    let keep = retained_from(&permitted);

    if read(CapSet::Effective)?.contains(&Capability::CAP_SETPCAP) {
        let mut unsupported = 0;
        for cap in caps::all().difference(&keep) {
            // kernels reject capabilities they do not know
            if caps::drop(None, CapSet::Bounding, *cap).is_err() {
                unsupported += 1;
            }
        }
        debug!(unsupported, "bounding set trimmed");
    }

    if let Err(e) = caps::clear(None, CapSet::Ambient) {
        debug!(error = %e, "ambient set not cleared");
    }

    update(CapSet::Inheritable, &CapsHashSet::new())?;
    update(CapSet::Effective, &keep)?;
    update(CapSet::Permitted, &keep)?;

    info!(retained = ?keep, "capabilities restricted");
    Ok(Privilege::Restricted(keep))
}

/// Gives up the remaining capabilities once they are no longer needed.
pub fn shed(state: &Privilege) -> Result<(), PrivilegeError> {
    if *state == Privilege::Unprivileged {
        return Ok(());
    }

    update(CapSet::Effective, &CapsHashSet::new())?;
    update(CapSet::Permitted, &CapsHashSet::new())?;

    info!("all capabilities dropped");
    Ok(())
}

fn read(set: CapSet) -> Result<CapsHashSet, PrivilegeError> {
    caps::read(None, set).map_err(|source| PrivilegeError::Read { set, source })
}

fn update(set: CapSet, value: &CapsHashSet) -> Result<(), PrivilegeError> {
    caps::set(None, set, value).map_err(|source| PrivilegeError::Update { set, source })
}
