//! Network address resolution: finds the device's non-loopback IPv4 address.
//!
//! The address is whatever the first matching interface reports, in the order the host network
//! stack enumerates them. That order is not specified and not stable across environments, so
//! "first match wins" only picks *an* externally usable address, not a canonical one.

use core::net::{IpAddr, Ipv4Addr};

use thiserror::Error as ThisError;
use tracing::debug;

/// Why no address was resolved.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ResolveError {
    /// Enumeration worked, but no interface carries a non-loopback IPv4 address.
    #[error("No non-loopback IPv4 address found on any interface")]
    NotFound,
    /// The interface enumeration itself failed.
    #[cfg(unix)]
    #[error("Failed to enumerate network interfaces")]
    Enumeration(#[source] nix::Error),
    #[cfg(not(unix))]
    #[error("Network interface enumeration is not supported on this platform")]
    Unsupported,
}

/// Source of the device address, swappable for tests.
pub trait AddressResolver: Send + Sync {
    /// Resolves the device address. Called afresh on every synchronization pass.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`].
    fn resolve(&self) -> Result<Ipv4Addr, ResolveError>;
}

/// Resolves against the live network interfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceResolver;

impl AddressResolver for InterfaceResolver {
    fn resolve(&self) -> Result<Ipv4Addr, ResolveError> {
        resolve()
    }
}

/// Picks the first non-loopback IPv4 address out of `addrs`.
pub fn first_non_loopback_ipv4<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        IpAddr::V4(_) | IpAddr::V6(_) => None,
    })
}

/// Enumerates all interfaces and returns the first non-loopback IPv4 address.
///
/// # Errors
///
/// Returns [`ResolveError::NotFound`] when no candidate exists and a distinct variant when the
/// enumeration itself failed.
#[cfg(unix)]
pub fn resolve() -> Result<Ipv4Addr, ResolveError> {
    let interfaces = nix::ifaddrs::getifaddrs().map_err(ResolveError::Enumeration)?;
    let candidates = interfaces.filter_map(|ifaddr| {
        let v4 = ifaddr.address.as_ref()?.as_sockaddr_in()?.ip();
        debug!(interface = %ifaddr.interface_name, address = %v4, "Found IPv4 address");
        Some(IpAddr::V4(v4))
    });
    first_non_loopback_ipv4(candidates).ok_or(ResolveError::NotFound)
}

/// # Errors
///
/// Always returns [`ResolveError::Unsupported`].
#[cfg(not(unix))]
pub fn resolve() -> Result<Ipv4Addr, ResolveError> {
    Err(ResolveError::Unsupported)
}
