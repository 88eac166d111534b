//! Host services the tracer depends on: name resolution and keeping the
//! device awake.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tracing::debug;

pub trait HostResolver {
    fn resolve(&self, host: &str) -> io::Result<Ipv4Addr>;
}

impl<R: HostResolver + ?Sized> HostResolver for &R {
    fn resolve(&self, host: &str) -> io::Result<Ipv4Addr> {
        (**self).resolve(host)
    }
}

impl<R: HostResolver + ?Sized> HostResolver for Arc<R> {
    fn resolve(&self, host: &str) -> io::Result<Ipv4Addr> {
        (**self).resolve(host)
    }
}

/// Resolves through the system resolver and keeps the first IPv4 answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Ipv4Addr> {
        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            return Ok(addr);
        }

        (host, 0)
            .to_socket_addrs()?
            .find_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no IPv4 address for {host}"))
            })
    }
}

/// Keeps the device from sleeping while a trace runs.
pub trait KeepAwake {
    fn acquire(&self);
    fn release(&self);
}

impl<K: KeepAwake + ?Sized> KeepAwake for &K {
    fn acquire(&self) {
        (**self).acquire()
    }

    fn release(&self) {
        (**self).release()
    }
}

impl<K: KeepAwake + ?Sized> KeepAwake for Arc<K> {
    fn acquire(&self) {
        (**self).acquire()
    }

    fn release(&self) {
        (**self).release()
    }
}

/// For hosts with nothing to hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeepAwake;

impl KeepAwake for NoKeepAwake {
    fn acquire(&self) {
        debug!("keep-awake acquired");
    }

    fn release(&self) {
        debug!("keep-awake released");
    }
}

/// Holds a `KeepAwake` for its lifetime.
pub(crate) struct KeepAwakeGuard<'a, K: KeepAwake> {
    keep_awake: &'a K,
}

impl<'a, K: KeepAwake> KeepAwakeGuard<'a, K> {
    pub(crate) fn acquire(keep_awake: &'a K) -> Self {
        keep_awake.acquire();
        Self { keep_awake }
    }
}

impl<K: KeepAwake> Drop for KeepAwakeGuard<'_, K> {
    fn drop(&mut self) {
        self.keep_awake.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn literal_addresses_skip_lookup() {
        assert_eq!(
            SystemResolver.resolve("192.0.2.7").unwrap(),
            Ipv4Addr::new(192, 0, 2, 7)
        );
    }

    #[test]
    fn localhost_resolves_to_ipv4() {
        assert!(SystemResolver.resolve("localhost").unwrap().is_loopback());
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<&'static str>>);

    impl KeepAwake for Recorder {
        fn acquire(&self) {
            self.0.borrow_mut().push("acquire");
        }

        fn release(&self) {
            self.0.borrow_mut().push("release");
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let recorder = Recorder::default();
        {
            let _guard = KeepAwakeGuard::acquire(&recorder);
            assert_eq!(*recorder.0.borrow(), vec!["acquire"]);
        }
        assert_eq!(*recorder.0.borrow(), vec!["acquire", "release"]);
    }
}
