use crate::core::HostInfo;
use std::net::Ipv4Addr;

/// Hostname and the IPv4 address of the first non-loopback interface.
/// Either field is empty when it cannot be determined.
pub fn host_info() -> HostInfo {
    HostInfo {
        hostname: hostname(),
        address: first_ipv4().map(|a| a.to_string()).unwrap_or_default(),
    }
}

#[cfg(unix)]
fn hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!("gethostname failed: {}", e);
            String::new()
        }
    }
}

#[cfg(unix)]
fn first_ipv4() -> Option<Ipv4Addr> {
    use nix::net::if_::InterfaceFlags;

    let addrs = match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::warn!("getifaddrs failed: {}", e);
            return None;
        }
    };

    addrs
        .filter(|ifa| !ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK))
        .find_map(|ifa| {
            let sin = ifa.address.as_ref()?.as_sockaddr_in()?;
            Some(Ipv4Addr::from(sin.ip()))
        })
}

#[cfg(not(unix))]
fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_default()
}

#[cfg(not(unix))]
fn first_ipv4() -> Option<Ipv4Addr> {
    None
}
