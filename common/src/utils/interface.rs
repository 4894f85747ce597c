use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::{IpNetwork, Ipv4Network};

/// Linux `IFF_RUNNING`; pnet exposes `is_up` but not the running bit.
pub const IFF_RUNNING: u32 = 1 << 6;

pub trait NetworkInterfaceExtension {
    fn get_ipv4_net(&self) -> Option<Ipv4Network>;
    fn is_up_and_running(&self) -> bool;
}

impl NetworkInterfaceExtension for NetworkInterface {
    fn get_ipv4_net(&self) -> Option<Ipv4Network> {
        self.ips.iter().find_map(|&ip| match ip {
            IpNetwork::V4(net) => Some(net),
            _ => None,
        })
    }

    fn is_up_and_running(&self) -> bool {
        self.is_up() && self.flags & IFF_RUNNING != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn iface(ips: Vec<IpNetwork>, flags: u32) -> NetworkInterface {
        NetworkInterface {
            name: "eth0".to_string(),
            description: String::new(),
            index: 0,
            mac: None,
            ips,
            flags,
        }
    }

    #[test]
    fn get_ipv4_net_picks_first_v4() {
        let ips = vec![
            IpNetwork::V6("fe80::1/64".parse().unwrap()),
            IpNetwork::V4("192.168.1.20/24".parse().unwrap()),
            IpNetwork::V4("10.0.0.2/8".parse().unwrap()),
        ];
        let net = iface(ips, 0).get_ipv4_net().unwrap();
        assert_eq!(net.ip(), Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(net.prefix(), 24);
    }

    #[test]
    fn is_up_and_running_needs_both_flags() {
        const IFF_UP: u32 = 1;
        assert!(iface(vec![], IFF_UP | IFF_RUNNING).is_up_and_running());
        assert!(!iface(vec![], IFF_UP).is_up_and_running());
        assert!(!iface(vec![], IFF_RUNNING).is_up_and_running());
    }
}
