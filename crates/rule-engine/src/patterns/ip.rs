//! IP 地址模式
//!
//! 阈值按以下顺序解释，第一个合法的解释生效：
//! 1. 精确地址（`10.0.0.5`、`::1`）
//! 2. CIDR（`10.0.0.0/24`）
//! 3. 逐段通配（`192.168.1.*`，IPv6 需写满 8 段）

use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpPattern {
    Exact(IpAddr),
    Cidr { network: IpAddr, prefix: u8 },
    /// `None` 表示该段为 `*`
    Wildcard { v6: bool, segments: Vec<Option<u16>> },
}

impl IpPattern {
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(addr) = s.parse::<IpAddr>() {
            return Some(Self::Exact(addr.to_canonical()));
        }

        if let Some(cidr) = Self::parse_cidr(s) {
            return Some(cidr);
        }

        Self::parse_wildcard(s)
    }

    fn parse_cidr(s: &str) -> Option<Self> {
        let (addr, prefix) = s.split_once('/')?;
        let network: IpAddr = addr.trim().parse().ok()?;
        let prefix: u8 = prefix.trim().parse().ok()?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return None;
        }
        Some(Self::Cidr { network, prefix })
    }

    fn parse_wildcard(s: &str) -> Option<Self> {
        if !s.contains('*') {
            return None;
        }

        let v6 = s.contains(':');
        let (separator, expected, radix, max) = if v6 {
            (':', 8, 16, u16::MAX as u32)
        } else {
            ('.', 4, 10, u8::MAX as u32)
        };

        let segments = s
            .split(separator)
            .map(|seg| match seg {
                "*" => Some(None),
                _ if !Self::is_valid_segment(seg, v6) => None,
                _ => u32::from_str_radix(seg, radix)
                    .ok()
                    .filter(|n| *n <= max)
                    .map(|n| Some(n as u16)),
            })
            .collect::<Option<Vec<_>>>()?;

        if segments.len() != expected {
            return None;
        }

        Some(Self::Wildcard { v6, segments })
    }

    /// 段只允许纯数字；IPv4 多位段不能以 0 开头，与 `Ipv4Addr` 的解析规则一致
    fn is_valid_segment(seg: &str, v6: bool) -> bool {
        if v6 {
            (1..=4).contains(&seg.len()) && seg.bytes().all(|b| b.is_ascii_hexdigit())
        } else {
            (1..=3).contains(&seg.len())
                && seg.bytes().all(|b| b.is_ascii_digit())
                && !(seg.len() > 1 && seg.starts_with('0'))
        }
    }

    pub fn matches(&self, addr: &IpAddr) -> bool {
        let addr = addr.to_canonical();
        match self {
            Self::Exact(expected) => *expected == addr,
            Self::Cidr { network, prefix } => in_network(&addr, network, *prefix),
            Self::Wildcard { v6, segments } => {
                let actual: Vec<u16> = match (addr, *v6) {
                    (IpAddr::V4(v4), false) => v4.octets().iter().map(|o| *o as u16).collect(),
                    (IpAddr::V6(v6), true) => v6.segments().to_vec(),
                    _ => return false,
                };
                segments
                    .iter()
                    .zip(actual)
                    .all(|(pattern, value)| pattern.is_none_or(|p| p == value))
            }
        }
    }
}

fn in_network(addr: &IpAddr, network: &IpAddr, prefix: u8) -> bool {
    match (addr, network) {
        (IpAddr::V4(a), IpAddr::V4(n)) => {
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            (u32::from(*a) & mask) == (u32::from(*n) & mask)
        }
        (IpAddr::V6(a), IpAddr::V6(n)) => {
            let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) };
            (u128::from(*a) & mask) == (u128::from(*n) & mask)
        }
        _ => false,
    }
}

/// 判断实时地址是否命中阈值
///
/// 阈值或实时值无法解析时返回 `None`。
pub fn ip_matches(live: &str, threshold: &str) -> Option<bool> {
    let pattern = IpPattern::parse(threshold)?;
    let addr: IpAddr = live.trim().parse().ok()?;
    Some(pattern.matches(&addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact() {
        assert_eq!(ip_matches("10.0.0.5", "10.0.0.5"), Some(true));
        assert_eq!(ip_matches("10.0.0.6", "10.0.0.5"), Some(false));
        assert_eq!(ip_matches("::ffff:10.0.0.5", "10.0.0.5"), Some(true));
    }

    #[test]
    fn test_cidr() {
        assert_eq!(ip_matches("10.0.0.5", "10.0.0.0/24"), Some(true));
        assert_eq!(ip_matches("10.0.1.5", "10.0.0.0/24"), Some(false));
        assert_eq!(ip_matches("8.8.8.8", "0.0.0.0/0"), Some(true));
        assert_eq!(ip_matches("2001:db8::1", "2001:db8::/32"), Some(true));
        assert_eq!(ip_matches("2001:db9::1", "2001:db8::/32"), Some(false));
        assert_eq!(ip_matches("10.0.0.5", "2001:db8::/32"), Some(false));
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(ip_matches("10.0.0.200", "10.0.0.*"), Some(true));
        assert_eq!(ip_matches("10.0.1.5", "10.0.0.*"), Some(false));
        assert_eq!(ip_matches("10.9.0.5", "10.*.0.*"), Some(true));
        assert_eq!(
            ip_matches("2001:db8:0:0:0:0:0:1", "2001:db8:*:*:*:*:*:1"),
            Some(true)
        );
    }

    #[test]
    fn test_malformed() {
        assert_eq!(ip_matches("10.0.0.5", "not-an-ip"), None);
        assert_eq!(ip_matches("10.0.0.5", "10.0.0.0/33"), None);
        assert_eq!(ip_matches("10.0.0.5", "10.0.*"), None);
        assert_eq!(ip_matches("10.0.0.5", "10.0.0.256"), None);
        assert_eq!(ip_matches("10.0.0.5", ""), None);
        assert_eq!(ip_matches("garbage", "10.0.0.*"), None);
    }

    #[test]
    fn test_malformed_wildcard_segments() {
        assert_eq!(IpPattern::parse("10.0.+0.*"), None);
        assert_eq!(ip_matches("10.0.0.7", "10.0.+0.*"), None);
        assert_eq!(ip_matches("10.0.0.7", "10.0.00.*"), None);
        assert_eq!(ip_matches("10.0.0.7", "010.0.0.*"), None);
        assert_eq!(ip_matches("10.0.0.7", "10.0. 0.*"), None);
        assert_eq!(ip_matches("10.0.0.7", "10.0.-0.*"), None);
        assert_eq!(ip_matches("2001:db8::1", "2001:+db8:*:*:*:*:*:1"), None);
        assert_eq!(ip_matches("2001:db8::1", "2001:0db8g:*:*:*:*:*:1"), None);

        // 单个 0 与 IPv6 前导零仍然合法
        assert_eq!(ip_matches("10.0.0.7", "10.0.0.*"), Some(true));
        assert_eq!(
            ip_matches("2001:db8::1", "2001:0db8:*:*:*:*:*:0001"),
            Some(true)
        );
    }
}
