//! 邮箱地址模式
//!
//! 阈值解释优先级：完整地址 > `@domain` > 裸域名 > `.tld`。
//! 域名部分比较不区分大小写，本地部分区分大小写。

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailPattern {
    /// 完整地址，精确匹配
    Address { local: String, domain: String },
    /// 域名及其所有子域
    Domain(String),
    /// 顶级域名后缀，支持 `.co.uk` 这类复合后缀
    Tld(String),
}

impl EmailPattern {
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return None;
        }

        if !s.starts_with('@') && s.contains('@') {
            let (local, domain) = split_address(s)?;
            return Some(Self::Address {
                local: local.to_string(),
                domain,
            });
        }

        if let Some(domain) = s.strip_prefix('@') {
            return valid_domain(domain).then(|| Self::Domain(domain.to_ascii_lowercase()));
        }

        if !s.starts_with('.') {
            return valid_domain(s).then(|| Self::Domain(s.to_ascii_lowercase()));
        }

        let tld = &s[1..];
        valid_domain(tld).then(|| Self::Tld(tld.to_ascii_lowercase()))
    }

    pub fn matches(&self, local: &str, domain: &str) -> bool {
        match self {
            Self::Address {
                local: expected_local,
                domain: expected_domain,
            } => expected_local == local && expected_domain == domain,
            Self::Domain(expected) => {
                domain == expected
                    || domain
                        .strip_suffix(expected.as_str())
                        .is_some_and(|head| head.ends_with('.'))
            }
            Self::Tld(tld) => domain
                .strip_suffix(tld.as_str())
                .is_some_and(|head| head.len() > 1 && head.ends_with('.')),
        }
    }
}

/// 拆分地址为 (本地部分, 小写域名)
fn split_address(s: &str) -> Option<(&str, String)> {
    let (local, domain) = s.split_once('@')?;
    if local.is_empty() || domain.contains('@') || !valid_domain(domain) {
        return None;
    }
    Some((local, domain.to_ascii_lowercase()))
}

fn valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        })
}

/// 判断实时邮箱是否命中阈值
///
/// 阈值或实时值无法解析时返回 `None`。
pub fn email_matches(live: &str, threshold: &str) -> Option<bool> {
    let pattern = EmailPattern::parse(threshold)?;
    let (local, domain) = split_address(live.trim())?;
    Some(pattern.matches(local, &domain))
}
