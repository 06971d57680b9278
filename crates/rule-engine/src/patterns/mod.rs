//! 地址类阈值的模式解析
//!
//! IP 与邮箱阈值都允许多种书写形式，解析失败的阈值一律视为不匹配。

pub mod email;
pub mod ip;

pub use email::{EmailPattern, email_matches};
pub use ip::{IpPattern, ip_matches};
