//! Smart HTTP services and pkt-line framing

use std::fmt;

/// Service types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    UploadPack,
    ReceivePack,
}

impl Service {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "git-upload-pack" => Some(Service::UploadPack),
            "git-receive-pack" => Some(Service::ReceivePack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::UploadPack => "git-upload-pack",
            Service::ReceivePack => "git-receive-pack",
        }
    }

    /// `git` subcommand implementing the service
    pub fn subcommand(&self) -> &'static str {
        match self {
            Service::UploadPack => "upload-pack",
            Service::ReceivePack => "receive-pack",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Service::UploadPack => "application/x-git-upload-pack-advertisement",
            Service::ReceivePack => "application/x-git-receive-pack-advertisement",
        }
    }

    pub fn result_content_type(&self) -> &'static str {
        match self {
            Service::UploadPack => "application/x-git-upload-pack-result",
            Service::ReceivePack => "application/x-git-receive-pack-result",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const FLUSH_PKT: &[u8] = b"0000";

/// Frames `data` as one pkt-line: four hex digits of total length, then data.
pub fn pkt_line(data: &str) -> Vec<u8> {
    let mut line = format!("{:04x}", data.len() + 4).into_bytes();
    line.extend_from_slice(data.as_bytes());
    line
}

/// Preamble the HTTP transport puts in front of a ref advertisement
pub fn advertisement_preamble(service: Service) -> Vec<u8> {
    let mut preamble = pkt_line(&format!("# service={service}\n"));
    preamble.extend_from_slice(FLUSH_PKT);
    preamble
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_names() {
        assert_eq!(Service::from_name("git-upload-pack"), Some(Service::UploadPack));
        assert_eq!(Service::from_name("git-receive-pack"), Some(Service::ReceivePack));
        assert_eq!(Service::from_name("upload-pack"), None);
        assert_eq!(Service::from_name(""), None);
        assert_eq!(Service::ReceivePack.subcommand(), "receive-pack");
    }

    #[test]
    fn test_pkt_line() {
        assert_eq!(pkt_line("a\n"), b"0006a\n");
        assert_eq!(pkt_line(""), b"0004");
    }

    #[test]
    fn test_advertisement_preamble() {
        assert_eq!(
            advertisement_preamble(Service::UploadPack),
            b"001e# service=git-upload-pack\n0000".to_vec()
        );
    }
}
