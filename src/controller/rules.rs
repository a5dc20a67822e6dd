//! Rendering of store entries into rule-table argument vectors.
//!
//! The iptables and ip6tables dialects agree on everything the controller
//! needs; the family only decides which binary runs.

/// Flush every rule in the chain.
pub(crate) fn flush(chain: &str) -> Vec<String> {
    vec!["-F".to_string(), chain.to_string()]
}

/// Append a source-host jump rule.
pub(crate) fn append_host(chain: &str, host: &str, target: &str) -> Vec<String> {
    vec![
        "-A".to_string(),
        chain.to_string(),
        "-s".to_string(),
        host.to_string(),
        "-j".to_string(),
        target.to_string(),
    ]
}

/// Append an incoming-interface jump rule.
pub(crate) fn append_interface(chain: &str, iface: &str, target: &str) -> Vec<String> {
    vec![
        "-A".to_string(),
        chain.to_string(),
        "-i".to_string(),
        iface.to_string(),
        "-j".to_string(),
        target.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_args() {
        assert_eq!(flush("INPUT"), ["-F", "INPUT"]);
    }

    #[test]
    fn test_append_host_args() {
        assert_eq!(
            append_host("INPUT", "8.8.8.8", "DROP"),
            ["-A", "INPUT", "-s", "8.8.8.8", "-j", "DROP"]
        );
    }

    #[test]
    fn test_append_interface_args() {
        assert_eq!(
            append_interface("FORWARD", "eth2", "ACCEPT"),
            ["-A", "FORWARD", "-i", "eth2", "-j", "ACCEPT"]
        );
    }
}
