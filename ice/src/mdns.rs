// MulticastDnsMode controls whether host candidate addresses are
// concealed behind generated .local hostnames (draft-ietf-mmusic-mdns-
// ice-candidates). Resolution of peer .local names is delegated to the
// embedder's resolver.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum MulticastDnsMode {
    Disabled,
    // Conceal host candidate IPs behind a generated hostname.
    QueryAndGather,
}

impl Default for MulticastDnsMode {
    fn default() -> Self {
        MulticastDnsMode::Disabled
    }
}

// generate_multicast_dns_name returns a fresh UUID-shaped .local name.
pub fn generate_multicast_dns_name() -> String {
    let mut rng = rand::Rng::gen::<[u8; 16]>(&mut rand::thread_rng());
    // RFC 4122 version and variant bits.
    rng[6] = (rng[6] & 0x0F) | 0x40;
    rng[8] = (rng[8] & 0x3F) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}.local",
        rng[0], rng[1], rng[2], rng[3], rng[4], rng[5], rng[6], rng[7],
        rng[8], rng[9], rng[10], rng[11], rng[12], rng[13], rng[14], rng[15],
    )
}

#[cfg(test)]
mod mdns_test {
    use super::*;

    #[test]
    fn test_generated_name_shape() {
        let name = generate_multicast_dns_name();
        assert!(name.ends_with(".local"));
        assert_eq!(name.len(), "00000000-0000-0000-0000-000000000000.local".len());
        assert_ne!(generate_multicast_dns_name(), name);
    }
}
