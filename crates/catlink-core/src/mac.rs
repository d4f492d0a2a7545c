//! MAC address normalisation

/// Normalise a MAC address to lowercase colon-separated form.
///
/// Accepts colon, dash or dot notation and bare hex strings of any even
/// length, so `AABBCCDDEE` and `AA:BB:CC:DD:EE` share one key. Anything
/// else is lowercased and trimmed so lookups stay case-insensitive.
pub fn format_mac(mac: &str) -> String {
    let mac = mac.trim();
    let hex: String = mac
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();

    let is_hex =
        !hex.is_empty() && hex.len() % 2 == 0 && hex.chars().all(|c| c.is_ascii_hexdigit());
    if !is_hex {
        return mac.to_lowercase();
    }

    let lower = hex.to_ascii_lowercase();
    let mut out = String::with_capacity(lower.len() * 3 / 2);
    for (i, c) in lower.chars().enumerate() {
        if i > 0 && i % 2 == 0 {
            out.push(':');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mac_notations() {
        assert_eq!(format_mac("AA:BB:CC:DD:EE:FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format_mac("AABB.CCDD.EEFF"), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format_mac("AABBCCDDEEFF"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_format_mac_five_octets() {
        assert_eq!(format_mac(" AABBCCDDEE "), "aa:bb:cc:dd:ee");
        assert_eq!(format_mac("AA:BB:CC:DD:EE"), "aa:bb:cc:dd:ee");
        assert_eq!(format_mac("aa-bb-cc-dd-ee"), "aa:bb:cc:dd:ee");
    }

    #[test]
    fn test_format_mac_other_values_are_lowercased() {
        assert_eq!(format_mac(""), "");
        assert_eq!(format_mac("ABC"), "abc");
        assert_eq!(format_mac(" Garage-Box "), "garage-box");
        assert_eq!(format_mac("ÉABC"), "éabc");
    }
}
