use std::sync::OnceLock;

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

/// Parses decimal or `0x`-prefixed hex.
pub fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse::<u64>().ok(),
    }
}

// CPU trace / per-instruction logs (very noisy)
pub fn trace() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("DEBUG_TRACE", false))
}

pub fn quiet() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("QUIET", false))
}

// SBC overflow taken from bit 0 instead of the sign bit
pub fn sbc_literal_overflow() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("CPU_SBC_LITERAL_OVERFLOW", false))
}

// Cycle count for the headless runner when --cycles is not given
pub fn headless_cycles() -> Option<u64> {
    static V: OnceLock<Option<u64>> = OnceLock::new();
    *V.get_or_init(|| {
        std::env::var("HEADLESS_CYCLES")
            .ok()
            .and_then(|v| parse_number(&v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("118"), Some(118));
        assert_eq!(parse_number("0x76"), Some(118));
        assert_eq!(parse_number(" 0XFF "), Some(255));
        assert_eq!(parse_number("ten"), None);
        assert_eq!(parse_number(""), None);
    }
}
