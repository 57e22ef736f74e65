//! Regex fragments shared by the matchers.
//!
//! JVMs print decimals with the platform locale, so both `.` and `,` are
//! accepted as decimal separator.

/// A decimal number.
pub(crate) const NUM: &str = r"\d+(?:[.,]\d+)?";

/// Optional `<ts>: ` prefix captured as `ts`.
pub(crate) fn timestamp_prefix() -> String {
    format!(r"^(?:(?P<ts>{}):\s*)?", NUM)
}

/// An uncaptured `<ts>: ` embedded inside a bracket.
pub(crate) fn inner_timestamp() -> String {
    format!(r"(?:{}:\s*)?", NUM)
}

/// `<secs> secs`, captured as `name`.
pub(crate) fn secs(name: &str) -> String {
    format!(r"(?P<{}>{})\s*secs", name, NUM)
}

/// `<before>K-><after>K(<capacity>K)` captured as `<prefix>_before`,
/// `<prefix>_after` and `<prefix>_cap`.
pub(crate) fn occupancy(prefix: &str) -> String {
    format!(
        r"(?P<{p}_before>\d+)K->(?P<{p}_after>\d+)K\((?P<{p}_cap>\d+)K\)",
        p = prefix
    )
}

/// `(<cause>)` right after the collection label, e.g. `(System)`.
pub(crate) fn cause() -> &'static str {
    r"(?:\s*\((?P<cause>[^)]*)\))?"
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_num_accepts_both_separators() {
        let re = Regex::new(&format!("^{}$", NUM)).unwrap();
        assert!(re.is_match("0.0052050"));
        assert!(re.is_match("0,0052050"));
        assert!(re.is_match("12"));
        assert!(!re.is_match("1."));
    }

    #[test]
    fn test_occupancy_captures() {
        let re = Regex::new(&occupancy("heap")).unwrap();
        let caps = re.captures("3968K->1273K(12928K)").unwrap();
        assert_eq!(&caps["heap_before"], "3968");
        assert_eq!(&caps["heap_after"], "1273");
        assert_eq!(&caps["heap_cap"], "12928");
    }

    #[test]
    fn test_timestamp_prefix_is_optional() {
        let re = Regex::new(&format!(r"{}\[GC", timestamp_prefix())).unwrap();
        assert_eq!(&re.captures("12.5: [GC").unwrap()["ts"], "12.5");
        assert!(re.captures("[GC").unwrap().name("ts").is_none());
    }
}
