//! Scalar resolution for untagged plain scalars and the `!!bool`/`!!int`/`!!float`/`!!timestamp`
//! constructors.

/// Options that influence how plain scalars are typed.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ScalarRules {
    pub legacy_octal: bool,
    pub yaml11_booleans: bool,
}

/// Result of implicit (untagged, plain style) scalar resolution.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Resolved {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str,
}

/// Resolve an untagged plain scalar following the YAML 1.2 core schema.
///
/// Integers that look like integers but do not fit into `i64` are an error rather
/// than a silent string, so the caller gets `Err(())` for those.
pub(crate) fn resolve_plain(s: &str, rules: ScalarRules) -> Result<Resolved, ()> {
    if is_null(s) {
        return Ok(Resolved::Null);
    }
    if let Some(b) = parse_bool(s, rules.yaml11_booleans) {
        return Ok(Resolved::Bool(b));
    }
    if looks_like_int(s, rules.legacy_octal) {
        return parse_int(s, rules.legacy_octal).map(Resolved::Int).ok_or(());
    }
    if let Some(f) = parse_float(s) {
        return Ok(Resolved::Float(f));
    }
    Ok(Resolved::Str)
}

pub(crate) fn is_null(s: &str) -> bool {
    matches!(s, "" | "~" | "null" | "Null" | "NULL")
}

/// Parse a boolean: the YAML 1.2 literals, plus the YAML 1.1 forms when `yaml11` is set.
pub(crate) fn parse_bool(s: &str, yaml11: bool) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ if yaml11 => parse_yaml11_bool(s).ok(),
        _ => None,
    }
}

/// Parse a YAML 1.1 boolean from a &str (handles the "Norway problem").
///
/// Accepted TRUE literals (case-insensitive): "y", "yes", "true", "on"
/// Accepted FALSE literals (case-insensitive): "n", "no", "false", "off"
pub(crate) fn parse_yaml11_bool(s: &str) -> Result<bool, String> {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true")
        || t.eq_ignore_ascii_case("yes")
        || t.eq_ignore_ascii_case("y")
        || t.eq_ignore_ascii_case("on")
    {
        Ok(true)
    } else if t.eq_ignore_ascii_case("false")
        || t.eq_ignore_ascii_case("no")
        || t.eq_ignore_ascii_case("n")
        || t.eq_ignore_ascii_case("off")
    {
        Ok(false)
    } else {
        Err(format!("invalid YAML 1.1 bool: `{}`", s))
    }
}

fn split_sign(t: &str) -> (bool, &str) {
    match t.strip_prefix('+') {
        Some(r) => (false, r),
        None => match t.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, t),
        },
    }
}

fn split_radix(rest: &str, legacy_octal: bool) -> (u32, &str) {
    if let Some(r) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, r)
    } else if let Some(r) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (8, r)
    } else if let Some(r) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (2, r)
    } else if legacy_octal && rest.len() > 1 && rest.starts_with('0') {
        (8, &rest[1..])
    } else {
        (10, rest)
    }
}

/// Syntactic integer check, independent of range.
fn looks_like_int(s: &str, legacy_octal: bool) -> bool {
    let (_, rest) = split_sign(s.trim());
    let (radix, digits) = split_radix(rest, legacy_octal);
    !digits.is_empty()
        && digits.bytes().any(|b| b != b'_')
        && digits.bytes().all(|b| b == b'_' || (b as char).is_digit(radix))
}

fn parse_digits_u128(digits: &str, radix: u32) -> Option<u128> {
    let mut val: u128 = 0;
    let mut saw = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(radix)?;
        val = val.checked_mul(radix as u128)?;
        val = val.checked_add(d as u128)?;
        saw = true;
    }
    if saw { Some(val) } else { None }
}

/// Parse an integer in decimal, `0x`, `0o` or `0b` notation (underscores allowed).
///
/// With `legacy_octal`, a leading `0` also selects base 8 (YAML 1.1).
pub(crate) fn parse_int(s: &str, legacy_octal: bool) -> Option<i64> {
    let (neg, rest) = split_sign(s.trim());
    let (radix, digits) = split_radix(rest, legacy_octal);
    let mag = parse_digits_u128(digits, radix)?;
    let mag: i128 = mag.try_into().ok()?;
    let val = if neg { mag.checked_neg()? } else { mag };
    i64::try_from(val).ok()
}

/// Parse a YAML 1.2 float, including `.nan` and `±.inf`.
///
/// Only numeric spellings are accepted: Rust's own `inf`/`NaN` words are strings in YAML.
pub(crate) fn parse_float(s: &str) -> Option<f64> {
    let t = s.trim();
    let lower = t.to_ascii_lowercase();
    match lower.as_str() {
        ".nan" => return Some(f64::NAN),
        ".inf" | "+.inf" => return Some(f64::INFINITY),
        "-.inf" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    let (_, body) = split_sign(&lower);
    let numeric = body.bytes().any(|b| b.is_ascii_digit())
        && body
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'+' | b'-' | b'_'));
    if !numeric {
        return None;
    }
    lower.replace('_', "").parse::<f64>().ok()
}

/// Count up to `max` leading ASCII digits of `b[*at..]`, advancing `at`.
fn digits(b: &[u8], at: &mut usize, max: usize) -> usize {
    let start = *at;
    while *at < b.len() && *at - start < max && b[*at].is_ascii_digit() {
        *at += 1;
    }
    *at - start
}

fn byte(b: &[u8], at: &mut usize, expected: u8) -> bool {
    let found = b.get(*at) == Some(&expected);
    if found {
        *at += 1;
    }
    found
}

fn blanks(b: &[u8], at: &mut usize) -> usize {
    let start = *at;
    while *at < b.len() && matches!(b[*at], b' ' | b'\t') {
        *at += 1;
    }
    *at - start
}

/// Whether `s` is a YAML timestamp: a date `2001-12-14`, or a date and time such as
/// `2001-12-14t21:59:43.10-05:00`, `2001-12-14 21:59:43.10 -5` or `2001-12-15T02:59:43.1Z`.
pub(crate) fn is_timestamp(s: &str) -> bool {
    let b = s.trim().as_bytes();
    let mut at = 0;
    if digits(b, &mut at, 4) != 4 || !byte(b, &mut at, b'-') {
        return false;
    }
    let month = digits(b, &mut at, 2);
    if month == 0 || !byte(b, &mut at, b'-') {
        return false;
    }
    let day = digits(b, &mut at, 2);
    if day == 0 {
        return false;
    }
    if at == b.len() {
        return month == 2 && day == 2;
    }

    if !(byte(b, &mut at, b'T') || byte(b, &mut at, b't') || blanks(b, &mut at) > 0) {
        return false;
    }
    let hour = digits(b, &mut at, 2);
    if hour == 0 || !byte(b, &mut at, b':') || digits(b, &mut at, 2) != 2 {
        return false;
    }
    if !byte(b, &mut at, b':') || digits(b, &mut at, 2) != 2 {
        return false;
    }
    if byte(b, &mut at, b'.') {
        digits(b, &mut at, usize::MAX);
    }
    if at == b.len() {
        return true;
    }

    blanks(b, &mut at);
    if byte(b, &mut at, b'Z') {
        return at == b.len();
    }
    if !(byte(b, &mut at, b'+') || byte(b, &mut at, b'-')) || digits(b, &mut at, 2) == 0 {
        return false;
    }
    if byte(b, &mut at, b':') && digits(b, &mut at, 2) != 2 {
        return false;
    }
    at == b.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Resolved {
        resolve_plain(s, ScalarRules::default()).unwrap()
    }

    #[test]
    fn core_schema_resolution() {
        assert_eq!(plain(""), Resolved::Null);
        assert_eq!(plain("NULL"), Resolved::Null);
        assert_eq!(plain("~"), Resolved::Null);
        assert_eq!(plain("True"), Resolved::Bool(true));
        assert_eq!(plain("false"), Resolved::Bool(false));
        assert_eq!(plain("12345"), Resolved::Int(12345));
        assert_eq!(plain("-0x1F"), Resolved::Int(-31));
        assert_eq!(plain("0o17"), Resolved::Int(15));
        assert_eq!(plain("1_000"), Resolved::Int(1000));
        assert_eq!(plain("6.25"), Resolved::Float(6.25));
        assert_eq!(plain("1e3"), Resolved::Float(1000.0));
        assert_eq!(plain("-.inf"), Resolved::Float(f64::NEG_INFINITY));
        assert_eq!(plain("abcde"), Resolved::Str);
        assert_eq!(plain("10d6"), Resolved::Str);
        assert_eq!(plain("inf"), Resolved::Str);
        assert_eq!(plain("yes"), Resolved::Str);
        assert_eq!(plain("127.0.0.1"), Resolved::Str);
    }

    #[test]
    fn yaml11_and_legacy_octal_are_opt_in() {
        let rules = ScalarRules {
            legacy_octal: true,
            yaml11_booleans: true,
        };
        assert_eq!(resolve_plain("yes", rules), Ok(Resolved::Bool(true)));
        assert_eq!(resolve_plain("Off", rules), Ok(Resolved::Bool(false)));
        assert_eq!(resolve_plain("0755", rules), Ok(Resolved::Int(0o755)));
        assert_eq!(plain("0755"), Resolved::Int(755));
    }

    #[test]
    fn out_of_range_integer_is_rejected() {
        assert!(resolve_plain("99999999999999999999", ScalarRules::default()).is_err());
        assert_eq!(parse_int("-9223372036854775808", false), Some(i64::MIN));
    }

    #[test]
    fn timestamps() {
        for ok in [
            "2001-12-14",
            "2001-12-14t21:59:43.10-05:00",
            "2001-12-14 21:59:43.10 -5",
            "2001-12-15T02:59:43.1Z",
            "2002-12-14 2:59:43",
        ] {
            assert!(is_timestamp(ok), "{ok}");
        }
        for bad in ["2001-1-14", "2001-12-14T", "2001-12-14T21:59", "2001-12-14 21:59:43 +", "14.12.2001", "now"] {
            assert!(!is_timestamp(bad), "{bad}");
        }
    }
}
