//! Numeric constant typing (C99 6.4.4.1 and 6.4.4.2).
//!
//! An integer constant takes the first type in its suffix's candidate list
//! that can represent its value; the candidate list depends on the radix.
//! Floating constants are typed by suffix alone.

use ecc_ast::{TypeId, TypeTable};

/// Typed value of an integer constant.
pub fn type_integer_constant(table: &TypeTable, text: &str) -> Result<(u64, TypeId), String> {
    let (digits, radix) = if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (rest, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };

    let suffix_start = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let (digits, suffix) = digits.split_at(suffix_start);
    let digits = if digits.is_empty() && radix == 8 {
        "0" // the constant `0`
    } else {
        digits
    };

    let value = u64::from_str_radix(digits, radix)
        .map_err(|_| format!("integer constant `{}` out of range", text))?;

    let has_u = suffix.contains('u') || suffix.contains('U');
    let long_count = suffix.chars().filter(|c| matches!(c, 'l' | 'L')).count();
    let decimal = radix == 10;

    // C99 6.4.4.1: candidate type lists. Octal and hexadecimal constants
    // may fall back to unsigned types even without a `u` suffix.
    let candidates: &[Candidate] = match (has_u, long_count, decimal) {
        (false, 0, true) => &[Candidate::Int, Candidate::Long, Candidate::LongLong],
        (false, 0, false) => &[
            Candidate::Int,
            Candidate::UInt,
            Candidate::Long,
            Candidate::ULong,
            Candidate::LongLong,
            Candidate::ULongLong,
        ],
        (true, 0, _) => &[Candidate::UInt, Candidate::ULong, Candidate::ULongLong],
        (false, 1, true) => &[Candidate::Long, Candidate::LongLong],
        (false, 1, false) => &[
            Candidate::Long,
            Candidate::ULong,
            Candidate::LongLong,
            Candidate::ULongLong,
        ],
        (true, 1, _) => &[Candidate::ULong, Candidate::ULongLong],
        (false, _, true) => &[Candidate::LongLong],
        (false, _, false) => &[Candidate::LongLong, Candidate::ULongLong],
        (true, _, _) => &[Candidate::ULongLong],
    };

    for candidate in candidates {
        if value <= candidate.max() {
            return Ok((value, candidate.type_id(table)));
        }
    }
    Err(format!("integer constant `{}` out of range", text))
}

#[derive(Clone, Copy)]
enum Candidate {
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
}

impl Candidate {
    fn max(self) -> u64 {
        match self {
            Candidate::Int => i32::MAX as u64,
            Candidate::UInt => u32::MAX as u64,
            Candidate::Long | Candidate::LongLong => i64::MAX as u64,
            Candidate::ULong | Candidate::ULongLong => u64::MAX,
        }
    }

    fn type_id(self, table: &TypeTable) -> TypeId {
        match self {
            Candidate::Int => table.int_(),
            Candidate::UInt => table.uint(),
            Candidate::Long => table.long_(),
            Candidate::ULong => table.ulong(),
            Candidate::LongLong => table.longlong(),
            Candidate::ULongLong => table.ulonglong(),
        }
    }
}

/// Typed value of a floating constant: `f`/`F` is `float`, `l`/`L` is
/// `long double`, no suffix is `double`.
pub fn type_floating_constant(table: &TypeTable, text: &str) -> Result<(f64, TypeId), String> {
    let (body, ty) = match text.as_bytes().last() {
        Some(b'f' | b'F') => (&text[..text.len() - 1], table.float()),
        Some(b'l' | b'L') => (&text[..text.len() - 1], table.longdouble()),
        _ => (text, table.double()),
    };

    let value = if body.starts_with("0x") || body.starts_with("0X") {
        parse_hex_float(&body[2..])
            .ok_or_else(|| format!("malformed hexadecimal floating constant `{}`", text))?
    } else {
        body.parse::<f64>()
            .map_err(|_| format!("malformed floating constant `{}`", text))?
    };
    Ok((value, ty))
}

/// Hexadecimal floating constants (6.4.4.2): `h.hhh` mantissa with a
/// mandatory binary exponent `p±d`.
fn parse_hex_float(body: &str) -> Option<f64> {
    let p = body.find(|c| matches!(c, 'p' | 'P'))?;
    let (mantissa, exponent) = body.split_at(p);
    let exponent: i32 = exponent[1..].parse().ok()?;

    let mut value = 0.0f64;
    let mut scale = 1.0f64;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for c in mantissa.chars() {
        if c == '.' {
            if seen_dot {
                return None;
            }
            seen_dot = true;
            continue;
        }
        let digit = c.to_digit(16)? as f64;
        seen_digit = true;
        if seen_dot {
            scale /= 16.0;
            value += digit * scale;
        } else {
            value = value * 16.0 + digit;
        }
    }
    if !seen_digit {
        return None;
    }
    Some(value * 2.0f64.powi(exponent))
}
