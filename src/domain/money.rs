use thiserror::Error;

/// Money is represented as integer paise (minor currency units) to avoid
/// floating-point drift. ₹50.00 = 5000 paise. Signed: credits are positive,
/// debits negative.
pub type Paise = i64;

/// One percent expressed in basis points.
pub const BPS_PER_PERCENT: i64 = 100;

/// 100% expressed in basis points.
pub const FULL_BPS: i64 = 10_000;

/// Format paise as a human-readable amount.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_paise(paise: Paise) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal string into paise.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_paise(input: &str) -> Result<Paise, ParsePaiseError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    if digits.is_empty() {
        return Err(ParsePaiseError::InvalidFormat);
    }

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };
    if fraction_str.contains('.') {
        return Err(ParsePaiseError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParsePaiseError::InvalidFormat)?
    };

    // More than two fractional digits are rejected rather than truncated:
    // a silently dropped fraction of a paisa is still money.
    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        1 => {
            fraction_str
                .parse::<i64>()
                .map_err(|_| ParsePaiseError::InvalidFormat)?
                * 10
        }
        2 => fraction_str
            .parse()
            .map_err(|_| ParsePaiseError::InvalidFormat)?,
        _ => return Err(ParsePaiseError::TooPrecise),
    };

    let paise = units
        .checked_mul(100)
        .and_then(|p| p.checked_add(fraction))
        .ok_or(ParsePaiseError::Overflow)?;
    Ok(if negative { -paise } else { paise })
}

/// Multiply a non-negative amount by a rate in basis points, rounding half up
/// to the nearest paisa.
pub fn apply_bps(amount: Paise, bps: i64) -> Paise {
    debug_assert!(amount >= 0 && bps >= 0);
    let scaled = i128::from(amount) * i128::from(bps);
    let denominator = i128::from(FULL_BPS);
    ((scaled * 2 + denominator) / (denominator * 2)) as Paise
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsePaiseError {
    #[error("invalid money format")]
    InvalidFormat,
    #[error("amounts support at most two decimal places")]
    TooPrecise,
    #[error("amount is too large")]
    Overflow,
}
