use eyre::Context as _;

/// Scale a human-readable decimal amount into smallest token units.
///
/// Digits beyond `decimals` are rounded half-up, so the result is `round(amount * 10^decimals)`:
/// - "1.0", decimals=6 => 1000000
/// - "0.0000015", decimals=6 => 2
pub fn parse_amount_ui_to_base_u128(s: &str, decimals: u32) -> eyre::Result<u128> {
    let s = s.trim();
    if s.is_empty() {
        eyre::bail!("empty amount");
    }
    if s.starts_with('-') {
        eyre::bail!("amount must be non-negative");
    }

    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        eyre::bail!("invalid amount: {s}");
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        eyre::bail!("invalid amount: {s}");
    }

    let whole_v: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().context("parse whole")?
    };

    let d = decimals as usize;
    let (kept, dropped) = if frac.len() > d {
        frac.split_at(d)
    } else {
        (frac, "")
    };
    let mut frac_s = kept.to_owned();
    while frac_s.len() < d {
        frac_s.push('0');
    }
    let frac_v: u128 = if frac_s.is_empty() {
        0
    } else {
        frac_s.parse().context("parse fractional")?
    };
    let round_up = u128::from(dropped.bytes().next().is_some_and(|b| b >= b'5'));

    let scale = 10_u128
        .checked_pow(decimals)
        .ok_or_else(|| eyre::eyre!("decimals too large"))?;

    let base = whole_v
        .checked_mul(scale)
        .and_then(|x| x.checked_add(frac_v))
        .and_then(|x| x.checked_add(round_up))
        .ok_or_else(|| eyre::eyre!("amount overflow"))?;

    Ok(base)
}

/// Format a base-unit integer amount into a UI decimal string without using floats.
///
/// Examples:
/// - base=1500000, decimals=6 => "1.5"
/// - base=1, decimals=6 => "0.000001"
pub fn format_amount_base_to_ui_string(base: u128, decimals: u32) -> eyre::Result<String> {
    if decimals == 0 {
        return Ok(base.to_string());
    }
    let scale = 10_u128
        .checked_pow(decimals)
        .ok_or_else(|| eyre::eyre!("decimals too large"))?;
    let whole = base / scale;
    let frac = base % scale;
    if frac == 0 {
        return Ok(whole.to_string());
    }
    let mut frac_s = format!("{frac:0width$}", width = decimals as usize);
    while frac_s.ends_with('0') {
        frac_s.pop();
    }
    Ok(format!("{whole}.{frac_s}"))
}

/// Drop precision below the 8 decimals a Wormhole transfer payload carries.
pub fn truncate_to_wormhole_precision(base: u128, decimals: u8) -> u128 {
    let Some(excess) = decimals.checked_sub(8).filter(|e| *e > 0) else {
        return base;
    };
    let Some(div) = 10_u128.checked_pow(u32::from(excess)) else {
        return 0;
    };
    base / div * div
}
