/// Render a signed amount of base units with `decimals` fractional digits.
pub fn format_token_amount(amount: i128, decimals: u32) -> String {
    let unit = 10u128.pow(decimals);
    let magnitude = amount.unsigned_abs();
    let sign = if amount < 0 { "-" } else { "" };

    if decimals == 0 {
        return format!("{}{}", sign, magnitude);
    }

    format!(
        "{}{}.{:0width$}",
        sign,
        magnitude / unit,
        magnitude % unit,
        width = decimals as usize
    )
}
