use crate::exit::{CliError, CliResult};

/// Parse a hex byte string. Accepts an optional `0x` prefix and ignores
/// whitespace, `:` and `_` between digits.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '_')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::usage(format!(
            "hex string has an odd number of digits: {input}"
        )));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = digits.get(i..i + 2).unwrap_or_default();
            u8::from_str_radix(pair, 16)
                .map_err(|_| CliError::usage(format!("invalid hex byte '{pair}' in {input}")))
        })
        .collect()
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
