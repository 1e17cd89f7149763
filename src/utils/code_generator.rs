use rand::Rng;
use rand::rngs::OsRng;

/// Generates a numeric code of exactly `length` digits, uniform over
/// `10^(length-1) ..= 10^length - 1`.
///
/// Drawn from the OS random source since the code gates account access.
pub fn generate_numeric_code(length: u32) -> String {
    let low = 10u64.pow(length.saturating_sub(1));
    let high = 10u64.pow(length) - 1;
    let value = OsRng.gen_range(low..=high);
    format!("{:0width$}", value, width = length as usize)
}
