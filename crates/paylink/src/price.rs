//! Integer-only rendering of minor-unit prices.
//!
//! Route prices are stored as `u64` minor units (1e-6 USDC). No floating
//! point is used anywhere in the pipeline.

use crate::constants::{TOKEN_DECIMALS, UNITS_PER_TOKEN};

/// Render minor units with all six decimals, e.g. `10000` -> `"0.010000"`.
pub fn format_price(units: u64) -> String {
    format!(
        "{}.{:0width$}",
        units / UNITS_PER_TOKEN,
        units % UNITS_PER_TOKEN,
        width = TOKEN_DECIMALS as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(10_000), "0.010000");
        assert_eq!(format_price(0), "0.000000");
        assert_eq!(format_price(1_500_000), "1.500000");
        assert_eq!(format_price(123_456_789), "123.456789");
    }
}
