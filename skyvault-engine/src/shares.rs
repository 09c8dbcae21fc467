use rust_decimal::{Decimal, RoundingStrategy};
use skyvault_core::{TicketError, TicketResult};

/// Splits a comma-separated passenger list, dropping blank entries.
pub fn parse_passengers(list: &str) -> TicketResult<Vec<String>> {
    let names: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(TicketError::validation("passenger list is empty"));
    }
    Ok(names)
}

/// Divides `total` into `parts` shares of whole cents.
///
/// Each share is truncated to two decimals and the leftover goes to the first
/// share, so the shares always add up to `total`.
pub fn divide_evenly(total: Decimal, parts: usize) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }
    let count = Decimal::from(parts);
    let share = (total / count).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let remainder = total - share * count;

    let mut shares = vec![share; parts];
    shares[0] += remainder;
    shares
}
