use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const MIN_PURCHASE_TRX: Decimal = dec!(1);
pub const MAX_PURCHASE_TRX: Decimal = dec!(1350);
pub const MIN_ADDRESS_LEN: usize = 30;

pub fn validate_purchase_amount(amount: Decimal) -> Result<(), String> {
    if amount < MIN_PURCHASE_TRX || amount > MAX_PURCHASE_TRX {
        return Err(format!(
            "quantity must be between {MIN_PURCHASE_TRX} and {MAX_PURCHASE_TRX} TRX, got {amount}"
        ));
    }
    Ok(())
}

/// TRON base58 addresses start with `T`.
pub fn validate_destination_address(address: &str) -> Result<(), String> {
    let address = address.trim();
    if !address.starts_with('T') {
        return Err("wallet address must start with 'T'".to_string());
    }
    if address.len() < MIN_ADDRESS_LEN {
        return Err(format!(
            "wallet address must be at least {MIN_ADDRESS_LEN} characters"
        ));
    }
    Ok(())
}
