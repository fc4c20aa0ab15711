mod rules;

pub use rules::{
    validate_destination_address, validate_purchase_amount, MAX_PURCHASE_TRX,
    MIN_ADDRESS_LEN, MIN_PURCHASE_TRX,
};

use crate::error::BrokerError;
use rust_decimal::Decimal;

/// Runs every purchase rule and reports all violations at once.
pub fn validate_purchase(crypto_amount: Decimal, address: &str) -> Result<(), BrokerError> {
    let mut errs = Vec::new();
    if let Err(e) = validate_purchase_amount(crypto_amount) {
        errs.push(e);
    }
    if let Err(e) = validate_destination_address(address) {
        errs.push(e);
    }
    if errs.is_empty() {
        Ok(())
    } else {
        Err(BrokerError::InvalidRequest(errs.join("; ")))
    }
}
