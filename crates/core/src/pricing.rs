//! Fee calculation for a TRX purchase.
//!
//! Every purchase carries a fixed 5% markup. The network transfer fee of
//! 1.5 TRX is either charged in toman on top of the invoice or deducted
//! from the quantity that is finally delivered.

use crate::models::FeeMethod;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const MARKUP: Decimal = dec!(1.05);
pub const NETWORK_FEE_TRX: Decimal = dec!(1.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDue {
    /// Toman the user pays at the gateway.
    pub fiat_amount: u64,
    /// TRX the user ends up receiving.
    pub delivered_crypto: Decimal,
}

/// Amount owed for `crypto_amount` TRX at `unit_price` toman per TRX.
///
/// The caller guarantees `crypto_amount` lies in `[1, 1350]`
/// (see [`crate::validation::validate_purchase_amount`]); it is not checked here.
///
/// With [`FeeMethod::DeductedFromCrypto`] a quantity below
/// [`NETWORK_FEE_TRX`] yields a negative `delivered_crypto`; purchase
/// validation currently admits such quantities.
pub fn price_due(crypto_amount: Decimal, unit_price: u64, method: FeeMethod) -> PriceDue {
    let price = Decimal::from(unit_price);
    let (fiat, delivered) = match method {
        FeeMethod::FlatFiatFee => (
            (crypto_amount * MARKUP + NETWORK_FEE_TRX) * price,
            crypto_amount,
        ),
        FeeMethod::DeductedFromCrypto => (
            crypto_amount * MARKUP * price,
            crypto_amount - NETWORK_FEE_TRX,
        ),
    };

    PriceDue {
        fiat_amount: fiat.floor().to_u64().unwrap_or(0),
        delivered_crypto: delivered,
    }
}
