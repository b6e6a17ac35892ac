use rust_decimal::Decimal;

/// Calculate the notional value in quote currency.
pub fn calculate_quote_notional(
    quantity: Decimal,
    price: Decimal,
    contract_size: Decimal,
) -> Result<Decimal, &'static str> {
    Ok(quantity * price * contract_size)
}

/// Validate an order's requested size against the configured maximum single-order size.
pub fn validate_order_size<T>(order_size: &T, max_size: &T) -> Result<(), &'static str>
where
    T: PartialOrd,
{
    if order_size > max_size {
        Err("Order size exceeds maximum allowed size")
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quote_notional_multiplies_quantity_price_and_contract_size() {
        assert_eq!(calculate_quote_notional(dec!(10), dec!(5), dec!(1)).unwrap(), dec!(50));
    }

    #[test]
    fn order_size_validation_rejects_above_max() {
        assert!(validate_order_size(&10u64, &5u64).is_err());
        assert!(validate_order_size(&5u64, &10u64).is_ok());
    }
}
