//! Cost model (C8, spec §4.6): slippage, brokerage, and transaction tax
//! applied to directional fills. Pure arithmetic, no I/O.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub brokerage: f64,
    pub tax: f64,
    pub slippage: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            brokerage: 0.001425,
            tax: 0.003,
            slippage: 0.0015,
        }
    }
}

impl CostModel {
    pub fn zero() -> Self {
        Self { brokerage: 0.0, tax: 0.0, slippage: 0.0 }
    }

    /// `apply(price, buy)  = price * (1 + slip) * (1 + brokerage)`
    /// `apply(price, sell) = price * (1 - slip) * (1 - brokerage - tax)`
    /// Tax only ever applies on the sell side (spec §4.6).
    pub fn apply(&self, price: f64, side: Side) -> f64 {
        match side {
            Side::Buy => price * (1.0 + self.slippage) * (1.0 + self.brokerage),
            Side::Sell => price * (1.0 - self.slippage) * (1.0 - self.brokerage - self.tax),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_example_from_spec() {
        let model = CostModel { brokerage: 0.001, tax: 0.002, slippage: 0.001 };
        assert!((model.apply(100.0, Side::Buy) - 100.2001001).abs() < 1e-6);
        assert!((model.apply(100.0, Side::Sell) - 99.600003).abs() < 1e-6);
    }

    #[test]
    fn buy_is_monotonically_above_price_when_costs_positive() {
        let model = CostModel { brokerage: 0.001, tax: 0.0, slippage: 0.0005 };
        assert!(model.apply(100.0, Side::Buy) > 100.0);
    }

    #[test]
    fn sell_is_monotonically_below_price_when_costs_positive() {
        let model = CostModel { brokerage: 0.001, tax: 0.002, slippage: 0.0005 };
        assert!(model.apply(100.0, Side::Sell) < 100.0);
    }

    #[test]
    fn zero_cost_model_is_a_no_op() {
        let model = CostModel::zero();
        assert_eq!(model.apply(100.0, Side::Buy), 100.0);
        assert_eq!(model.apply(100.0, Side::Sell), 100.0);
    }
}
