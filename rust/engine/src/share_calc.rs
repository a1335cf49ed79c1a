//! Swap fee and LP share arithmetic. The formulas are pinned: the circuit
//! recomputes them and any divergence invalidates the witness.

use num_bigint::BigUint;
use num_traits::Zero;
use starknet::core::types::Felt;

use crate::utils::{biguint_to_felt, felt_to_biguint};

pub const PROFIT_RATE_NUMERATOR: u32 = 3;
pub const PROFIT_RATE_DENOMINATOR: u32 = 1000;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShareCalcHelper;

impl ShareCalcHelper {
    /// `ceil(amount * 3 / 1000)` over the integer value of `amount`.
    pub fn calc_profit(&self, amount: Felt) -> Felt {
        let scaled = felt_to_biguint(&amount) * BigUint::from(PROFIT_RATE_NUMERATOR);
        let denominator = BigUint::from(PROFIT_RATE_DENOMINATOR);
        let quotient = &scaled / &denominator;
        let profit = if (&scaled % &denominator).is_zero() {
            quotient
        } else {
            quotient + 1u32
        };
        biguint_to_felt(&profit)
    }

    /// LP shares minted for (or burned by) a liquidity movement.
    pub fn calc_share(&self, amount0: Felt, amount1: Felt) -> Felt {
        amount0 + amount1
    }
}
