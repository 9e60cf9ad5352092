//! Inventory skew: a subordinate helper of the risk manager, grounded in the
//! original `InventoryManager.get_inventory_skew`.

use rust_decimal::Decimal;

/// Parameters for the inventory skew formula, held alongside the risk limits.
#[derive(Debug, Clone, Copy)]
pub struct InventoryParams {
    pub target: Decimal,
    pub max_inventory: Decimal,
    /// Ticks of price offset per unit of inventory deviation.
    pub k_ticks_per_unit: Decimal,
    /// Seconds after which the time penalty saturates at 1.0.
    pub half_life_secs: Decimal,
}

/// Bid/ask price offsets, in quote currency, to add to the raw BBO.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewOffsets {
    pub bid_skew: Decimal,
    pub ask_skew: Decimal,
}

/// Computes the inventory-driven skew.
///
/// `vol` is a fractional volatility estimate (e.g. 0.01 for 1%).
/// `seconds_since_last_update` feeds the time penalty that ramps skew up the
/// longer inventory has sat away from target.
pub fn inventory_skew(
    inventory: Decimal,
    params: InventoryParams,
    vol: Decimal,
    seconds_since_last_update: Decimal,
    tick_size: Decimal,
) -> SkewOffsets {
    let dev = inventory - params.target;
    let risk = if params.max_inventory.is_zero() {
        Decimal::ZERO
    } else {
        (dev / params.max_inventory).abs()
    };
    let time_penalty = if params.half_life_secs.is_zero() {
        Decimal::ONE
    } else {
        (seconds_since_last_update / params.half_life_secs).min(Decimal::ONE)
    };
    let base_ticks = dev * params.k_ticks_per_unit;
    let base = base_ticks * tick_size;
    let skew = base * (Decimal::ONE + risk * time_penalty) * (Decimal::ONE + Decimal::TWO * vol);

    SkewOffsets { bid_skew: -skew / Decimal::TWO, ask_skew: skew / Decimal::TWO }
}
