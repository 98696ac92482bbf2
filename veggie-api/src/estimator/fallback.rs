//! Deterministic ripeness fallback
//!
//! Used whenever the reasoning service fails, times out, or answers with
//! something unusable. Depends on the label only, never on the network,
//! and returns a value for every input.
//!
//! | stage   | ripes in         | spoils in                   |
//! |---------|------------------|-----------------------------|
//! | rotten  | 0                | 1-2                         |
//! | ripe    | 0                | 3-7                         |
//! | unripe  | 2-5              | ripes in + 3-7              |
//!
//! Labels without a recognized stage are treated as ripe.

use veggie_common::models::{
    ProduceCategory, ProduceKind, ProduceLabel, RipenessEstimate, RipenessStage,
};

/// Category by produce kind (culinary classification)
pub fn category_for(kind: &ProduceKind) -> ProduceCategory {
    match kind {
        ProduceKind::Banana
        | ProduceKind::Avocado
        | ProduceKind::Mango
        | ProduceKind::Strawberry => ProduceCategory::Fruit,
        ProduceKind::Tomato => ProduceCategory::Vegetable,
        ProduceKind::Other(_) => ProduceCategory::Fruit,
    }
}

/// Days a ripe item keeps before spoiling (3-7)
fn shelf_life_days(kind: &ProduceKind) -> u32 {
    match kind {
        ProduceKind::Strawberry | ProduceKind::Avocado => 3,
        ProduceKind::Banana | ProduceKind::Mango => 5,
        ProduceKind::Tomato => 7,
        ProduceKind::Other(_) => 5,
    }
}

/// Days an unripe item needs to ripen (2-5)
fn ripening_days(kind: &ProduceKind) -> u32 {
    match kind {
        ProduceKind::Strawberry => 2,
        ProduceKind::Banana | ProduceKind::Other(_) => 3,
        ProduceKind::Avocado => 4,
        ProduceKind::Mango | ProduceKind::Tomato => 5,
    }
}

/// Days a rotten item has left (1-2)
fn rotten_days(kind: &ProduceKind) -> u32 {
    match kind {
        ProduceKind::Strawberry => 1,
        _ => 2,
    }
}

/// Label-only ripeness estimate
pub fn fallback_estimate(label: &str) -> RipenessEstimate {
    let parsed = ProduceLabel::parse(label);
    let category = category_for(&parsed.kind);

    let (ripes_in_days, spoils_in_days) = match parsed.stage.unwrap_or(RipenessStage::Ripe) {
        RipenessStage::Rotten => (0, rotten_days(&parsed.kind)),
        RipenessStage::Ripe => (0, shelf_life_days(&parsed.kind)),
        RipenessStage::Unripe => {
            let ripens = ripening_days(&parsed.kind);
            (ripens, ripens + shelf_life_days(&parsed.kind))
        }
    };

    RipenessEstimate {
        category,
        ripes_in_days,
        spoils_in_days,
    }
}
