//! Per-kind pricing rules.
//!
//! Every product kind answers the same two questions: what is the full price of the purchase (`total`), and what is
//! the least the buyer must pay up front (`deposit_required`). What the buyer may actually pay now differs by kind:
//! materials and machines accept anything between the deposit and the total, while rentals and auction bids must be
//! paid exactly.
use log::debug;
use mkt_common::{Money, Percent};
use thiserror::Error;

use crate::db_types::{Listing, ProductKind};

pub const DEFAULT_DEPOSIT_PERCENT: Percent = Percent::from_basis_points(1_000);
pub const DEFAULT_AUCTION_DEPOSIT_PERCENT: Percent = Percent::from_basis_points(2_000);
/// Applied when the configured auction deposit is zero or negative.
pub const FALLBACK_AUCTION_DEPOSIT_PERCENT: Percent = Percent::from_basis_points(3_000);
pub const DEFAULT_RENTAL_MONTHS_UPFRONT: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Quantity must be positive, but {0} was requested")]
    InvalidQuantity(i64),
    #[error("Invalid pricing: {0}")]
    InvalidPricing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    pub deposit_percent: Percent,
    pub auction_deposit_percent: Percent,
    pub rental_months_upfront: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            deposit_percent: DEFAULT_DEPOSIT_PERCENT,
            auction_deposit_percent: DEFAULT_AUCTION_DEPOSIT_PERCENT,
            rental_months_upfront: DEFAULT_RENTAL_MONTHS_UPFRONT,
        }
    }
}

impl PricingConfig {
    pub fn effective_auction_deposit_percent(&self) -> Percent {
        if self.auction_deposit_percent.is_positive() {
            self.auction_deposit_percent
        } else {
            FALLBACK_AUCTION_DEPOSIT_PERCENT
        }
    }
}

/// The result of pricing a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub policy: PricingPolicy,
    pub unit_price: Money,
    pub quantity: i64,
    pub total: Money,
    pub deposit_required: Money,
}

impl Pricing {
    /// The amount due now, given an optional amount requested by the buyer.
    ///
    /// Materials and machines clamp the request into `[deposit_required, total]`; with no request the deposit is due.
    /// Rentals and auction bids always pay `deposit_required`.
    pub fn payable(&self, requested: Option<Money>) -> Money {
        match self.policy {
            PricingPolicy::Range => {
                requested.unwrap_or(self.deposit_required).clamp_between(self.deposit_required, self.total)
            },
            PricingPolicy::Exact => self.deposit_required,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingPolicy {
    /// Pay anything between the deposit and the total.
    Range,
    /// Pay exactly the deposit.
    Exact,
}

impl PricingPolicy {
    pub fn for_kind(kind: ProductKind) -> Self {
        match kind {
            ProductKind::Material | ProductKind::Machine => Self::Range,
            ProductKind::Rental | ProductKind::AuctionBid => Self::Exact,
        }
    }
}

/// Prices `quantity` units of a material/machine listing, a rental booking, or an auction bid of `bid_amount`.
///
/// `quantity` is ignored for rentals and auction bids, and `bid_amount` is only used for auctions.
pub fn quote(
    listing: &Listing,
    quantity: i64,
    bid_amount: Option<Money>,
    config: &PricingConfig,
) -> Result<Pricing, PricingError> {
    let policy = PricingPolicy::for_kind(listing.kind);
    let pricing = match listing.kind {
        ProductKind::Material | ProductKind::Machine => {
            if quantity <= 0 {
                return Err(PricingError::InvalidQuantity(quantity));
            }
            let total = listing.price.checked_mul(quantity).ok_or_else(|| {
                PricingError::InvalidPricing(format!("{quantity} x {} overflows", listing.price))
            })?;
            let deposit_required = total.percent_of(config.deposit_percent);
            Pricing { policy, unit_price: listing.price, quantity, total, deposit_required }
        },
        ProductKind::Rental => {
            if config.rental_months_upfront <= 0 {
                return Err(PricingError::InvalidPricing(format!(
                    "Rentals must be paid at least one month upfront, not {}",
                    config.rental_months_upfront
                )));
            }
            let total = listing.price.checked_mul(config.rental_months_upfront).ok_or_else(|| {
                let months = config.rental_months_upfront;
                PricingError::InvalidPricing(format!("{months} months of {} overflows", listing.price))
            })?;
            Pricing { policy, unit_price: listing.price, quantity: 1, total, deposit_required: total }
        },
        ProductKind::AuctionBid => {
            let bid =
                bid_amount.ok_or_else(|| PricingError::InvalidPricing("An auction bid needs a bid amount".into()))?;
            let deposit_required = bid.percent_of(config.effective_auction_deposit_percent());
            Pricing { policy, unit_price: bid, quantity: 1, total: bid, deposit_required }
        },
    };
    if !pricing.deposit_required.is_positive() {
        return Err(PricingError::InvalidPricing(format!(
            "The deposit for {} #{} works out to {}",
            listing.kind, listing.id, pricing.deposit_required
        )));
    }
    debug!(
        "🧾️ Priced {} #{}: total {}, deposit {}",
        listing.kind, listing.id, pricing.total, pricing.deposit_required
    );
    Ok(pricing)
}
