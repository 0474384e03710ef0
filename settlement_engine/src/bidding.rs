//! Auction bid validation.
//!
//! The top bid is not stored anywhere. It is always derived from the auction orders of a listing that still count as
//! bids (see [`OrderStatusType::counts_as_bid`]). The settlement engine checks a bid twice: once when quoting, and
//! again inside the confirmation transaction once the listing lock is held, so that the loser of a bidding race is
//! rejected even though both bidders were quoted against the same top bid.
use chrono::{DateTime, Utc};
use mkt_common::Money;
use thiserror::Error;

use crate::db_types::{Listing, ListingStatus, Order, OrderStatusType, ProductKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidRejection {
    #[error("The auction for listing #{0} is not open")]
    AuctionNotOpen(i64),
    #[error("Sellers cannot bid on their own auctions")]
    SelfBidForbidden,
    #[error("A bid of {bid} is too low. The minimum acceptable bid is more than {top_bid:?} or at least {start_price}")]
    BidTooLow { bid: Money, top_bid: Option<Money>, start_price: Money },
}

/// An auction is open if the listing is available and `start_date <= now < end_date`. Auctions without an end date are
/// never open.
pub fn auction_is_open(listing: &Listing, now: DateTime<Utc>) -> bool {
    let started = listing.start_date.map(|start| now >= start).unwrap_or(true);
    let not_ended = listing.end_date.map(|end| now < end).unwrap_or(false);
    listing.kind == ProductKind::AuctionBid && listing.status == ListingStatus::Available && started && not_ended
}

/// The highest bid among the orders that still count as bids.
pub fn top_bid<'a, I: IntoIterator<Item = &'a Order>>(orders: I) -> Option<Money> {
    orders
        .into_iter()
        .filter(|o| o.kind == ProductKind::AuctionBid && o.status.counts_as_bid())
        .filter_map(|o| o.bid_amount)
        .max()
}

pub fn validate_bid(
    listing: &Listing,
    bidder_id: i64,
    bid_amount: Money,
    top_bid: Option<Money>,
    now: DateTime<Utc>,
) -> Result<(), BidRejection> {
    if !auction_is_open(listing, now) {
        return Err(BidRejection::AuctionNotOpen(listing.id));
    }
    if listing.owner_id == bidder_id {
        return Err(BidRejection::SelfBidForbidden);
    }
    let start_price = listing.start_price.unwrap_or(listing.price);
    let acceptable = match top_bid {
        Some(top) => bid_amount > top,
        None => bid_amount >= start_price,
    };
    if acceptable {
        Ok(())
    } else {
        Err(BidRejection::BidTooLow { bid: bid_amount, top_bid, start_price })
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn m(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn auction(now: DateTime<Utc>) -> Listing {
        Listing {
            id: 7,
            kind: ProductKind::AuctionBid,
            owner_id: 1,
            title: "Baler".into(),
            price: m("50"),
            stock: 1,
            status: ListingStatus::Available,
            start_price: Some(m("50")),
            start_date: Some(now - Duration::hours(1)),
            end_date: Some(now + Duration::hours(1)),
            lock_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn bid(id: i64, amount: &str, status: OrderStatusType) -> Order {
        let now = Utc::now();
        Order {
            id,
            kind: ProductKind::AuctionBid,
            buyer_id: 10 + id,
            seller_id: 1,
            listing_id: 7,
            status,
            quantity: 1,
            unit_price: m(amount),
            bid_amount: Some(m(amount)),
            total_price: m(amount),
            deposit_required: Money::ZERO,
            amount_paid: Money::ZERO,
            wallet_amount: Money::ZERO,
            gateway_amount: Money::ZERO,
            provider: "Wallet".into(),
            provider_payment_id: format!("p{id}"),
            client_order_key: format!("k{id}"),
            cancel_until: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn first_bid_must_meet_start_price() {
        let now = Utc::now();
        let listing = auction(now);
        let err = validate_bid(&listing, 2, m("40"), None, now).unwrap_err();
        assert!(matches!(err, BidRejection::BidTooLow { .. }));
        assert!(validate_bid(&listing, 2, m("50"), None, now).is_ok());
        assert!(validate_bid(&listing, 2, m("60"), None, now).is_ok());
    }

    #[test]
    fn later_bids_must_exceed_top_bid() {
        let now = Utc::now();
        let listing = auction(now);
        assert!(validate_bid(&listing, 2, m("105"), Some(m("105")), now).is_err());
        assert!(validate_bid(&listing, 2, m("105.01"), Some(m("105")), now).is_ok());
    }

    #[test]
    fn sellers_cannot_bid() {
        let now = Utc::now();
        let listing = auction(now);
        assert_eq!(validate_bid(&listing, 1, m("60"), None, now), Err(BidRejection::SelfBidForbidden));
    }

    #[test]
    fn auction_window() {
        let now = Utc::now();
        let mut listing = auction(now);
        assert!(auction_is_open(&listing, now));
        assert!(!auction_is_open(&listing, now + Duration::hours(1)));
        assert!(!auction_is_open(&listing, now - Duration::hours(2)));
        listing.end_date = None;
        assert!(!auction_is_open(&listing, now));
        let mut closed = auction(now);
        closed.status = ListingStatus::Closed;
        assert_eq!(validate_bid(&closed, 2, m("60"), None, now), Err(BidRejection::AuctionNotOpen(7)));
    }

    #[test]
    fn cancelled_bids_are_ignored() {
        let bids = vec![
            bid(1, "100", OrderStatusType::Pending),
            bid(2, "150", OrderStatusType::Cancelled),
            bid(3, "120", OrderStatusType::Confirmed),
            bid(4, "200", OrderStatusType::DeletedByBuyer),
        ];
        assert_eq!(top_bid(&bids), Some(m("120")));
        assert_eq!(top_bid(Vec::<Order>::new().iter()), None);
        let now = Utc::now();
        let listing = auction(now);
        assert!(validate_bid(&listing, 5, m("121"), top_bid(&bids), now).is_ok());
        assert!(validate_bid(&listing, 5, m("120"), top_bid(&bids), now).is_err());
    }
}
