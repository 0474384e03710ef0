mod steps;

use std::collections::HashMap;

use cucumber::World;
use settlement_engine::{
    db_types::Listing,
    settlement_objects::{ConfirmedOrder, Quote},
    SettlementError,
};

use crate::support::{TestSystem, ALICE, BOB, CAROL, SELLER};

#[derive(Debug, Default, World)]
pub struct MarketWorld {
    pub system: Option<TestSystem>,
    pub listings: HashMap<String, Listing>,
    pub quotes: HashMap<String, Quote>,
    pub last_error: Option<String>,
    pub confirmations: Vec<Result<ConfirmedOrder, String>>,
}

impl MarketWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("The marketplace has not been set up")
    }

    pub fn listing(&self, name: &str) -> &Listing {
        self.listings.get(name).unwrap_or_else(|| panic!("No listing called {name}"))
    }

    pub fn quote(&self, buyer: &str) -> &Quote {
        self.quotes.get(buyer).unwrap_or_else(|| panic!("{buyer} has not asked for a quote"))
    }

    /// Keeps the quote, or the reason it was refused.
    pub fn record_quote(&mut self, buyer: &str, result: Result<Quote, SettlementError>) {
        match result {
            Ok(quote) => {
                self.quotes.insert(buyer.to_string(), quote);
                self.last_error = None;
            },
            Err(e) => self.last_error = Some(format!("{e:?}")),
        }
    }

    pub fn record_confirmation(&mut self, result: Result<ConfirmedOrder, SettlementError>) {
        self.confirmations.push(result.map_err(|e| format!("{e:?}")));
    }

    pub fn last_confirmation(&self) -> &Result<ConfirmedOrder, String> {
        self.confirmations.last().expect("Nothing has been confirmed yet")
    }
}

pub fn user_id(name: &str) -> i64 {
    match name.to_lowercase().as_str() {
        "alice" => ALICE,
        "bob" => BOB,
        "carol" => CAROL,
        "the seller" | "seller" => SELLER,
        _ => panic!("Unknown user: {name}"),
    }
}
