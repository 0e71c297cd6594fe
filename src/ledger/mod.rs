mod ledger;
mod offer;

pub use ledger::OfferLedger;
pub use offer::{Offer, OfferId};
pub(crate) use ledger::Change;
