//! Side effects requested by a transition.

use chat_checkout_core::OrderName;

use crate::address::SavedAddress;
use crate::messaging::Reply;

/// Work for the executor. Effects that call out produce an outcome
/// [`Event`](super::Event) that is fed back into the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Reply),
    /// Cache, then directory. Yields `ExistingAddress`.
    FindExistingAddress,
    /// Yields `AddressSaved`.
    SaveAddress(SavedAddress),
    /// Yields `DiscountResolved`.
    ValidateDiscount(String),
    /// Yields `PaymentLinkCreated` or `PaymentLinkFailed`.
    RequestPaymentLink,
    /// Yields `OrderStatusLoaded`.
    LookupOrder(OrderName),
    /// Remove the session instead of saving it.
    EndSession,
}
