// triage-ticket/src/lib.rs
// ============================================================================
// Crate: triage-ticket
// Description: The ticket node: post-analysis dedup, per-run cap enforcement,
//              payload construction, and tracker commit (component I).
// Purpose: Turn one classified log into a create/comment/skip decision,
//          without ever leaving run state inconsistent with the tracker.
// Dependencies: time, triage-config, triage-core, triage-dedup
// ============================================================================

//! ## Overview
//! [`TicketNode::process`] is the seven-step sequence spec §4.I describes:
//! validate the classification, route on `create_ticket`, run the
//! post-analysis dedup cascade, reserve a ticket-creation slot (enforcing the
//! per-run cap), build the tracker payload, and commit it (real or
//! simulated). A tracker failure after a successful reservation rolls the
//! reservation back via [`triage_core::SharedRunState::release_reservation`]
//! so a retried run never believes a ticket exists that the tracker rejected.

#![forbid(unsafe_code)]

mod node;

pub use node::TicketInput;
pub use node::TicketNode;
pub use node::TicketOutcome;
