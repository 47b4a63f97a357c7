//! Built-in entities (jobs, timelogs, payment line items) and the repositories
//! that query them.

pub mod job;
pub mod payment_line_item;
pub mod repos;
pub mod timelog;

pub use job::Job;
pub use payment_line_item::PaymentLineItem;
pub use timelog::Timelog;

use crate::core::descriptor::EntityDescriptor;

/// Descriptors of the built-in entities, referenced entities first.
pub fn builtin_descriptors() -> Vec<EntityDescriptor> {
    vec![
        Job::descriptor(),
        Timelog::descriptor(),
        PaymentLineItem::descriptor(),
    ]
}
