use orderdesk_core::errors::StoreError;

pub mod catalog;
pub mod intake;
pub mod order;
pub mod proposal;

pub use catalog::SqlCatalogStore;
pub use intake::SqlIntakeEventStore;
pub use order::SqlOrderStore;
pub use proposal::SqlProposalStore;

pub(crate) fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

pub(crate) fn decode(message: impl std::fmt::Display) -> StoreError {
    StoreError::Decode(message.to_string())
}
