//! Core of the order change proposal pipeline: the domain model, the
//! deterministic pipeline components (grouping, matching, intent rules,
//! diffing), proposal resolution, and the port traits the storage and
//! oracle adapters implement.
//!
//! Nothing in this crate talks to a database or an LLM directly; the
//! `orderdesk-db` and `orderdesk-agent` crates plug into the ports defined
//! here.

pub mod config;
pub mod diff;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod grouping;
pub mod intent;
pub mod matching;
pub mod oracle;
pub mod pipeline;
pub mod ports;
pub mod resolution;
pub mod snapshot;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use diff::{diff_order_lines, LineChange};
pub use domain::customer::{Customer, CustomerId};
pub use domain::events::{OrderEvent, OrderEventId, OrderEventKind};
pub use domain::intake::{Channel, IntakeEvent, IntakeEventId};
pub use domain::item::{Item, ItemId, ItemVariant, VariantId};
pub use domain::order::{Order, OrderId, OrderLine, OrderLineId, OrderLineStatus, OrderStatus};
pub use domain::proposal::{
    LineChangeType, OrderFrequency, Proposal, ProposalId, ProposalKind, ProposalLine,
    ProposalLineId, ProposalStatus, ResolutionAudit,
};
pub use domain::OrganizationId;
pub use errors::{DomainError, OracleError, PipelineError, ResolutionError, StoreError};
pub use extraction::{ExtractedLineItem, ExtractionOutcome};
pub use grouping::{group_by_delivery_date, DateGroup};
pub use intent::{DecisionSource, IntentDecision, IntentResolver, OrderIntent};
pub use matching::{CandidateOrders, MatchLimits, OrderMatcher};
pub use oracle::{
    ClassificationRequest, ExtractionOracle, ExtractionRequest, IntentClassification,
    ScriptedOracle,
};
pub use pipeline::{GroupOutcome, IntakeOutcome, IntakePipeline};
pub use ports::{CatalogStore, IntakeEventStore, OrderStore, ProposalStore};
pub use resolution::{
    build_audit, CreateOrderRequest, OrderMutationPort, ResolutionEngine, ResolutionOutcome,
    ReviewAction, ReviewDecision, SubmittedLine,
};
pub use snapshot::{CatalogSnapshot, ResolvedLine};
