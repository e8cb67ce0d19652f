// Covenant Enforcement - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod error;
pub mod money;
pub mod entities;
pub mod seed;
pub mod rate_schedule;  // Weekly rate in effect on a date
pub mod allocation;     // Pro-rata campus share
pub mod arrears;        // Accrued debt over the collectible window
pub mod settlement;     // Settlement floors and payment plans
pub mod enforcement;    // Status transitions and legal deadlines
pub mod priority;       // Urgency ranking
pub mod store;
pub mod db;
pub mod integrity;
pub mod engine;
pub mod export;

// Re-export commonly used types
pub use config::{EnforcementConfig, SettlementTier, CONFIG_VERSION};
pub use error::{EnforcementError, EnforcementResult};
pub use entities::{
    Credit, CureTrack, DeadlineKind, EnforcementLogEntry, EnforcementStep,
    Parcel, ParcelStatus, RateRecord,
};
pub use rate_schedule::RateSchedule;
pub use allocation::{Allocation, BillingComparison, CampusAllocator};
pub use arrears::{Accrual, Arrears, ArrearsBasis, ArrearsCalculator, RateBreakdown};
pub use settlement::{SettlementEngine, SettlementQuote, SettlementTerms};
pub use enforcement::{
    DeadlineBucket, DeadlineEntry, DeadlinePolicy, DeadlineStatus,
    EnforcementStateMachine, ParcelField, PendingAction, SurveyedArea, TransitionContext,
};
pub use priority::{PriorityRanker, RankedParcel, Ranking, UrgencyScore};
pub use store::{MemoryStore, ParcelStore};
pub use db::{Database, LegacyImport, SCHEMA_VERSION};
pub use integrity::{Finding, IntegrityChecker, IntegrityReport, Severity};
pub use engine::{DashboardSummary, EnforcementEngine, LenderResearchSummary, ParcelFigures};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
