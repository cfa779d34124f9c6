/// Data layer: core types, loading, caching and filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → EsgTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  cache    │  load once, share Arc<EsgTable>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  company ∧ years ∧ regions ∧ departments → Subset
///   └──────────┘
/// ```

pub mod cache;
pub mod error;
pub mod filter;
pub mod loader;
pub mod model;
