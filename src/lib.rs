//! GreenLens: ESG analytics over a company/region/department/quarter table.
//!
//! The data layer loads and filters the table, the pipeline derives metrics
//! and aggregates them into a view model, and the egui front end draws it.

pub mod app;
pub mod color;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod state;
pub mod ui;
