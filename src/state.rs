use std::path::Path;
use std::sync::Arc;

use crate::color::ColorMap;
use crate::config::Settings;
use crate::data::cache::TableCache;
use crate::data::filter::FilterSelection;
use crate::data::model::{Dimension, DimensionValue, EsgTable};
use crate::pipeline::export::{detail_rows, write_csv};
use crate::pipeline::view::{Tab, ViewModel, render};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Message shown in the top bar after a user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Error(String),
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub settings: Settings,

    /// The loaded dataset, shared with the table cache.
    pub table: Arc<EsgTable>,

    /// Current side-panel selection.
    pub selection: FilterSelection,

    /// Output of the last render; rebuilt on every selection change.
    pub view: ViewModel,

    pub tab: Tab,

    /// Colours for regions, departments and years.
    pub color_map: ColorMap,

    pub status: Option<Status>,
}

impl AppState {
    pub fn new(settings: Settings, table: Arc<EsgTable>) -> Self {
        let selection = FilterSelection::default_for(
            &table,
            settings.default_year_count,
            settings.default_department_count,
        );
        let mut state = Self {
            color_map: ColorMap::for_table(&table),
            settings,
            table,
            selection,
            view: ViewModel::NoData,
            tab: Tab::default(),
            status: None,
        };
        state.refresh();
        state
    }

    /// Swap in a newly loaded table and reset the selection to its defaults.
    pub fn set_table(&mut self, table: Arc<EsgTable>) {
        self.selection = FilterSelection::default_for(
            &table,
            self.settings.default_year_count,
            self.settings.default_department_count,
        );
        self.color_map = ColorMap::for_table(&table);
        self.table = table;
        self.refresh();
    }

    /// Recompute the view model for the current selection.
    pub fn refresh(&mut self) {
        self.view = render(&self.table, &self.selection, &self.settings);
    }

    pub fn set_company(&mut self, company: &str) {
        if self.selection.company != company {
            self.selection.company = company.to_string();
            self.refresh();
        }
    }

    /// Values offered for a dimension in the side panel: years newest first,
    /// everything else in table order.
    pub fn choices(&self, dim: Dimension) -> Vec<DimensionValue> {
        match dim {
            Dimension::Year => self
                .table
                .years_descending()
                .into_iter()
                .map(DimensionValue::Integer)
                .collect(),
            _ => self.table.distinct_values(dim).to_vec(),
        }
    }

    pub fn is_selected(&self, dim: Dimension, value: &DimensionValue) -> bool {
        match (dim, value) {
            (Dimension::Year, DimensionValue::Integer(y)) => self.selection.years.contains(y),
            (Dimension::Region, DimensionValue::Text(t)) => self.selection.regions.contains(t),
            (Dimension::Department, DimensionValue::Text(t)) => {
                self.selection.departments.contains(t)
            }
            (Dimension::Company, DimensionValue::Text(t)) => self.selection.company == *t,
            _ => false,
        }
    }

    pub fn toggle(&mut self, dim: Dimension, value: &DimensionValue) {
        match (dim, value) {
            (Dimension::Year, DimensionValue::Integer(y)) => self.selection.toggle_year(*y),
            (Dimension::Region, DimensionValue::Text(t)) => self.selection.toggle_region(t),
            (Dimension::Department, DimensionValue::Text(t)) => {
                self.selection.toggle_department(t)
            }
            _ => return,
        }
        self.refresh();
    }

    pub fn select_all(&mut self, dim: Dimension) {
        match dim {
            Dimension::Year => {
                self.selection.years = self.table.years_descending().into_iter().collect();
            }
            Dimension::Region => {
                self.selection.regions =
                    self.table.distinct_text(Dimension::Region).into_iter().collect();
            }
            Dimension::Department => {
                self.selection.departments = self
                    .table
                    .distinct_text(Dimension::Department)
                    .into_iter()
                    .collect();
            }
            Dimension::Company | Dimension::Quarter => return,
        }
        self.refresh();
    }

    pub fn select_none(&mut self, dim: Dimension) {
        match dim {
            Dimension::Year => self.selection.years.clear(),
            Dimension::Region => self.selection.regions.clear(),
            Dimension::Department => self.selection.departments.clear(),
            Dimension::Company | Dimension::Quarter => return,
        }
        self.refresh();
    }

    /// Load another dataset through the process-wide cache. On failure the
    /// current table stays on screen.
    pub fn open(&mut self, path: &Path) {
        let cache = TableCache::global();
        cache.invalidate();
        match cache.get_or_load(path) {
            Ok(table) => {
                self.settings.data_path = path.to_path_buf();
                self.status = Some(Status::Info(format!(
                    "Loaded {} records from {}",
                    table.len(),
                    path.display()
                )));
                self.set_table(table);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status = Some(Status::Error(format!("Error: {e:#}")));
            }
        }
    }

    /// Suggested file name for the export dialog, if there is anything to
    /// export.
    pub fn export_file_name(&self) -> Option<&str> {
        match &self.view {
            ViewModel::Dashboard(d) => Some(d.export_file_name.as_str()),
            ViewModel::NoData => None,
        }
    }

    /// Write the detail rows of the current view to `path`.
    pub fn export(&mut self, path: &Path) {
        let ViewModel::Dashboard(dashboard) = &self.view else {
            self.status = Some(Status::Error("Nothing to export".to_string()));
            return;
        };
        let rows = detail_rows(dashboard.detail.iter());
        self.status = Some(match write_csv(path, &rows) {
            Ok(()) => Status::Info(format!("Exported {} rows to {}", rows.len(), path.display())),
            Err(e) => {
                log::error!("Export failed: {e:#}");
                Status::Error(format!("Error: {e:#}"))
            }
        });
    }
}
