use std::collections::BTreeSet;

use super::model::{Dimension, EsgRecord, EsgTable};

// ---------------------------------------------------------------------------
// Filter selection: one company plus year/region/department sets
// ---------------------------------------------------------------------------

/// What the user has picked in the side panel.
///
/// Values that do not occur in the table are allowed; they simply match no
/// rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSelection {
    pub company: String,
    pub years: BTreeSet<i64>,
    pub regions: BTreeSet<String>,
    pub departments: BTreeSet<String>,
}

impl FilterSelection {
    /// Initial selection: first company in table order, the `year_count` most
    /// recent years, every region and the first `department_count`
    /// departments in table order.
    pub fn default_for(table: &EsgTable, year_count: usize, department_count: usize) -> Self {
        FilterSelection {
            company: table
                .distinct_text(Dimension::Company)
                .into_iter()
                .next()
                .unwrap_or_default(),
            years: table.years_descending().into_iter().take(year_count).collect(),
            regions: table.distinct_text(Dimension::Region).into_iter().collect(),
            departments: table
                .distinct_text(Dimension::Department)
                .into_iter()
                .take(department_count)
                .collect(),
        }
    }

    /// A row passes only if all four predicates hold.
    pub fn matches(&self, record: &EsgRecord) -> bool {
        record.company_name == self.company
            && self.years.contains(&record.year)
            && self.regions.contains(&record.region)
            && self.departments.contains(&record.department)
    }

    /// Toggle a year in or out of the selection.
    pub fn toggle_year(&mut self, year: i64) {
        if !self.years.remove(&year) {
            self.years.insert(year);
        }
    }

    pub fn toggle_region(&mut self, region: &str) {
        toggle(&mut self.regions, region);
    }

    pub fn toggle_department(&mut self, department: &str) {
        toggle(&mut self.departments, department);
    }
}

fn toggle(set: &mut BTreeSet<String>, value: &str) {
    if !set.remove(value) {
        set.insert(value.to_string());
    }
}

// ---------------------------------------------------------------------------
// Filtered subset
// ---------------------------------------------------------------------------

/// Non-empty view of the rows that passed a filter, in table order.
#[derive(Debug, Clone)]
pub struct Subset<'a> {
    table: &'a EsgTable,
    indices: Vec<usize>,
}

impl<'a> Subset<'a> {
    pub fn records(&self) -> impl Iterator<Item = &'a EsgRecord> + '_ {
        let records = self.table.records();
        self.indices.iter().map(move |&i| &records[i])
    }
}

/// Outcome of [`filter`]: matching rows, or the explicit "no data" state.
#[derive(Debug, Clone)]
pub enum Filtered<'a> {
    Rows(Subset<'a>),
    NoData,
}

impl<'a> Filtered<'a> {
    pub fn rows(self) -> Option<Subset<'a>> {
        match self {
            Filtered::Rows(subset) => Some(subset),
            Filtered::NoData => None,
        }
    }
}

/// Return the rows that pass every predicate of `selection`.
pub fn filter<'a>(table: &'a EsgTable, selection: &FilterSelection) -> Filtered<'a> {
    let indices: Vec<usize> = table
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| selection.matches(r))
        .map(|(i, _)| i)
        .collect();

    if indices.is_empty() {
        Filtered::NoData
    } else {
        Filtered::Rows(Subset { table, indices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;

    fn table() -> EsgTable {
        EsgTable::from_records(vec![
            record("Acme", "EU", "Ops", 2023, 1),
            record("Acme", "NA", "HR", 2023, 2),
            record("Acme", "EU", "Finance", 2022, 3),
            record("Acme", "APAC", "IT", 2021, 4),
            record("Globex", "EU", "Ops", 2023, 1),
        ])
    }

    fn selection(years: &[i64], regions: &[&str], departments: &[&str]) -> FilterSelection {
        FilterSelection {
            company: "Acme".into(),
            years: years.iter().copied().collect(),
            regions: regions.iter().map(|s| s.to_string()).collect(),
            departments: departments.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn defaults_follow_table_order() {
        let sel = FilterSelection::default_for(&table(), 2, 3);
        assert_eq!(sel.company, "Acme");
        assert_eq!(sel.years, [2023, 2022].into_iter().collect());
        assert_eq!(sel.regions.len(), 3);
        let depts: Vec<&str> = sel.departments.iter().map(String::as_str).collect();
        assert_eq!(depts, vec!["Finance", "HR", "Ops"]);
    }

    #[test]
    fn every_returned_row_satisfies_all_predicates() {
        let t = table();
        let sel = selection(&[2023, 2022], &["EU", "NA"], &["Ops", "HR", "Finance"]);
        let subset = filter(&t, &sel).rows().unwrap();
        assert_eq!(subset.records().count(), 3);
        assert!(subset.records().all(|r| sel.matches(r)));
        assert!(subset.records().all(|r| r.company_name == "Acme"));
    }

    #[test]
    fn predicates_are_conjunctive() {
        let t = table();
        // Region and department each match rows, but never on the same row.
        let sel = selection(&[2021, 2022, 2023], &["APAC"], &["Ops"]);
        assert!(matches!(filter(&t, &sel), Filtered::NoData));
    }

    #[test]
    fn unknown_values_match_nothing() {
        let t = table();
        let mut sel = selection(&[2023], &["EU"], &["Ops"]);
        sel.company = "Initech".into();
        assert!(matches!(filter(&t, &sel), Filtered::NoData));
    }

    #[test]
    fn toggles_add_and_remove() {
        let mut sel = selection(&[2023], &["EU"], &["Ops"]);
        sel.toggle_year(2022);
        sel.toggle_year(2023);
        sel.toggle_region("EU");
        sel.toggle_department("HR");
        assert_eq!(sel.years, [2022].into_iter().collect());
        assert!(sel.regions.is_empty());
        assert_eq!(sel.departments.len(), 2);
    }
}
