/// Analytics pipeline: everything between a filtered subset and the pixels.
///
/// ```text
///   Subset ──► derive ──► DerivedFrame ──► aggregate ──► GroupedTable
///                                   │              └──► correlation / pivot
///                                   │
///                                   └──► export (detail rows, CSV)
///
///   view::render ties the steps together into one ViewModel per selection.
/// ```

pub mod aggregate;
pub mod derive;
pub mod export;
pub mod view;
