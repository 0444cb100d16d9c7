//! Table grid detection
//!
//! Builds cell grids from positioned text the way a stream-mode table
//! reader does: rows are clusters of baselines, columns are fixed x
//! separators (or clusters of left edges when no separators are given), and
//! a large vertical gap starts a new table.

use crate::extractor::TextItem;
use crate::source::TableGrid;
use std::cmp::Ordering;

/// Settings for stream-mode table detection
#[derive(Debug, Clone)]
pub struct TableSettings {
    /// X positions separating columns. `None` infers them from the text.
    pub columns: Option<Vec<f32>>,
    /// Baselines closer than this belong to the same row
    pub row_tolerance: f32,
    /// A vertical gap larger than this between rows starts a new table
    pub edge_tolerance: f32,
    /// Tables with fewer rows are discarded
    pub min_rows: usize,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            columns: Some(vec![65.0, 330.0, 350.0]),
            row_tolerance: 10.0,
            edge_tolerance: 500.0,
            min_rows: 2,
        }
    }
}

/// A row cluster: mean baseline and its items
struct Row<'a> {
    y: f32,
    items: Vec<&'a TextItem>,
}

/// Detect tables in the text items of a single page
pub fn detect_tables(items: &[TextItem], settings: &TableSettings) -> Vec<TableGrid> {
    if items.is_empty() {
        return vec![];
    }

    let separators = match &settings.columns {
        Some(columns) => {
            let mut columns = columns.clone();
            columns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            columns
        }
        None => infer_column_separators(items),
    };

    let rows = cluster_rows(items, settings.row_tolerance);

    let mut tables = Vec::new();
    for region in split_regions(&rows, settings.edge_tolerance) {
        let grid: TableGrid = region
            .iter()
            .map(|row| build_row(row, &separators))
            .collect();

        if grid.len() < settings.min_rows || filled_columns(&grid) < 2 {
            continue;
        }
        tables.push(grid);
    }

    log::debug!(
        "detected {} table(s) over {} rows, {} columns",
        tables.len(),
        rows.len(),
        separators.len() + 1
    );
    tables
}

/// Cluster items into rows by Y position, top of the page first
fn cluster_rows(items: &[TextItem], tolerance: f32) -> Vec<Row<'_>> {
    let mut sorted: Vec<&TextItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(Ordering::Equal)); // Descending

    let mut rows: Vec<Row<'_>> = Vec::new();
    for item in sorted {
        match rows.last_mut() {
            Some(row) if row.y - item.y <= tolerance => {
                row.items.push(item);
                row.y = row.items.iter().map(|i| i.y).sum::<f32>() / row.items.len() as f32;
            }
            _ => rows.push(Row {
                y: item.y,
                items: vec![item],
            }),
        }
    }

    rows
}

/// Split rows into separate tables wherever the vertical gap is too large
fn split_regions<'r, 'a>(rows: &'r [Row<'a>], edge_tolerance: f32) -> Vec<&'r [Row<'a>]> {
    let mut regions = Vec::new();
    let mut start = 0;

    for i in 1..rows.len() {
        if rows[i - 1].y - rows[i].y > edge_tolerance {
            regions.push(&rows[start..i]);
            start = i;
        }
    }
    if start < rows.len() {
        regions.push(&rows[start..]);
    }

    regions
}

/// Index of the column an X position falls into
fn column_index(separators: &[f32], x: f32) -> usize {
    separators.iter().filter(|&&s| x >= s).count()
}

fn build_row(row: &Row<'_>, separators: &[f32]) -> Vec<Option<String>> {
    let mut cells: Vec<Vec<&TextItem>> = vec![Vec::new(); separators.len() + 1];
    for &item in &row.items {
        cells[column_index(separators, item.x)].push(item);
    }

    cells
        .iter_mut()
        .map(|cell| {
            // Reading order inside a cell: top line first, then left to right
            cell.sort_by(|a, b| {
                b.y.partial_cmp(&a.y)
                    .unwrap_or(Ordering::Equal)
                    .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
            });
            let text = join_cell_items(cell);
            (!text.is_empty()).then_some(text)
        })
        .collect()
}

/// Number of columns holding text in at least one row
fn filled_columns(grid: &TableGrid) -> usize {
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .filter(|&col| grid.iter().any(|row| matches!(row.get(col), Some(Some(_)))))
        .count()
}

/// Infer column separators by clustering the left edges of items.
///
/// Each cluster holding at least two items is a column; its leftmost edge
/// separates it from the column before.
fn infer_column_separators(items: &[TextItem]) -> Vec<f32> {
    let mut x_positions: Vec<f32> = items.iter().map(|i| i.x).collect();
    x_positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let (Some(&first), Some(&last)) = (x_positions.first(), x_positions.last()) else {
        return vec![];
    };

    // Smaller threshold for dense data, larger for sparse
    let avg_gap = if x_positions.len() > 1 {
        (last - first) / (x_positions.len() - 1) as f32
    } else {
        60.0
    };
    let cluster_threshold = avg_gap.clamp(25.0, 50.0);

    let mut clusters: Vec<Vec<f32>> = vec![vec![first]];
    for &x in &x_positions[1..] {
        let Some(cluster) = clusters.last_mut() else {
            break;
        };
        let center = cluster.iter().sum::<f32>() / cluster.len() as f32;
        if x - center > cluster_threshold {
            clusters.push(vec![x]);
        } else {
            cluster.push(x);
        }
    }

    clusters
        .iter()
        .filter(|cluster| cluster.len() >= 2)
        .skip(1)
        .map(|cluster| cluster[0])
        .collect()
}

/// Join the items of one cell, keeping hyphenated words together
fn join_cell_items(items: &[&TextItem]) -> String {
    let mut result = String::new();

    for item in items {
        let text = item.text.trim();
        if text.is_empty() {
            continue;
        }
        if !result.is_empty() && !result.ends_with('-') && !text.starts_with('-') {
            result.push(' ');
        }
        result.push_str(text);
    }

    result
}
