//! Positioned text and heuristic table detection.
//!
//! Backends reduce each page to a [`PageLayout`]: text cells with bounding
//! boxes in points, top-left origin. Everything here works on that shape
//! only, so the same detector and text renderers serve every backend.
//!
//! Table detection:
//! 1. Cluster cells into rows by vertical centre
//! 2. Group consecutive rows with a compatible cell count into regions
//! 3. Cluster left edges into column boundaries
//! 4. Assign cells to columns and drop columns that stayed empty
//! 5. Score the grid by the fraction of filled cells

use std::cmp::Ordering;

use crate::model::ExtractionConfig;

/// A run of text with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    pub text: String,
    /// Left edge (points).
    pub x: f32,
    /// Top edge (points).
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextCell {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
        }
    }

    fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }

    fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// A single glyph as reported by a backend, used to split a text line into
/// cells at wide horizontal gaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Split a line of glyphs into cells wherever the gap between consecutive
/// glyphs exceeds `gap_factor` times the glyph height, or at runs of two or
/// more spaces. Leading and trailing whitespace is trimmed from every cell.
pub fn cells_from_glyphs(glyphs: &[Glyph], gap_factor: f32) -> Vec<TextCell> {
    struct Run {
        text: String,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
    }

    let mut cells = Vec::new();
    let mut current: Option<Run> = None;
    let mut spaces = 0usize;

    let flush = |run: Option<Run>, cells: &mut Vec<TextCell>| {
        if let Some(run) = run {
            let text = run.text.trim();
            if !text.is_empty() {
                cells.push(TextCell::new(
                    text,
                    run.x0,
                    run.y0,
                    run.x1 - run.x0,
                    run.y1 - run.y0,
                ));
            }
        }
    };

    for g in glyphs {
        if g.ch.is_whitespace() {
            spaces += 1;
            if spaces >= 2 {
                flush(current.take(), &mut cells);
            } else if let Some(run) = current.as_mut() {
                run.text.push(' ');
            }
            continue;
        }

        let height = (g.y1 - g.y0).abs().max(1.0);
        let split = match &current {
            Some(run) => g.x0 - run.x1 > height * gap_factor,
            None => false,
        };
        if split {
            flush(current.take(), &mut cells);
        }
        spaces = 0;

        match current.as_mut() {
            Some(run) => {
                run.text.push(g.ch);
                run.x1 = run.x1.max(g.x1);
                run.y0 = run.y0.min(g.y0);
                run.y1 = run.y1.max(g.y1);
            }
            None => {
                current = Some(Run {
                    text: g.ch.to_string(),
                    x0: g.x0,
                    y0: g.y0,
                    x1: g.x1,
                    y1: g.y1,
                });
            }
        }
    }
    flush(current, &mut cells);

    cells
}

/// All positioned text of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    /// 1-based.
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub cells: Vec<TextCell>,
}

impl PageLayout {
    pub fn new(page_number: usize, width: f32, height: f32) -> Self {
        Self {
            page_number,
            width,
            height,
            cells: Vec::new(),
        }
    }
}

/// Table detector configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDetectorConfig {
    /// Cells whose vertical centres are within this distance share a row.
    pub row_tolerance: f32,
    /// Left edges within this distance share a column.
    pub col_tolerance: f32,
    pub min_rows: usize,
    pub min_cols: usize,
    /// Minimum non-empty cells for a grid to count as a table.
    pub min_cells: usize,
    /// How far a row's cell count may drift from the first row of its region.
    pub column_slack: usize,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self::stream()
    }
}

impl TableDetectorConfig {
    /// Strict grids: tight alignment and a constant cell count per row.
    pub fn lattice() -> Self {
        Self {
            row_tolerance: 3.0,
            col_tolerance: 6.0,
            min_rows: 2,
            min_cols: 2,
            min_cells: 4,
            column_slack: 0,
        }
    }

    /// Whitespace-separated columns with looser alignment.
    pub fn stream() -> Self {
        Self {
            row_tolerance: 5.0,
            col_tolerance: 10.0,
            min_rows: 2,
            min_cols: 2,
            min_cells: 6,
            column_slack: 1,
        }
    }

    /// Apply `row_tolerance`, `col_tolerance`, `min_cols` and `min_cells`
    /// from `provider`'s options, when present.
    pub fn with_overrides(mut self, config: &ExtractionConfig, provider: &str) -> Self {
        if let Some(v) = config.param_f64(provider, "row_tolerance") {
            self.row_tolerance = v as f32;
        }
        if let Some(v) = config.param_f64(provider, "col_tolerance") {
            self.col_tolerance = v as f32;
        }
        if let Some(v) = config.param_u64(provider, "min_cols") {
            self.min_cols = v as usize;
        }
        if let Some(v) = config.param_u64(provider, "min_cells") {
            self.min_cells = v as usize;
        }
        self
    }
}

/// A grid found on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    pub rows: Vec<Vec<String>>,
    pub num_cols: usize,
    /// (x, y, width, height)
    pub bbox: (f32, f32, f32, f32),
    /// Fraction of grid cells that hold text.
    pub accuracy: f64,
}

pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    pub fn new(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TableDetectorConfig {
        &self.config
    }

    pub fn detect(&self, page: &PageLayout) -> Vec<DetectedTable> {
        if page.cells.len() < self.config.min_cells {
            return Vec::new();
        }

        let rows = cluster_rows(&page.cells, self.config.row_tolerance);
        self.find_regions(&rows)
            .iter()
            .filter_map(|region| self.build_table(region))
            .collect()
    }

    fn find_regions<'a>(&self, rows: &[Vec<&'a TextCell>]) -> Vec<Vec<Vec<&'a TextCell>>> {
        let mut regions = Vec::new();
        let mut current: Vec<Vec<&'a TextCell>> = Vec::new();
        let mut expected: Option<usize> = None;

        let close = |current: &mut Vec<Vec<&'a TextCell>>, regions: &mut Vec<_>| {
            if current.len() >= self.config.min_rows {
                regions.push(std::mem::take(current));
            } else {
                current.clear();
            }
        };

        for row in rows {
            let n = row.len();
            if n < self.config.min_cols {
                close(&mut current, &mut regions);
                expected = None;
                continue;
            }

            // A large vertical jump ends the region even if the shape matches.
            let jump = current
                .last()
                .is_some_and(|prev| row_gap(prev, row) > row_height(prev).max(row_height(row)) * 3.0);
            if jump {
                close(&mut current, &mut regions);
                expected = None;
            }

            match expected {
                Some(exp) if n.abs_diff(exp) <= self.config.column_slack => current.push(row.clone()),
                Some(_) => {
                    close(&mut current, &mut regions);
                    current.push(row.clone());
                    expected = Some(n);
                }
                None => {
                    current.push(row.clone());
                    expected = Some(n);
                }
            }
        }
        close(&mut current, &mut regions);

        regions
    }

    fn build_table(&self, region: &[Vec<&TextCell>]) -> Option<DetectedTable> {
        let boundaries = column_boundaries(region, self.config.col_tolerance);
        let mut num_cols = boundaries.len();
        if num_cols < self.config.min_cols {
            return None;
        }

        let mut grid: Vec<Vec<String>> = Vec::with_capacity(region.len());
        for row in region {
            let mut cells = vec![String::new(); num_cols];
            for cell in row {
                let col = column_index(cell, &boundaries);
                let slot = &mut cells[col];
                if !slot.is_empty() {
                    slot.push(' ');
                }
                slot.push_str(&cell.text);
            }
            grid.push(cells);
        }

        // Columns no cell landed in carry no information.
        let keep: Vec<bool> = (0..num_cols)
            .map(|c| grid.iter().any(|row| !row[c].is_empty()))
            .collect();
        if keep.iter().any(|k| !k) {
            for row in &mut grid {
                let mut c = 0;
                row.retain(|_| {
                    let k = keep[c];
                    c += 1;
                    k
                });
            }
            num_cols = keep.iter().filter(|k| **k).count();
        }
        if num_cols < self.config.min_cols {
            return None;
        }

        let filled = grid.iter().flatten().filter(|c| !c.is_empty()).count();
        if filled < self.config.min_cells {
            return None;
        }
        let accuracy = filled as f64 / (grid.len() * num_cols) as f64;

        Some(DetectedTable {
            rows: grid,
            num_cols,
            bbox: bounding_box(region),
            accuracy,
        })
    }
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Group cells into rows, top to bottom, each row sorted left to right.
fn cluster_rows(cells: &[TextCell], tolerance: f32) -> Vec<Vec<&TextCell>> {
    let mut sorted: Vec<&TextCell> = cells.iter().collect();
    sorted.sort_by(|a, b| cmp_f32(a.center_y(), b.center_y()).then(cmp_f32(a.x, b.x)));

    let mut rows: Vec<Vec<&TextCell>> = Vec::new();
    for cell in sorted {
        match rows.last_mut() {
            Some(row) if (cell.center_y() - row[0].center_y()).abs() <= tolerance => row.push(cell),
            _ => rows.push(vec![cell]),
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| cmp_f32(a.x, b.x));
    }
    rows
}

fn row_top(row: &[&TextCell]) -> f32 {
    row.iter().map(|c| c.y).fold(f32::MAX, f32::min)
}

fn row_height(row: &[&TextCell]) -> f32 {
    row.iter().map(|c| c.height).fold(0.0, f32::max).max(1.0)
}

fn row_gap(upper: &[&TextCell], lower: &[&TextCell]) -> f32 {
    row_top(lower) - row_top(upper)
}

/// Left edges of the columns, ascending.
fn column_boundaries(region: &[Vec<&TextCell>], tolerance: f32) -> Vec<f32> {
    let mut xs: Vec<f32> = region.iter().flat_map(|row| row.iter().map(|c| c.x)).collect();
    xs.sort_by(|a, b| cmp_f32(*a, *b));

    let mut boundaries: Vec<f32> = Vec::new();
    for x in xs {
        match boundaries.last() {
            Some(&last) if x - last <= tolerance => {}
            _ => boundaries.push(x),
        }
    }
    boundaries
}

/// The column whose cluster the cell's left edge fell into: the rightmost
/// boundary at or left of it.
fn column_index(cell: &TextCell, boundaries: &[f32]) -> usize {
    boundaries.iter().rposition(|&b| b <= cell.x).unwrap_or(0)
}

fn bounding_box(region: &[Vec<&TextCell>]) -> (f32, f32, f32, f32) {
    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for cell in region.iter().flatten() {
        min_x = min_x.min(cell.x);
        min_y = min_y.min(cell.y);
        max_x = max_x.max(cell.right());
        max_y = max_y.max(cell.bottom());
    }
    (min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Cells further right than this are placed here in layout text.
const MAX_LAYOUT_COLUMN: usize = 2000;

fn median(mut values: Vec<f32>, fallback: f32) -> f32 {
    if values.is_empty() {
        return fallback;
    }
    values.sort_by(|a, b| cmp_f32(*a, *b));
    values[values.len() / 2]
}

/// Render a page as text that keeps its horizontal layout: cells are placed
/// at character columns proportional to their x position, and a blank line
/// marks large vertical gaps.
pub fn render_layout_text(page: &PageLayout) -> String {
    if page.cells.is_empty() {
        return String::new();
    }

    let line_height = median(page.cells.iter().map(|c| c.height).collect(), 10.0).max(1.0);
    let char_width = median(
        page.cells
            .iter()
            .filter(|c| !c.text.is_empty())
            .map(|c| c.width / c.text.chars().count() as f32)
            .collect(),
        5.0,
    )
    .max(1.0);

    let rows = cluster_rows(&page.cells, line_height / 2.0);
    let mut lines: Vec<String> = Vec::with_capacity(rows.len());
    let mut prev_top: Option<f32> = None;

    for row in &rows {
        let top = row_top(row);
        if let Some(prev) = prev_top
            && top - prev > line_height * 2.5
        {
            lines.push(String::new());
        }
        prev_top = Some(top);

        let mut line = String::new();
        let mut used = 0usize;
        for cell in row {
            let col = ((cell.x.max(0.0) / char_width).round() as usize).min(MAX_LAYOUT_COLUMN);
            let pad = if col > used {
                col - used
            } else if used > 0 {
                1
            } else {
                0
            };
            line.extend(std::iter::repeat_n(' ', pad));
            line.push_str(&cell.text);
            used = used.saturating_add(pad + cell.text.chars().count());
        }
        lines.push(line.trim_end().to_string());
    }

    lines.join("\n")
}

/// Render a page as plain reading-order text, one row per line.
pub fn render_plain_text(page: &PageLayout) -> String {
    let line_height = median(page.cells.iter().map(|c| c.height).collect(), 10.0).max(1.0);
    cluster_rows(&page.cells, line_height / 2.0)
        .iter()
        .map(|row| {
            row.iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
