//! Drag and gap reordering.
//!
//! Two independent pieces live here:
//! - [`DragEngine`]: an explicit `Idle -> Dragging -> Idle` state machine that
//!   keeps the transient visual order while a panel is dragged and emits it
//!   when the gesture ends.
//! - [`resolve_gap`]: finds the insertion point nearest the pointer in a grid
//!   of panel cards, used for the "insert blank panel here" affordance.

use std::collections::HashMap;

use crate::error::{StoryError, StoryResult};

/// Horizontal distance of row-edge gaps from the first/last card.
pub const GAP_OFFSET: f64 = 32.0;
/// Pointer distance beyond which no gap is active.
pub const GAP_THRESHOLD: f64 = 100.0;

// =============================================================================
// GEOMETRY
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center_y(&self) -> f64 {
        (self.top + self.bottom()) / 2.0
    }
}

/// Bounding box of one rendered panel card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRect {
    pub id: String,
    pub rect: Rect,
}

impl CardRect {
    pub fn new(id: impl Into<String>, rect: Rect) -> Self {
        Self { id: id.into(), rect }
    }
}

// =============================================================================
// GAPS
// =============================================================================

/// Candidate insertion point between or around cards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    /// Index in the authoritative panel order a new panel would take
    pub index: usize,
    pub center: Point,
}

struct Row<'a> {
    center_y: f64,
    cards: Vec<&'a CardRect>,
}

/// Groups cards into rows by vertical-center proximity, each sorted left to
/// right. Tolerance is half the height of the top-left card.
fn group_rows(cards: &[CardRect]) -> Vec<Row<'_>> {
    let mut sorted: Vec<&CardRect> = cards.iter().collect();
    sorted.sort_by(|a, b| {
        a.rect
            .top
            .total_cmp(&b.rect.top)
            .then(a.rect.left.total_cmp(&b.rect.left))
    });

    let tolerance = sorted.first().map_or(40.0, |c| c.rect.height / 2.0);
    let mut rows: Vec<Row> = Vec::new();

    for card in sorted {
        let center_y = card.rect.center_y();
        match rows
            .iter_mut()
            .find(|r| (r.center_y - center_y).abs() <= tolerance)
        {
            Some(row) => {
                row.cards.push(card);
                let n = row.cards.len() as f64;
                row.center_y = (row.center_y * (n - 1.0) + center_y) / n;
            }
            None => rows.push(Row {
                center_y,
                cards: vec![card],
            }),
        }
    }

    for row in &mut rows {
        row.cards.sort_by(|a, b| a.rect.left.total_cmp(&b.rect.left));
    }
    rows
}

/// Enumerates every candidate gap for the current grid.
///
/// `order` is the authoritative panel order; cards whose id is not in it
/// contribute no gaps.
pub fn candidate_gaps(cards: &[CardRect], order: &[String]) -> Vec<Gap> {
    let positions: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    let index_of = |card: &CardRect| positions.get(card.id.as_str()).copied();

    let rows = group_rows(cards);
    let last_row = rows.len().saturating_sub(1);
    let mut gaps = Vec::new();

    for (row_idx, row) in rows.iter().enumerate() {
        let (Some(first), Some(last)) = (row.cards.first(), row.cards.last()) else {
            continue;
        };

        if row_idx > 0 {
            if let Some(index) = index_of(first) {
                gaps.push(Gap {
                    index,
                    center: Point::new(first.rect.left - GAP_OFFSET, row.center_y),
                });
            }
        }

        for pair in row.cards.windows(2) {
            let (a, b) = (&pair[0].rect, &pair[1].rect);
            if let Some(index) = index_of(pair[1]) {
                gaps.push(Gap {
                    index,
                    center: Point::new(
                        (a.right() + b.left) / 2.0,
                        (a.center_y() + b.center_y()) / 2.0,
                    ),
                });
            }
        }

        if row_idx < last_row {
            if let Some(index) = index_of(last) {
                gaps.push(Gap {
                    index: index + 1,
                    center: Point::new(last.rect.right() + GAP_OFFSET, row.center_y),
                });
            }
        }
    }

    gaps
}

/// Resolves the active gap for a pointer position.
///
/// Returns `None` when fewer than two panels exist or the nearest gap is
/// farther than [`GAP_THRESHOLD`].
pub fn resolve_gap(cards: &[CardRect], order: &[String], pointer: Point) -> Option<Gap> {
    if order.len() < 2 {
        return None;
    }

    candidate_gaps(cards, order)
        .into_iter()
        .map(|gap| (gap.center.distance(&pointer), gap))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .filter(|(dist, _)| *dist <= GAP_THRESHOLD)
        .map(|(_, gap)| gap)
}

// =============================================================================
// DRAG STATE MACHINE
// =============================================================================

/// Drag gesture state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        dragging_id: String,
        /// Live visual order, rearranged on every hover
        visual_order: Vec<String>,
    },
}

/// Tracks one drag gesture at a time.
///
/// | state    | event         | result                                 |
/// |----------|---------------|----------------------------------------|
/// | Idle     | start         | Dragging                               |
/// | Idle     | hover/end     | ignored                                |
/// | Dragging | start         | error, still Dragging                  |
/// | Dragging | hover         | Dragging, visual order updated         |
/// | Dragging | end/cancel    | Idle, visual order emitted             |
/// | Dragging | track_insert  | Dragging, new id placed after anchor   |
/// | Dragging | track_remove  | id dropped; Idle if it was the dragged |
#[derive(Debug, Clone, Default)]
pub struct DragEngine {
    state: DragState,
}

impl DragEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn dragging_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { dragging_id, .. } => Some(dragging_id),
            DragState::Idle => None,
        }
    }

    /// Current visual order while dragging.
    pub fn visual_order(&self) -> Option<&[String]> {
        match &self.state {
            DragState::Dragging { visual_order, .. } => Some(visual_order),
            DragState::Idle => None,
        }
    }

    /// Begins dragging `id`. `current_order` is the authoritative order at
    /// drag start.
    pub fn start(&mut self, id: &str, current_order: Vec<String>) -> StoryResult<()> {
        if let DragState::Dragging { dragging_id, .. } = &self.state {
            return Err(StoryError::invalid_drag(format!(
                "cannot start dragging {id} while {dragging_id} is being dragged"
            )));
        }
        if !current_order.iter().any(|p| p == id) {
            return Err(StoryError::panel_not_found(id));
        }
        self.state = DragState::Dragging {
            dragging_id: id.to_string(),
            visual_order: current_order,
        };
        Ok(())
    }

    /// Pointer moved over another card. Places the dragged card after
    /// `over_id` if the pointer is below the card's vertical midpoint,
    /// before it otherwise. Returns whether the visual order changed.
    pub fn hover(&mut self, over_id: &str, over_rect: Rect, pointer_y: f64) -> bool {
        let DragState::Dragging {
            dragging_id,
            visual_order,
        } = &mut self.state
        else {
            return false;
        };
        if over_id == dragging_id.as_str() {
            return false;
        }

        let dragging_id = dragging_id.as_str();
        let before = visual_order.clone();
        let Some(from) = visual_order.iter().position(|id| id == dragging_id) else {
            return false;
        };
        let moving = visual_order.remove(from);
        let Some(target) = visual_order.iter().position(|id| id == over_id) else {
            visual_order.insert(from, moving);
            return false;
        };

        let is_after = pointer_y > over_rect.top + over_rect.height / 2.0;
        let insert_at = if is_after { target + 1 } else { target };
        visual_order.insert(insert_at, moving);
        *visual_order != before
    }

    /// Drop or drag-end. Always returns to `Idle` and emits the final visual
    /// order, or `None` if no drag was active.
    pub fn end(&mut self) -> Option<Vec<String>> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging { visual_order, .. } => Some(visual_order),
            DragState::Idle => None,
        }
    }

    /// Cancelled gesture. The visual order reached so far is kept, same as
    /// [`DragEngine::end`].
    pub fn cancel(&mut self) -> Option<Vec<String>> {
        self.end()
    }

    /// A panel joined the board mid-drag. It is placed right after `after`
    /// in the visual order, or first when `after` is `None`.
    pub fn track_insert(&mut self, id: &str, after: Option<&str>) {
        let DragState::Dragging { visual_order, .. } = &mut self.state else {
            return;
        };
        let at = after
            .and_then(|anchor| visual_order.iter().position(|v| v == anchor))
            .map_or(0, |i| i + 1);
        visual_order.insert(at, id.to_string());
    }

    /// A panel left the board mid-drag. Losing the dragged panel ends the
    /// drag without emitting an order.
    pub fn track_remove(&mut self, id: &str) {
        let DragState::Dragging {
            dragging_id,
            visual_order,
        } = &mut self.state
        else {
            return;
        };
        if dragging_id.as_str() == id {
            self.state = DragState::Idle;
        } else {
            visual_order.retain(|v| v != id);
        }
    }
}
