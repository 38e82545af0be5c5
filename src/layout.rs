//! Weighted rectangle partitioning for the heatmap.
//!
//! The layout lives in a normalized 0-100 percent coordinate space so the
//! renderer can scale it into any terminal area. Splitting is slice-and-dice:
//! each step cuts the current rectangle along its longer side, giving the
//! heaviest remaining item its proportional share.

/// Axis-aligned rectangle in the 0-100 percent coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    /// The full canvas.
    pub const CANVAS: Rect = Rect {
        x: 0.0,
        y: 0.0,
        w: 100.0,
        h: 100.0,
    };

    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}

/// Partition `rect` among `weights`, one sub-rect per weight, in input order.
///
/// Weights must be strictly positive (callers sanitize upstream) and the
/// slice must be non-empty. The sub-rects tile `rect` exactly: the final
/// weight absorbs the whole remainder, so no floating-point slack is lost.
pub fn layout(weights: &[f64], rect: Rect) -> Vec<Rect> {
    debug_assert!(
        !weights.is_empty(),
        "layout() requires at least one weight"
    );

    let mut out = Vec::with_capacity(weights.len());
    let mut remaining = rect;
    let mut total: f64 = weights.iter().sum();

    for (i, &weight) in weights.iter().enumerate() {
        // Base case: the last item takes the entire remaining rect.
        if i == weights.len() - 1 {
            out.push(remaining);
            break;
        }

        let share = if total > 0.0 { weight / total } else { 0.0 };

        // Split along the longer side; ties split vertically.
        if remaining.w >= remaining.h {
            let cut = remaining.w * share;
            out.push(Rect {
                x: remaining.x,
                y: remaining.y,
                w: cut,
                h: remaining.h,
            });
            remaining.x += cut;
            remaining.w -= cut;
        } else {
            let cut = remaining.h * share;
            out.push(Rect {
                x: remaining.x,
                y: remaining.y,
                w: remaining.w,
                h: cut,
            });
            remaining.y += cut;
            remaining.h -= cut;
        }

        total -= weight;
    }

    out
}
