//! Pointer state for the interactive heatmap.
//!
//! Two states: nothing hovered, or one tile hovered with the last known
//! pointer position. The TUI owns one instance and feeds it mouse events;
//! rendering reads it to decide whether to draw the tooltip overlay.

/// Cells to shift the tooltip away from the pointer so it never sits
/// under the cursor.
pub const TOOLTIP_OFFSET_X: u16 = 2;
pub const TOOLTIP_OFFSET_Y: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Hovering {
        ticker: String,
        x: u16,
        y: u16,
    },
}

impl HoverState {
    /// Feed a pointer position together with the ticker under it, if any.
    ///
    /// Entering a tile, moving within it and moving onto a different tile
    /// all land in `Hovering` with fresh coordinates; moving onto empty
    /// space falls back to `Idle`.
    pub fn pointer_moved(&mut self, hit: Option<&str>, x: u16, y: u16) {
        *self = match hit {
            Some(ticker) => HoverState::Hovering {
                ticker: ticker.to_string(),
                x,
                y,
            },
            None => HoverState::Idle,
        };
    }

    /// The pointer left the heatmap area (or the terminal) entirely.
    pub fn pointer_left(&mut self) {
        *self = HoverState::Idle;
    }

    pub fn hovered_ticker(&self) -> Option<&str> {
        match self {
            HoverState::Hovering { ticker, .. } => Some(ticker),
            HoverState::Idle => None,
        }
    }

    /// Last known pointer position while hovering.
    pub fn position(&self) -> Option<(u16, u16)> {
        match self {
            HoverState::Hovering { x, y, .. } => Some((*x, *y)),
            HoverState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let state = HoverState::default();
        assert_eq!(state, HoverState::Idle);
        assert_eq!(state.hovered_ticker(), None);
        assert_eq!(state.position(), None);
    }

    #[test]
    fn test_enter_tile() {
        let mut state = HoverState::default();
        state.pointer_moved(Some("AAPL"), 10, 5);
        assert_eq!(state.hovered_ticker(), Some("AAPL"));
        assert_eq!(state.position(), Some((10, 5)));
    }

    #[test]
    fn test_move_within_tile_updates_position() {
        let mut state = HoverState::default();
        state.pointer_moved(Some("AAPL"), 10, 5);
        state.pointer_moved(Some("AAPL"), 11, 6);
        assert_eq!(state.hovered_ticker(), Some("AAPL"));
        assert_eq!(state.position(), Some((11, 6)));
    }

    #[test]
    fn test_move_onto_other_tile_retargets() {
        let mut state = HoverState::default();
        state.pointer_moved(Some("AAPL"), 10, 5);
        state.pointer_moved(Some("XOM"), 40, 5);
        assert_eq!(state.hovered_ticker(), Some("XOM"));
        assert_eq!(state.position(), Some((40, 5)));
    }

    #[test]
    fn test_move_onto_empty_space_goes_idle() {
        let mut state = HoverState::default();
        state.pointer_moved(Some("AAPL"), 10, 5);
        state.pointer_moved(None, 90, 2);
        assert_eq!(state, HoverState::Idle);
    }

    #[test]
    fn test_pointer_left_goes_idle() {
        let mut state = HoverState::default();
        state.pointer_moved(Some("AAPL"), 10, 5);
        state.pointer_left();
        assert_eq!(state, HoverState::Idle);
        // Leaving while already idle stays idle.
        state.pointer_left();
        assert_eq!(state, HoverState::Idle);
    }
}
