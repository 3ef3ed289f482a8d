//! Color constants for the terminal user interface.

use ratatui::style::Color;

// Tree rows are tinted by depth so sibling branches line up visually.

/// Top-level branches
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// Second level
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Third level and deeper
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);
/// Mixed-currency and missing-price warnings
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);

/// Accent color for a tree row at `depth`.
pub fn depth_color(depth: usize) -> Color {
    match depth {
        0 => DARK_GREEN,
        1 => GOLD,
        _ => DARK_PURPLE,
    }
}
