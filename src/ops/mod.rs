pub mod auto_color;
pub mod brushes;
pub mod color;
pub mod fill;
