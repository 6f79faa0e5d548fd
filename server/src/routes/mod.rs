pub mod api;
pub mod heatmap;
pub mod overview;
