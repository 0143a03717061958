// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

pub mod area;
pub mod point;
pub mod output;

pub use area::{AlarmCategory, AlarmLevel, Area, AreaStatus, PriorityMask};
pub use point::{Point, PointStatus};
pub use output::Output;
