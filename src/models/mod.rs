pub mod visit;

pub use visit::{Location, NewVisit, Visit, VisitRow, UNKNOWN, UNKNOWN_DEVICE};
