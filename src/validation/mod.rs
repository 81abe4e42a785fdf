pub mod plate;
pub mod spoken;

pub use plate::{PlateValidator, INVALID_PLATE_MESSAGE};
pub use spoken::spoken_to_plate_text;
