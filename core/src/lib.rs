pub mod charter;
pub mod error;
pub mod lookup;
