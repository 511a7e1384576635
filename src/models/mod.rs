pub mod dispatch;
pub mod geo;
pub mod option;
pub mod token;
