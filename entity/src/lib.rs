pub mod prelude;

pub mod email;
pub mod key_point;
pub mod preference;
pub mod statistics;
pub mod user;
