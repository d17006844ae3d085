pub mod hub;
pub mod matcher;
pub mod stop;
