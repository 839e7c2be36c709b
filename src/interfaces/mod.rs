//! Input and output formats exposed to the outside world.

pub mod csv;
