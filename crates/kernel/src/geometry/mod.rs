pub mod bound;
pub mod curves;
pub mod point;
pub mod polygon;
pub mod vector;
