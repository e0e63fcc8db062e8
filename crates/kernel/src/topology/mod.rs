pub mod audit;
pub mod coedge;
pub mod entity;
pub mod face;
pub mod face_util;
pub mod loops;
pub mod store;
