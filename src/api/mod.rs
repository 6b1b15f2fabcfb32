pub mod catalog;
pub mod turno;

pub use self::{
    catalog::{Hours, Level, Municipality, Office, Subject},
    turno::Turno,
};
