pub mod conditional;
pub mod vfs;
