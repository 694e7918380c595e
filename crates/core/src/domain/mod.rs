pub mod answers;
pub mod profile;
pub mod program;
pub mod session;
