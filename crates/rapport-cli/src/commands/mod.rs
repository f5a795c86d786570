pub mod friend;
pub mod serve;
pub mod user;
